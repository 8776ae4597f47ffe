use super::WeChatError;
use openssl::{
    hash::MessageDigest,
    pkey::PKey,
    rsa::{Padding, Rsa},
    sign::Signer,
};
use std::collections::HashMap;

/// Digest mode of the v2 dictionary signature. Which one applies is fixed
/// per endpoint by the provider (downloadfundflow is the HMAC-SHA256 one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignType {
    Md5,
    HmacSha256,
}

/**
 * https://pay.weixin.qq.com/wiki/doc/api/jsapi.php?chapter=4_3
 * Empty values and the sign fields never enter the signature base;
 * `sign_type` only does on the few endpoints that include it.
 */
pub fn sign(
    m: &HashMap<String, String>,
    sign_key: &str,
    sign_type: SignType,
    exclude_sign_type: bool,
) -> Result<String, WeChatError> {
    let mut query_list = Vec::<String>::new();
    m.iter().for_each(|(k, v)| {
        if v.is_empty() || k == "sign" || k == "paySign" {
            return;
        }
        if exclude_sign_type && k == "sign_type" {
            return;
        }
        let query = format!("{}={}", k, v.trim());
        query_list.push(query);
    });
    query_list.sort();
    let sign_sorted_source = format!("{}&key={}", query_list.join("&"), sign_key);
    let signature = match sign_type {
        SignType::Md5 => {
            let digest = md5::compute(sign_sorted_source.as_bytes());
            format!("{:x}", digest).to_uppercase()
        }
        SignType::HmacSha256 => {
            let pkey = PKey::hmac(sign_key.as_bytes())?;
            let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
            signer.update(sign_sorted_source.as_bytes())?;
            let digest = signer.sign_to_vec()?;
            data_encoding::HEXUPPER.encode(&digest)
        }
    };
    Ok(signature)
}

pub fn verify(
    m: &HashMap<String, String>,
    signature: &str,
    sign_key: &str,
    sign_type: SignType,
    exclude_sign_type: bool,
) -> Result<bool, WeChatError> {
    let calculated = sign(m, sign_key, sign_type, exclude_sign_type)?;
    Ok(calculated == signature)
}

/// RSA-OAEP (SHA1 + MGF1) encryption of the sensitive pay_bank fields.
/// The merchant-scoped public key comes from the getpublickey endpoint;
/// the ciphertext travels base64-encoded.
pub fn rsa_oaep_encrypt(plain: &str, public_key: &str) -> Result<String, WeChatError> {
    let rsa = Rsa::public_key_from_pem(public_key.as_bytes())?;
    let mut buf = vec![0u8; rsa.size() as usize];
    let len = rsa.public_encrypt(plain.as_bytes(), &mut buf, Padding::PKCS1_OAEP)?;
    buf.truncate(len);
    Ok(data_encoding::BASE64.encode(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEY: &str = "192006250b4c09247ec02edce69f6a2d";

    // The documented sample from the v2 signing guide.
    fn sample_params() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("appid".to_string(), "wxd930ea5d5a258f4f".to_string());
        m.insert("mch_id".to_string(), "10000100".to_string());
        m.insert("device_info".to_string(), "1000".to_string());
        m.insert("body".to_string(), "test".to_string());
        m.insert("nonce_str".to_string(), "ibuaiVcKdpRxkhJA".to_string());
        m
    }

    #[test]
    fn md5_sign_matches_documented_sample() {
        let signature = sign(&sample_params(), SAMPLE_KEY, SignType::Md5, true).unwrap();
        assert_eq!(signature, "9A0A8659F005D6984697E2CA0A9CF3B7");
    }

    #[test]
    fn hmac_sha256_sign_over_same_base() {
        let signature = sign(&sample_params(), SAMPLE_KEY, SignType::HmacSha256, true).unwrap();
        assert_eq!(
            signature,
            "6A9AE1657590FD6257D693A078E1C3E4BB6BA4DC30B23E0EE2496E54170DACD6"
        );
    }

    #[test]
    fn empty_values_are_excluded() {
        let mut m = sample_params();
        m.remove("device_info");
        let without = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        m.insert("device_info".to_string(), "".to_string());
        let with_empty = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        assert_eq!(without, with_empty);
        assert_eq!(with_empty, "9C5719D2CE48B8875101722D3A792434");
    }

    #[test]
    fn sign_field_is_excluded() {
        let mut m = sample_params();
        let before = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        m.insert("sign".to_string(), before.clone());
        let after = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn sign_type_exclusion_flag() {
        let mut m = sample_params();
        m.insert("sign_type".to_string(), "MD5".to_string());
        let excluded = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        let included = sign(&m, SAMPLE_KEY, SignType::Md5, false).unwrap();
        assert_eq!(excluded, "9A0A8659F005D6984697E2CA0A9CF3B7");
        assert_ne!(excluded, included);
    }

    #[test]
    fn oaep_ciphertext_decrypts_to_the_plaintext() {
        use crate::alipay::sign::test_keys::{PRIVATE_KEY, PUBLIC_KEY};

        let ciphertext = rsa_oaep_encrypt("6225760088888888", PUBLIC_KEY).unwrap();
        assert_ne!(ciphertext, "6225760088888888");

        let raw = data_encoding::BASE64.decode(ciphertext.as_bytes()).unwrap();
        let rsa = Rsa::private_key_from_pem(PRIVATE_KEY.as_bytes()).unwrap();
        let mut buf = vec![0u8; rsa.size() as usize];
        let len = rsa
            .private_decrypt(&raw, &mut buf, Padding::PKCS1_OAEP)
            .unwrap();
        assert_eq!(&buf[..len], b"6225760088888888");
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let m = sample_params();
        let signature = sign(&m, SAMPLE_KEY, SignType::Md5, true).unwrap();
        assert!(verify(&m, &signature, SAMPLE_KEY, SignType::Md5, true).unwrap());
        let tampered = format!("0{}", &signature[1..]);
        assert!(!verify(&m, &tampered, SAMPLE_KEY, SignType::Md5, true).unwrap());
    }
}

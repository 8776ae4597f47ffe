use super::{
    sign::{mapi_rsa, openapi_rsa2},
    AlipayError,
};
use std::collections::HashMap;

/**
 * convert key1=value1&key2=value2 to HashMap
 * 先要进行一次处理把 x-www-form-urlencoded 数据中的 + 还原为空格
 * 主要是时间值比如 gmt_create=2024-06-09+18:07:41&xxx 要转换成 gmt_create=2024-06-09 18:07:41&xxx
 * 这个要放在 url decode 之前, 不然 decode 完了以后会出现新的 + 号 (比如 sign 里面, 那里的加号需要保留)
 */
fn parse_form(payload: &str) -> HashMap<String, String> {
    let payload = payload.replace('+', " ");
    let mut m: HashMap<String, String> = HashMap::new();
    payload.split('&').for_each(|pair| {
        let kv: Vec<&str> = pair.splitn(2, '=').collect();
        if kv.len() == 2 {
            let key = kv[0].to_string();
            let val = percent_encoding::percent_decode_str(kv[1])
                .decode_utf8()
                .unwrap_or_default()
                .to_string();
            m.insert(key, val);
        }
    });
    m
}

fn missing_params() -> AlipayError {
    AlipayError::ApiError("missing required params".into())
}

/// Convert a decimal yuan string ("12.34") to fen without going through
/// floating point; `0.29_f64 * 100.0` truncates to 28. At most two
/// decimal places are accepted.
fn parse_amount_fen(s: &str) -> Option<i32> {
    let (yuan, fen) = match s.split_once('.') {
        Some((y, f)) => (y, f),
        None => (s, ""),
    };
    if yuan.is_empty() || fen.len() > 2 {
        return None;
    }
    if !yuan.bytes().all(|b| b.is_ascii_digit()) || !fen.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yuan: i64 = yuan.parse().ok()?;
    let fen: i64 = match fen.len() {
        0 => 0,
        1 => fen.parse::<i64>().ok()? * 10,
        _ => fen.parse().ok()?,
    };
    i32::try_from(yuan.checked_mul(100)?.checked_add(fen)?).ok()
}

/// Asynchronous notification from the legacy MAPI gateway (RSA / SHA1).
pub struct MapiNotifyPayload {
    pub trade_status: String,
    pub merchant_order_no: String,
    /// 精确到分
    pub amount: i32,
    signature: String,
    m: HashMap<String, String>,
}

impl MapiNotifyPayload {
    pub fn new(payload: &str) -> Result<Self, AlipayError> {
        let m = parse_form(payload);

        let sign_type = m.get("sign_type").ok_or_else(missing_params)?;
        let signature = m.get("sign").ok_or_else(missing_params)?;
        let trade_status = m.get("trade_status").ok_or_else(missing_params)?;
        let out_trade_no = m.get("out_trade_no").ok_or_else(missing_params)?;
        let total_fee = m.get("total_fee").ok_or_else(missing_params)?;

        if sign_type != "RSA" {
            return Err(AlipayError::ApiError("sign_type not RSA".into()));
        }

        let amount = parse_amount_fen(total_fee)
            .ok_or_else(|| AlipayError::ApiError("invalid total_fee".into()))?;

        Ok(Self {
            trade_status: trade_status.to_owned(),
            merchant_order_no: out_trade_no.to_owned(),
            amount,
            signature: signature.to_owned(),
            m,
        })
    }

    pub fn verify_rsa_sign(&self, public_key: &str) -> Result<(), AlipayError> {
        let verified = mapi_rsa::verify(&self.m, &self.signature, public_key)?;
        if !verified {
            return Err(AlipayError::InvalidSignature("wrong rsa signature".into()));
        }
        Ok(())
    }

    pub fn trade_succeeded(&self) -> bool {
        self.trade_status == "TRADE_SUCCESS" || self.trade_status == "TRADE_FINISHED"
    }
}

/// Asynchronous notification from the OpenAPI gateway (RSA2 / SHA256).
pub struct OpenApiNotifyPayload {
    pub trade_status: String,
    pub merchant_order_no: String,
    /// 精确到分
    pub amount: i32,
    signature: String,
    m: HashMap<String, String>,
}

impl OpenApiNotifyPayload {
    pub fn new(payload: &str) -> Result<Self, AlipayError> {
        let m = parse_form(payload);

        let sign_type = m.get("sign_type").ok_or_else(missing_params)?;
        let signature = m.get("sign").ok_or_else(missing_params)?;
        let trade_status = m.get("trade_status").ok_or_else(missing_params)?;
        let out_trade_no = m.get("out_trade_no").ok_or_else(missing_params)?;
        let total_amount = m.get("total_amount").ok_or_else(missing_params)?;

        if sign_type != "RSA2" {
            return Err(AlipayError::ApiError("sign_type not RSA2".into()));
        }

        let amount = parse_amount_fen(total_amount)
            .ok_or_else(|| AlipayError::ApiError("invalid total_amount".into()))?;

        Ok(Self {
            trade_status: trade_status.to_owned(),
            merchant_order_no: out_trade_no.to_owned(),
            amount,
            signature: signature.to_owned(),
            m,
        })
    }

    pub fn verify_rsa2_sign(&self, public_key: &str) -> Result<(), AlipayError> {
        // notification signatures, unlike request envelopes, do not cover
        // sign_type
        let mut m = self.m.clone();
        m.remove("sign");
        m.remove("sign_type");
        let verified = openapi_rsa2::verify(&m, &self.signature, public_key)?;
        if !verified {
            return Err(AlipayError::InvalidSignature("wrong rsa2 signature".into()));
        }
        Ok(())
    }

    pub fn trade_succeeded(&self) -> bool {
        self.trade_status == "TRADE_SUCCESS" || self.trade_status == "TRADE_FINISHED"
    }
}

use super::{sign, sign::SignType, xml, WeChatError};
use std::collections::HashMap;

/// Asynchronous payment notification pushed by the gateway. The payload
/// is the same XML dialect as the responses, always MD5 signed.
pub struct NotifyPayload {
    pub result_code: String,
    pub merchant_order_no: String,
    /// 支付金额, 精确到分
    pub total_fee: i32,
    signature: String,
    m: HashMap<String, String>,
}

impl NotifyPayload {
    pub fn new(payload: &str) -> Result<Self, WeChatError> {
        if payload.trim().is_empty() {
            return Err(WeChatError::ApiError("notify body is empty".into()));
        }
        let mut m = xml::parse_xml(payload)?;

        if m.get("return_code").map(String::as_str) != Some("SUCCESS") {
            return Err(WeChatError::ApiError("return_code not SUCCESS".into()));
        }

        fn missing_params() -> WeChatError {
            WeChatError::ApiError("missing required params".into())
        }

        let result_code = m.get("result_code").ok_or_else(missing_params)?.clone();
        let out_trade_no = m.get("out_trade_no").ok_or_else(missing_params)?.clone();
        let total_fee = m
            .get("total_fee")
            .ok_or_else(missing_params)?
            .parse::<i32>()
            .map_err(|_| WeChatError::ApiError("invalid total_fee".into()))?;
        let signature = m.remove("sign").ok_or_else(missing_params)?;

        Ok(Self {
            result_code,
            merchant_order_no: out_trade_no,
            total_fee,
            signature,
            m,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.m.get(key).map(String::as_str)
    }

    pub fn verify_md5_sign(&self, sign_key: &str) -> Result<(), WeChatError> {
        let verified = sign::verify(&self.m, &self.signature, sign_key, SignType::Md5, true)?;
        if !verified {
            return Err(WeChatError::InvalidSignature(
                "wrong md5 signature on notify".into(),
            ));
        }
        Ok(())
    }
}

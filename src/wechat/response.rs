use super::{sign, sign::SignType, xml, WeChatError};
use serde::Deserialize;
use std::collections::HashMap;

/// Parsed v2 response: the flattened parameter map plus the raw body.
#[derive(Debug)]
pub struct WeChatPayResponse {
    pub params: HashMap<String, String>,
    pub body: String,
}

impl WeChatPayResponse {
    pub fn parse(body: &str) -> Result<Self, WeChatError> {
        if body.trim().is_empty() {
            return Err(WeChatError::ApiError("response body is empty".into()));
        }
        let params = xml::parse_xml(body)?;
        Ok(Self {
            params,
            body: body.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn return_code(&self) -> Option<&str> {
        self.get("return_code")
    }

    pub fn result_code(&self) -> Option<&str> {
        self.get("result_code")
    }

    /// Re-run the signer over the received parameters and compare. Only a
    /// SUCCESS response carrying a non-empty `sign` is checked; endpoints
    /// that answer unsigned pass through.
    pub fn verify_sign(
        &self,
        sign_key: &str,
        sign_type: SignType,
        exclude_sign_type: bool,
    ) -> Result<(), WeChatError> {
        let signature = match self.get("sign") {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(()),
        };
        if self.return_code() != Some("SUCCESS") {
            return Ok(());
        }
        let verified = sign::verify(
            &self.params,
            signature,
            sign_key,
            sign_type,
            exclude_sign_type,
        )?;
        if !verified {
            return Err(WeChatError::InvalidSignature(
                "response sign does not match".into(),
            ));
        }
        Ok(())
    }

    /// Typed view of the body for callers that want a struct instead of
    /// the parameter map.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, WeChatError> {
        quick_xml::de::from_str(&self.body)
            .map_err(|e| WeChatError::ApiError(format!("error deserializing response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct UnifiedOrderResponse {
    pub return_code: String,
    pub return_msg: Option<String>,

    pub appid: Option<String>,
    pub mch_id: Option<String>,
    pub nonce_str: Option<String>,
    pub sign: Option<String>,
    pub result_code: Option<String>,
    pub err_code: Option<String>,
    pub err_code_des: Option<String>,

    pub trade_type: Option<String>,
    pub prepay_id: Option<String>,
    pub code_url: Option<String>,
}

mod client;
mod mapi;
mod notify;
mod openapi;
pub mod sign;

mod config {
    use serde::Deserialize;

    /// Which gateway generation the merchant account is provisioned for.
    /// MAPI signs with RSA (SHA1) or MD5, OPENAPI with RSA2 (SHA256).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AlipayApiType {
        Mapi,
        Openapi,
    }

    impl<'de> Deserialize<'de> for AlipayApiType {
        fn deserialize<D>(deserializer: D) -> Result<AlipayApiType, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = i32::deserialize(deserializer)?;
            match s {
                1 => Ok(AlipayApiType::Mapi),
                2 => Ok(AlipayApiType::Openapi),
                _ => Err(serde::de::Error::custom(format!(
                    "unknown alipay_api_type: {}",
                    s
                ))),
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct AlipayConfig {
        pub alipay_pid: String,          // 合作者身份, 账号 ID
        pub alipay_security_key: String, // 安全校验码 (MD5 Key)
        pub alipay_version: AlipayApiType,
        #[serde(default)]
        pub alipay_app_id: String, // 开放平台应用 ID, OPENAPI 需要
        #[serde(default)]
        pub alipay_private_key: String, // RSA, MAPI
        #[serde(default)]
        pub alipay_public_key: String,
        #[serde(default)]
        pub alipay_private_key_rsa2: String, // RSA2, OPENAPI
        #[serde(default)]
        pub alipay_public_key_rsa2: String,
    }

    impl AlipayConfig {
        pub fn from_json(value: serde_json::Value) -> Result<Self, super::AlipayError> {
            serde_json::from_value(value).map_err(|e| {
                super::AlipayError::InvalidConfig(format!(
                    "error deserializing alipay config: {:?}",
                    e
                ))
            })
        }
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum AlipayError {
        #[error("[Malformed Alipay Request] {0}")]
        MalformedRequest(String),
        #[error("[Failed Communicating Alipay API] {0}")]
        ApiError(String),
        #[error("[Invalid Alipay Config] {0}")]
        InvalidConfig(String),
        #[error("[Alipay Signature Mismatch] {0}")]
        InvalidSignature(String),
        #[error("[Unexpected Alipay Error] {0}")]
        Unexpected(String),
    }

    impl From<openssl::error::ErrorStack> for AlipayError {
        fn from(e: openssl::error::ErrorStack) -> Self {
            AlipayError::Unexpected(format!("[openssl] {:?}", e))
        }
    }

    impl From<data_encoding::DecodeError> for AlipayError {
        fn from(e: data_encoding::DecodeError) -> Self {
            AlipayError::Unexpected(format!("[base64] {:?}", e))
        }
    }

    impl From<crate::core::TransportError> for AlipayError {
        fn from(e: crate::core::TransportError) -> Self {
            AlipayError::ApiError(format!("{}", e))
        }
    }
}

pub use client::{AlipayClient, RefundOutcome};
pub use config::{AlipayApiType, AlipayConfig};
pub use error::AlipayError;
pub use mapi::{MapiRefundPayload, MapiRequestPayload};
pub use notify::{MapiNotifyPayload, OpenApiNotifyPayload};
pub use openapi::{OpenApiPayload, OpenApiRequestPayload};

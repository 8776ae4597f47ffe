mod client;
mod notify;
mod request;
mod response;
pub mod sign;
pub mod xml;

mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct WeChatPayConfig {
        pub app_id: String,
        pub mch_id: String,
        /// Merchant API key, the shared secret every v2 signature is keyed by.
        pub key: String,
        /// PEM client certificate + key for the secapi / mmpaymkttransfers hosts.
        #[serde(default)]
        pub client_cert: String,
        #[serde(default)]
        pub client_key: String,
        /// Merchant RSA public key (SPKI PEM) obtained via getpublickey;
        /// only pay_bank needs it.
        #[serde(default)]
        pub rsa_public_key: String,
    }

    impl WeChatPayConfig {
        pub fn from_json(value: serde_json::Value) -> Result<Self, super::WeChatError> {
            serde_json::from_value(value).map_err(|e| {
                super::WeChatError::InvalidConfig(format!(
                    "error deserializing wechat pay config: {:?}",
                    e
                ))
            })
        }
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum WeChatError {
        #[error("[Malformed WeChat Pay Request] {0}")]
        MalformedRequest(String),
        #[error("[Failed Communicating WeChat Pay API] {0}")]
        ApiError(String),
        #[error("[Invalid WeChat Pay Config] {0}")]
        InvalidConfig(String),
        #[error("[WeChat Pay Signature Mismatch] {0}")]
        InvalidSignature(String),
        #[error("[Unexpected WeChat Pay Error] {0}")]
        Unexpected(String),
    }

    impl From<openssl::error::ErrorStack> for WeChatError {
        fn from(e: openssl::error::ErrorStack) -> Self {
            WeChatError::Unexpected(format!("[openssl] {:?}", e))
        }
    }

    impl From<crate::core::TransportError> for WeChatError {
        fn from(e: crate::core::TransportError) -> Self {
            WeChatError::ApiError(format!("{}", e))
        }
    }
}

pub use client::WeChatPayClient;
pub use config::WeChatPayConfig;
pub use error::WeChatError;
pub use notify::NotifyPayload;
pub use request::{
    CloseOrderRequest, DownloadFundFlowRequest, GetPublicKeyRequest, GetTransferInfoRequest,
    OrderQueryRequest, PayBankRequest, QueryBankRequest, RefundQueryRequest, RefundRequest,
    SendGroupRedPackRequest, SendRedPackRequest, TransfersRequest, UnifiedOrderRequest,
    WeChatPayRequest,
};
pub use response::{UnifiedOrderResponse, WeChatPayResponse};
pub use sign::SignType;

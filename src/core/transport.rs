use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("[Request Failed] {0}")]
    Request(String),
    #[error("[Invalid Client Identity] {0}")]
    Identity(String),
}

/// One-shot HTTP POST used by both gateways. Every call is independent,
/// the raw body text comes back for the caller to parse.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: String) -> Result<String, TransportError>;

    async fn post_form(
        &self,
        url: &str,
        form: &HashMap<String, String>,
    ) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Transport with a merchant client certificate, for endpoints that
    /// require mutual TLS (e.g. the WeChat Pay secapi host).
    pub fn with_identity(cert_pem: &str, key_pem: &str) -> Result<Self, TransportError> {
        let identity = reqwest::Identity::from_pkcs8_pem(cert_pem.as_bytes(), key_pem.as_bytes())
            .map_err(|e| TransportError::Identity(format!("error loading client cert: {}", e)))?;
        let client = reqwest::Client::builder()
            .identity(identity)
            .build()
            .map_err(|e| TransportError::Identity(format!("error building client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: String) -> Result<String, TransportError> {
        let res = self
            .client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("error posting to {}: {}", url, e)))?;
        let res_text = res
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("error reading response: {}", e)))?;
        Ok(res_text)
    }

    async fn post_form(
        &self,
        url: &str,
        form: &HashMap<String, String>,
    ) -> Result<String, TransportError> {
        let res = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("error posting to {}: {}", url, e)))?;
        let res_text = res
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("error reading response: {}", e)))?;
        Ok(res_text)
    }
}

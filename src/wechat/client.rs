use super::{
    request::WeChatPayRequest, response::WeChatPayResponse, sign, sign::SignType, xml, WeChatError,
    WeChatPayConfig,
};
use crate::core::{HttpTransport, Transport};
use std::collections::HashMap;
use std::sync::Arc;

/// One client per merchant option-set. Calls are independent and the
/// client holds nothing mutable, so it can be shared across tasks.
pub struct WeChatPayClient {
    config: WeChatPayConfig,
    transport: Arc<dyn Transport>,
    secure_transport: Option<Arc<dyn Transport>>,
}

impl WeChatPayClient {
    pub fn new(config: WeChatPayConfig) -> Result<Self, WeChatError> {
        if config.key.is_empty() {
            return Err(WeChatError::InvalidConfig("missing api key".into()));
        }
        let secure_transport = if !config.client_cert.is_empty() {
            if config.client_key.is_empty() {
                return Err(WeChatError::InvalidConfig("missing client_key".into()));
            }
            let transport = HttpTransport::with_identity(&config.client_cert, &config.client_key)
                .map_err(|e| WeChatError::InvalidConfig(format!("{}", e)))?;
            Some(Arc::new(transport) as Arc<dyn Transport>)
        } else {
            None
        };
        Ok(Self {
            config,
            transport: Arc::new(HttpTransport::new()),
            secure_transport,
        })
    }

    /// Build a client over caller-supplied transports. The certificate
    /// channel stays separate so a missing one still surfaces as
    /// `InvalidConfig` on the endpoints that need it.
    pub fn with_transport(
        config: WeChatPayConfig,
        transport: Arc<dyn Transport>,
        secure_transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            config,
            transport,
            secure_transport,
        }
    }

    pub fn config(&self) -> &WeChatPayConfig {
        &self.config
    }

    /// Assemble, sign, post and verify one API call.
    pub async fn execute<R: WeChatPayRequest>(
        &self,
        request: &R,
    ) -> Result<WeChatPayResponse, WeChatError> {
        let mut m = request.parameters()?;
        request.complete(&mut m, &self.config)?;
        m.insert("nonce_str".to_string(), crate::utils::nonce_str());
        let signature = sign::sign(
            &m,
            &self.config.key,
            request.sign_type(),
            request.exclude_sign_type(),
        )?;
        m.insert("sign".to_string(), signature);

        let content = xml::build_xml(&m);
        tracing::debug!(url = request.api_url(), "wechat pay request: {}", content);

        let transport = if request.needs_certificate() {
            self.secure_transport
                .as_ref()
                .ok_or_else(|| WeChatError::InvalidConfig("missing client certificate".into()))?
        } else {
            &self.transport
        };
        let body = transport.post(request.api_url(), content).await?;
        tracing::debug!("wechat pay response: {}", body);

        if body.trim().is_empty() {
            return Err(WeChatError::ApiError("response body is empty".into()));
        }
        // downloadfundflow answers with the bill text on success
        if !body.trim_start().starts_with("<xml") {
            return Ok(WeChatPayResponse {
                params: HashMap::new(),
                body,
            });
        }
        let response = WeChatPayResponse::parse(&body)?;
        response.verify_sign(
            &self.config.key,
            request.sign_type(),
            request.exclude_sign_type(),
        )?;
        Ok(response)
    }

    /// APP call-payment dictionary, handed to the mobile SDK. Signed with
    /// the same key but over the app-side field names.
    pub fn app_call_params(&self, prepay_id: &str) -> Result<HashMap<String, String>, WeChatError> {
        let mut m = HashMap::new();
        m.insert("appid".to_string(), self.config.app_id.clone());
        m.insert("partnerid".to_string(), self.config.mch_id.clone());
        m.insert("prepayid".to_string(), prepay_id.to_string());
        m.insert("package".to_string(), "Sign=WXPay".to_string());
        m.insert("noncestr".to_string(), crate::utils::nonce_str());
        m.insert("timestamp".to_string(), crate::utils::timestamp());
        let signature = sign::sign(&m, &self.config.key, SignType::Md5, true)?;
        m.insert("sign".to_string(), signature);
        Ok(m)
    }

    /// JSAPI / H5 call-payment dictionary. `paySign` is a fresh signature,
    /// not the one from the unifiedorder exchange.
    pub fn jsapi_call_params(
        &self,
        prepay_id: &str,
    ) -> Result<HashMap<String, String>, WeChatError> {
        let mut m = HashMap::new();
        m.insert("appId".to_string(), self.config.app_id.clone());
        m.insert("timeStamp".to_string(), crate::utils::timestamp());
        m.insert("nonceStr".to_string(), crate::utils::nonce_str());
        m.insert("package".to_string(), format!("prepay_id={}", prepay_id));
        m.insert("signType".to_string(), "MD5".to_string());
        let signature = sign::sign(&m, &self.config.key, SignType::Md5, true)?;
        m.insert("paySign".to_string(), signature);
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransportError;
    use crate::wechat::request::{
        GetPublicKeyRequest, OrderQueryRequest, RefundRequest, UnifiedOrderRequest,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    const KEY: &str = "192006250b4c09247ec02edce69f6a2d";

    fn config() -> WeChatPayConfig {
        WeChatPayConfig {
            app_id: "wxd930ea5d5a258f4f".to_string(),
            mch_id: "10000100".to_string(),
            key: KEY.to_string(),
            client_cert: String::new(),
            client_key: String::new(),
            rsa_public_key: String::new(),
        }
    }

    /// Canned transport: records the posted body, replies with a fixed one.
    struct FakeTransport {
        response: String,
        posted: Mutex<Vec<(String, String)>>,
    }

    impl FakeTransport {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                posted: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, url: &str, body: String) -> Result<String, TransportError> {
            self.posted
                .lock()
                .unwrap()
                .push((url.to_string(), body));
            Ok(self.response.clone())
        }

        async fn post_form(
            &self,
            _url: &str,
            _form: &HashMap<String, String>,
        ) -> Result<String, TransportError> {
            Ok(self.response.clone())
        }
    }

    fn signed_response() -> String {
        let mut m = HashMap::new();
        m.insert("return_code".to_string(), "SUCCESS".to_string());
        m.insert("result_code".to_string(), "SUCCESS".to_string());
        m.insert("prepay_id".to_string(), "wx201410272009395522657".to_string());
        let signature = sign::sign(&m, KEY, SignType::Md5, true).unwrap();
        m.insert("sign".to_string(), signature);
        xml::build_xml(&m)
    }

    #[tokio::test]
    async fn execute_signs_posts_and_verifies() {
        let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
        let transport = FakeTransport::new(&signed_response());
        let client = WeChatPayClient::with_transport(config(), transport.clone(), None);
        let request = UnifiedOrderRequest::new_jsapi(
            "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o",
            "127.0.0.1",
            "https://merchant.example.com/notify",
            "20240601001",
            100,
            chrono::Utc::now().timestamp() + 600,
            "test",
        )
        .unwrap();

        let response = client.execute(&request).await.unwrap();
        assert_eq!(response.return_code(), Some("SUCCESS"));
        assert_eq!(response.get("prepay_id"), Some("wx201410272009395522657"));

        let posted = transport.posted.lock().unwrap();
        let (url, body) = &posted[0];
        assert_eq!(url, "https://api.mch.weixin.qq.com/pay/unifiedorder");
        // the posted body carries merchant identity, nonce and a valid sign
        let m = xml::parse_xml(body).unwrap();
        assert_eq!(m.get("appid").map(String::as_str), Some("wxd930ea5d5a258f4f"));
        assert_eq!(m.get("mch_id").map(String::as_str), Some("10000100"));
        assert_eq!(m.get("nonce_str").map(String::len), Some(32));
        let posted_sign = m.get("sign").unwrap().clone();
        assert!(sign::verify(&m, &posted_sign, KEY, SignType::Md5, true).unwrap());
    }

    #[tokio::test]
    async fn execute_rejects_tampered_response_sign() {
        let tampered = signed_response().replace("wx201410272009395522657", "wx_other_prepay_id");
        let transport = FakeTransport::new(&tampered);
        let client = WeChatPayClient::with_transport(config(), transport, None);
        let err = client
            .execute(&OrderQueryRequest {
                out_trade_no: "20240601001".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WeChatError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn execute_rejects_empty_body() {
        let transport = FakeTransport::new("");
        let client = WeChatPayClient::with_transport(config(), transport, None);
        let err = client
            .execute(&OrderQueryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WeChatError::ApiError(_)));
    }

    #[tokio::test]
    async fn cert_endpoint_without_certificate_is_config_error() {
        let client = WeChatPayClient::new(config()).unwrap();
        let err = client
            .execute(&RefundRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WeChatError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn injected_plain_transport_does_not_serve_cert_endpoints() {
        let transport = FakeTransport::new(&signed_response());
        let client = WeChatPayClient::with_transport(config(), transport.clone(), None);
        let err = client
            .execute(&RefundRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WeChatError::InvalidConfig(_)));
        // nothing was posted through the plain channel
        assert!(transport.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_public_key_signs_over_sign_type() {
        let transport = FakeTransport::new(
            "<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>",
        );
        let client =
            WeChatPayClient::with_transport(config(), transport.clone(), Some(transport.clone()));
        client.execute(&GetPublicKeyRequest::default()).await.unwrap();

        let posted = transport.posted.lock().unwrap();
        let m = xml::parse_xml(&posted[0].1).unwrap();
        assert_eq!(m.get("sign_type").map(String::as_str), Some("MD5"));
        let posted_sign = m.get("sign").unwrap().clone();
        // exclude_sign_type = false on this endpoint
        assert!(sign::verify(&m, &posted_sign, KEY, SignType::Md5, false).unwrap());
        assert!(!sign::verify(&m, &posted_sign, KEY, SignType::Md5, true).unwrap());
    }

    #[test]
    fn jsapi_call_params_carry_fresh_pay_sign() {
        let client = WeChatPayClient::new(config()).unwrap();
        let m = client.jsapi_call_params("wx201410272009395522657").unwrap();
        assert_eq!(
            m.get("package").map(String::as_str),
            Some("prepay_id=wx201410272009395522657")
        );
        assert_eq!(m.get("signType").map(String::as_str), Some("MD5"));
        let pay_sign = m.get("paySign").unwrap().clone();
        assert!(sign::verify(&m, &pay_sign, KEY, SignType::Md5, true).unwrap());
    }

    #[test]
    fn app_call_params_use_app_side_field_names() {
        let client = WeChatPayClient::new(config()).unwrap();
        let m = client.app_call_params("wx201410272009395522657").unwrap();
        assert_eq!(m.get("partnerid").map(String::as_str), Some("10000100"));
        assert_eq!(m.get("package").map(String::as_str), Some("Sign=WXPay"));
        let signature = m.get("sign").unwrap().clone();
        assert!(sign::verify(&m, &signature, KEY, SignType::Md5, true).unwrap());
    }
}

use super::{
    mapi::{MapiRefundPayload, MapiRequestPayload},
    notify::{MapiNotifyPayload, OpenApiNotifyPayload},
    openapi::{self, OpenApiPayload, OpenApiRequestPayload},
    AlipayApiType, AlipayConfig, AlipayError,
};
use crate::core::{HttpTransport, Transport};
use std::sync::Arc;

#[derive(Debug)]
pub struct RefundOutcome {
    pub succeeded: bool,
    pub failure_msg: Option<String>,
    pub raw: serde_json::Value,
}

/// One client per merchant option-set, dispatching between the MAPI and
/// OpenAPI gateway generations on the configured account type.
pub struct AlipayClient {
    config: AlipayConfig,
    transport: Arc<dyn Transport>,
}

impl AlipayClient {
    pub fn new(config: AlipayConfig) -> Self {
        Self {
            config,
            transport: Arc::new(HttpTransport::new()),
        }
    }

    pub fn with_transport(config: AlipayConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &AlipayConfig {
        &self.config
    }

    fn private_key(&self) -> Result<&str, AlipayError> {
        match self.config.alipay_version {
            AlipayApiType::Mapi => require(&self.config.alipay_private_key, "alipay_private_key"),
            AlipayApiType::Openapi => require(
                &self.config.alipay_private_key_rsa2,
                "alipay_private_key_rsa2",
            ),
        }
    }

    fn public_key(&self) -> Result<&str, AlipayError> {
        match self.config.alipay_version {
            AlipayApiType::Mapi => require(&self.config.alipay_public_key, "alipay_public_key"),
            AlipayApiType::Openapi => require(
                &self.config.alipay_public_key_rsa2,
                "alipay_public_key_rsa2",
            ),
        }
    }

    fn app_id(&self) -> Result<&str, AlipayError> {
        require(&self.config.alipay_app_id, "alipay_app_id")
    }

    /// Signed redirect URL for a PC (page) payment.
    #[allow(clippy::too_many_arguments)]
    pub fn create_page_pay(
        &self,
        return_url: &str,
        notify_url: &str,
        merchant_order_no: &str,
        charge_amount: i32,
        time_expire: i64,
        subject: &str,
        body: &str,
    ) -> Result<String, AlipayError> {
        self.create_pay(
            "create_direct_pay_by_user",
            "alipay.trade.page.pay",
            return_url,
            notify_url,
            merchant_order_no,
            charge_amount,
            time_expire,
            subject,
            body,
        )
    }

    /// Signed redirect URL for a mobile browser (WAP) payment.
    #[allow(clippy::too_many_arguments)]
    pub fn create_wap_pay(
        &self,
        return_url: &str,
        notify_url: &str,
        merchant_order_no: &str,
        charge_amount: i32,
        time_expire: i64,
        subject: &str,
        body: &str,
    ) -> Result<String, AlipayError> {
        self.create_pay(
            "alipay.wap.create.direct.pay.by.user",
            "alipay.trade.wap.pay",
            return_url,
            notify_url,
            merchant_order_no,
            charge_amount,
            time_expire,
            subject,
            body,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create_pay(
        &self,
        mapi_service: &str,
        openapi_method: &str,
        return_url: &str,
        notify_url: &str,
        merchant_order_no: &str,
        charge_amount: i32,
        time_expire: i64,
        subject: &str,
        body: &str,
    ) -> Result<String, AlipayError> {
        match self.config.alipay_version {
            AlipayApiType::Mapi => {
                let mut payload = MapiRequestPayload::new(
                    mapi_service,
                    &self.config.alipay_pid,
                    return_url,
                    notify_url,
                    merchant_order_no,
                    charge_amount,
                    time_expire,
                    subject,
                    body,
                )?;
                payload.sign_rsa(self.private_key()?)?;
                payload.pay_url()
            }
            AlipayApiType::Openapi => {
                let mut payload = OpenApiRequestPayload::new(
                    openapi_method,
                    self.app_id()?,
                    &self.config.alipay_pid,
                    return_url,
                    notify_url,
                    merchant_order_no,
                    charge_amount,
                    time_expire,
                    subject,
                    body,
                )?;
                payload.sign_rsa2(self.private_key()?)?;
                payload.pay_url()
            }
        }
    }

    /// alipay.trade.query (OpenAPI accounts only).
    pub async fn query_trade(
        &self,
        merchant_order_no: &str,
    ) -> Result<serde_json::Value, AlipayError> {
        let payload = OpenApiPayload::query(self.app_id()?, merchant_order_no);
        self.send_openapi(payload).await
    }

    /// alipay.trade.close (OpenAPI accounts only).
    pub async fn close_trade(
        &self,
        merchant_order_no: &str,
    ) -> Result<serde_json::Value, AlipayError> {
        let payload = OpenApiPayload::close(self.app_id()?, merchant_order_no);
        self.send_openapi(payload).await
    }

    /// Refund a charge. OpenAPI accounts get a server-to-server call;
    /// MAPI accounts get back a confirmation URL in `failure_msg` since
    /// that gateway cannot refund without operator interaction.
    pub async fn refund(
        &self,
        charge_merchant_order_no: &str,
        refund_merchant_order_no: &str,
        refund_notify_url: &str,
        refund_amount: i32,
        description: &str,
    ) -> Result<RefundOutcome, AlipayError> {
        match self.config.alipay_version {
            AlipayApiType::Mapi => {
                let mut payload = MapiRefundPayload::new(
                    &self.config.alipay_pid,
                    refund_notify_url,
                    charge_merchant_order_no,
                    refund_amount,
                    description,
                )?;
                payload.sign_rsa(self.private_key()?)?;
                let refund_url = payload.refund_url()?;
                Ok(RefundOutcome {
                    succeeded: false,
                    failure_msg: Some(format!("需要打开地址进行下一步退款操作: {}", refund_url)),
                    raw: serde_json::Value::Null,
                })
            }
            AlipayApiType::Openapi => {
                let payload = OpenApiPayload::refund(
                    self.app_id()?,
                    charge_merchant_order_no,
                    refund_merchant_order_no,
                    refund_amount,
                    description,
                );
                let node = self.send_openapi(payload).await?;
                // code=10000 only means the request was accepted; the
                // refund itself succeeded when fund_change=Y
                let succeeded = node["code"].as_str() == Some("10000")
                    && node["fund_change"].as_str() == Some("Y");
                let failure_msg = if succeeded {
                    None
                } else {
                    node["sub_msg"]
                        .as_str()
                        .or(node["msg"].as_str())
                        .map(|s| s.to_string())
                };
                Ok(RefundOutcome {
                    succeeded,
                    failure_msg,
                    raw: node,
                })
            }
        }
    }

    async fn send_openapi(
        &self,
        mut payload: OpenApiPayload,
    ) -> Result<serde_json::Value, AlipayError> {
        payload.sign_rsa2(self.private_key()?)?;
        let response_key = payload.response_key();
        let form = payload.to_map()?;
        tracing::debug!(method = %payload.method, "alipay openapi request: {:?}", form);
        let body = self
            .transport
            .post_form(openapi::OPENAPI_GATEWAY, &form)
            .await?;
        tracing::debug!("alipay openapi response: {}", body);
        openapi::verify_response(&body, &response_key, self.public_key()?)
    }

    /// Parse and verify an asynchronous notification, dispatching on the
    /// configured gateway generation. Returns whether the trade succeeded
    /// plus the merchant order no and amount for reconciliation.
    pub fn verify_notify(&self, payload: &str) -> Result<(bool, String, i32), AlipayError> {
        match self.config.alipay_version {
            AlipayApiType::Mapi => {
                let notify = MapiNotifyPayload::new(payload)?;
                notify.verify_rsa_sign(self.public_key()?)?;
                Ok((
                    notify.trade_succeeded(),
                    notify.merchant_order_no,
                    notify.amount,
                ))
            }
            AlipayApiType::Openapi => {
                let notify = OpenApiNotifyPayload::new(payload)?;
                notify.verify_rsa2_sign(self.public_key()?)?;
                Ok((
                    notify.trade_succeeded(),
                    notify.merchant_order_no,
                    notify.amount,
                ))
            }
        }
    }
}

fn require<'a>(value: &'a str, name: &str) -> Result<&'a str, AlipayError> {
    if value.is_empty() {
        return Err(AlipayError::InvalidConfig(format!("missing {}", name)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alipay::sign::test_keys::{PRIVATE_KEY, PUBLIC_KEY};
    use crate::core::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn openapi_config() -> AlipayConfig {
        AlipayConfig::from_json(json!({
            "alipay_pid": "2088101568358171",
            "alipay_security_key": "secretkey123",
            "alipay_version": 2,
            "alipay_app_id": "2021001234567890",
            "alipay_private_key_rsa2": PRIVATE_KEY,
            "alipay_public_key_rsa2": PUBLIC_KEY,
        }))
        .unwrap()
    }

    fn mapi_config() -> AlipayConfig {
        AlipayConfig::from_json(json!({
            "alipay_pid": "2088101568358171",
            "alipay_security_key": "secretkey123",
            "alipay_version": 1,
            "alipay_private_key": PRIVATE_KEY,
            "alipay_public_key": PUBLIC_KEY,
        }))
        .unwrap()
    }

    struct FakeTransport {
        response: String,
        posted_forms: Mutex<Vec<HashMap<String, String>>>,
    }

    impl FakeTransport {
        fn new(response: String) -> Arc<Self> {
            Arc::new(Self {
                response,
                posted_forms: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, _url: &str, _body: String) -> Result<String, TransportError> {
            Ok(self.response.clone())
        }

        async fn post_form(
            &self,
            _url: &str,
            form: &HashMap<String, String>,
        ) -> Result<String, TransportError> {
            self.posted_forms.lock().unwrap().push(form.clone());
            Ok(self.response.clone())
        }
    }

    fn signed_response(key: &str, node_text: &str) -> String {
        let signature =
            crate::alipay::sign::openapi_rsa2::sign_raw(node_text, PRIVATE_KEY).unwrap();
        format!(r#"{{"{}":{},"sign":"{}"}}"#, key, node_text, signature)
    }

    #[test]
    fn unknown_api_type_is_rejected() {
        let err = AlipayConfig::from_json(json!({
            "alipay_pid": "p",
            "alipay_security_key": "k",
            "alipay_version": 3,
        }))
        .unwrap_err();
        assert!(matches!(err, AlipayError::InvalidConfig(_)));
    }

    #[test]
    fn page_pay_dispatches_on_api_type() {
        let expire = chrono::Utc::now().timestamp() + 1800;
        let mapi_url = AlipayClient::new(mapi_config())
            .create_page_pay("https://r", "https://n", "20240601001", 100, expire, "s", "b")
            .unwrap();
        assert!(mapi_url.starts_with("https://mapi.alipay.com/gateway.do"));
        assert!(mapi_url.contains("service=create_direct_pay_by_user"));

        let openapi_url = AlipayClient::new(openapi_config())
            .create_page_pay("https://r", "https://n", "20240601001", 100, expire, "s", "b")
            .unwrap();
        assert!(openapi_url.starts_with("https://openapi.alipay.com/gateway.do"));
        assert!(openapi_url.contains("method=alipay.trade.page.pay"));
    }

    #[test]
    fn missing_private_key_is_config_error() {
        let mut config = openapi_config();
        config.alipay_private_key_rsa2 = String::new();
        let err = AlipayClient::new(config)
            .create_page_pay(
                "https://r",
                "https://n",
                "20240601001",
                100,
                chrono::Utc::now().timestamp() + 1800,
                "s",
                "b",
            )
            .unwrap_err();
        assert!(matches!(err, AlipayError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn query_trade_posts_signed_form_and_verifies_response() {
        let node = r#"{"code":"10000","msg":"Success","trade_status":"TRADE_SUCCESS"}"#;
        let transport =
            FakeTransport::new(signed_response("alipay_trade_query_response", node));
        let client = AlipayClient::with_transport(openapi_config(), transport.clone());

        let result = client.query_trade("20240601001").await.unwrap();
        assert_eq!(result["trade_status"], "TRADE_SUCCESS");

        let forms = transport.posted_forms.lock().unwrap();
        let form = &forms[0];
        assert_eq!(form.get("method").map(String::as_str), Some("alipay.trade.query"));
        assert_eq!(form.get("sign_type").map(String::as_str), Some("RSA2"));
        let signature = form.get("sign").unwrap();
        assert!(
            crate::alipay::sign::openapi_rsa2::verify(form, signature, PUBLIC_KEY).unwrap()
        );
        // sign_type is part of what the gateway verifies
        let mut altered = form.clone();
        altered.insert("sign_type".to_string(), "RSA".to_string());
        assert!(
            !crate::alipay::sign::openapi_rsa2::verify(&altered, signature, PUBLIC_KEY).unwrap()
        );
    }

    #[tokio::test]
    async fn refund_requires_fund_change() {
        let node = r#"{"code":"10000","msg":"Success","fund_change":"N"}"#;
        let transport =
            FakeTransport::new(signed_response("alipay_trade_refund_response", node));
        let client = AlipayClient::with_transport(openapi_config(), transport);
        let outcome = client
            .refund("20240601001", "RE001", "https://n", 100, "reason")
            .await
            .unwrap();
        assert!(!outcome.succeeded);

        let node = r#"{"code":"10000","msg":"Success","fund_change":"Y"}"#;
        let transport =
            FakeTransport::new(signed_response("alipay_trade_refund_response", node));
        let client = AlipayClient::with_transport(openapi_config(), transport);
        let outcome = client
            .refund("20240601001", "RE001", "https://n", 100, "reason")
            .await
            .unwrap();
        assert!(outcome.succeeded);
    }

    #[tokio::test]
    async fn tampered_openapi_response_is_rejected() {
        let node = r#"{"code":"10000","msg":"Success","trade_status":"TRADE_SUCCESS"}"#;
        let body = signed_response("alipay_trade_query_response", node)
            .replace("TRADE_SUCCESS", "TRADE_CLOSED");
        let transport = FakeTransport::new(body);
        let client = AlipayClient::with_transport(openapi_config(), transport);
        let err = client.query_trade("20240601001").await.unwrap_err();
        assert!(matches!(err, AlipayError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn empty_openapi_response_is_fatal() {
        let transport = FakeTransport::new(String::new());
        let client = AlipayClient::with_transport(openapi_config(), transport);
        let err = client.query_trade("20240601001").await.unwrap_err();
        assert!(matches!(err, AlipayError::ApiError(_)));
    }
}

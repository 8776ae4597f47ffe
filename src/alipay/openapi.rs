use super::{sign::openapi_rsa2, AlipayError};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

pub const OPENAPI_GATEWAY: &str = "https://openapi.alipay.com/gateway.do";

/// OpenAPI envelope. Every endpoint shares these fields; the
/// endpoint-specific parameters travel inside the `biz_content` JSON.
#[derive(Debug, Serialize)]
pub struct OpenApiPayload {
    pub app_id: String,
    pub method: String,
    pub format: String,
    pub charset: String,
    pub sign_type: String,
    pub sign: String,
    pub timestamp: String,
    pub version: String,
    pub biz_content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notify_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub return_url: String,
}

impl OpenApiPayload {
    pub fn new(alipay_app_id: &str, method: &str, biz_content: serde_json::Value) -> Self {
        Self {
            app_id: alipay_app_id.to_string(),
            method: method.to_string(),
            format: String::from("JSON"),
            charset: String::from("utf-8"),
            sign_type: String::from("RSA2"),
            sign: String::from(""),
            timestamp: crate::utils::alipay_timestamp(),
            version: String::from("1.0"),
            biz_content: biz_content.to_string(),
            notify_url: String::new(),
            return_url: String::new(),
        }
    }

    pub fn query(alipay_app_id: &str, merchant_order_no: &str) -> Self {
        Self::new(
            alipay_app_id,
            "alipay.trade.query",
            json!({ "out_trade_no": merchant_order_no }),
        )
    }

    pub fn close(alipay_app_id: &str, merchant_order_no: &str) -> Self {
        Self::new(
            alipay_app_id,
            "alipay.trade.close",
            json!({ "out_trade_no": merchant_order_no }),
        )
    }

    pub fn refund(
        alipay_app_id: &str,            // 开放平台应用 ID
        charge_merchant_order_no: &str, // 支付时的商户订单号
        refund_merchant_order_no: &str, // 退款请求号, 部分退款时必须唯一
        refund_amount: i32,             // 退款金额, 精确到分
        description: &str,              // 退款说明
    ) -> Self {
        let refund_amount = format!("{:.2}", refund_amount as f64 / 100.0);
        Self::new(
            alipay_app_id,
            "alipay.trade.refund",
            json!({
                "refund_amount": refund_amount,
                "out_trade_no": charge_merchant_order_no,
                "out_request_no": refund_merchant_order_no,
                "refund_reason": description,
            }),
        )
    }

    pub fn sign_rsa2(&mut self, private_key: &str) -> Result<String, AlipayError> {
        let m = self.to_map()?;
        let signature = openapi_rsa2::sign(&m, private_key)?;
        self.sign = signature.clone();
        Ok(signature)
    }

    /// JSON key the gateway nests this method's response under.
    pub fn response_key(&self) -> String {
        format!("{}_response", self.method.replace('.', "_"))
    }

    pub fn to_map(&self) -> Result<HashMap<String, String>, AlipayError> {
        let v = serde_json::to_value(self).map_err(|e| {
            AlipayError::Unexpected(format!("error serializing openapi payload: {:?}", e))
        })?;
        serde_json::from_value(v).map_err(|e| {
            AlipayError::Unexpected(format!("openapi payload fields must be strings: {:?}", e))
        })
    }
}

/// Page / WAP payment request: signed envelope rendered as a redirect URL
/// on the gateway, same shape as the server-to-server calls.
#[derive(Debug)]
pub struct OpenApiRequestPayload(pub OpenApiPayload);

impl OpenApiRequestPayload {
    pub fn new(
        method: &str,            // alipay.trade.page.pay | alipay.trade.wap.pay
        alipay_app_id: &str,     // 开放平台应用 ID
        alipay_pid: &str,        // 合作者身份 ID, 商家唯一 ID
        return_url: &str,        // 支付成功跳转
        notify_url: &str,        // 异步通知地址
        merchant_order_no: &str, // 商户订单号
        charge_amount: i32,      // 支付金额, 精确到分
        time_expire: i64,        // 过期时间 timestamp 精确到秒
        subject: &str,           // 标题
        body: &str,              // 详情
    ) -> Result<Self, AlipayError> {
        let total_amount = format!("{:.2}", charge_amount as f64 / 100.0);
        let timeout_express = {
            let now = chrono::Utc::now().timestamp();
            if time_expire > now {
                let seconds = time_expire - now;
                format!("{}m", if seconds > 60 { seconds / 60 } else { 1 })
            } else {
                return Err(AlipayError::MalformedRequest(
                    "expire_in_seconds < now".into(),
                ));
            }
        };
        let biz_content = json!({
            "body": body,
            "subject": subject,
            "out_trade_no": merchant_order_no,
            "total_amount": total_amount,
            "product_code": "FAST_INSTANT_TRADE_PAY",
            "extend_params": { "sys_service_provider_id": alipay_pid },
            "timeout_express": timeout_express,
        });
        let mut payload = OpenApiPayload::new(alipay_app_id, method, biz_content);
        payload.return_url = return_url.to_string();
        payload.notify_url = notify_url.to_string();
        Ok(Self(payload))
    }

    pub fn sign_rsa2(&mut self, private_key: &str) -> Result<String, AlipayError> {
        self.0.sign_rsa2(private_key)
    }

    pub fn pay_url(&self) -> Result<String, AlipayError> {
        let res = reqwest::Client::new()
            .get(OPENAPI_GATEWAY)
            .query(&self.0)
            .build()
            .map_err(|e| AlipayError::Unexpected(format!("error building pay url: {:?}", e)))?;
        Ok(res.url().to_string())
    }
}

/// Pull `"<key>": {...}` out of the gateway body as raw text. The
/// response signature is computed over that literal text, so it cannot be
/// re-serialized before verifying.
pub fn extract_response_node(body: &str, response_key: &str) -> Result<String, AlipayError> {
    let marker = format!("\"{}\"", response_key);
    let key_pos = body
        .find(&marker)
        .ok_or_else(|| AlipayError::ApiError(format!("missing {} in response", response_key)))?;
    let start = body[key_pos..]
        .find('{')
        .map(|i| key_pos + i)
        .ok_or_else(|| AlipayError::ApiError("malformed response node".into()))?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(body[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    Err(AlipayError::ApiError("malformed response node".into()))
}

/// Verify the gateway body and return the parsed response node. Bodies
/// without a `sign` field (some error answers) are parsed but not checked.
pub fn verify_response(
    body: &str,
    response_key: &str,
    public_key: &str,
) -> Result<serde_json::Value, AlipayError> {
    if body.trim().is_empty() {
        return Err(AlipayError::ApiError("response body is empty".into()));
    }
    let res_json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AlipayError::ApiError(format!("error deserializing response: {}", e)))?;
    let node = res_json
        .get(response_key)
        .cloned()
        .ok_or_else(|| AlipayError::ApiError(format!("missing {} in response", response_key)))?;
    if let Some(signature) = res_json.get("sign").and_then(|s| s.as_str()) {
        let node_text = extract_response_node(body, response_key)?;
        let verified = openapi_rsa2::verify_raw(&node_text, signature, public_key)?;
        if !verified {
            return Err(AlipayError::InvalidSignature(
                "response sign does not match".into(),
            ));
        }
    }
    Ok(node)
}

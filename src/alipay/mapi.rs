use super::{sign::mapi_rsa, AlipayError};
use serde::Serialize;
use std::collections::HashMap;

pub const MAPI_GATEWAY: &str = "https://mapi.alipay.com/gateway.do";

/// Legacy gateway payment request (PC or WAP). The whole signed parameter
/// set becomes a redirect URL; there is no server-to-server exchange.
#[derive(Debug, Serialize)]
pub struct MapiRequestPayload {
    pub service: String,
    pub _input_charset: String,
    pub return_url: String,
    pub notify_url: String,
    pub partner: String,
    pub out_trade_no: String,
    pub subject: String,
    pub body: String,
    pub total_fee: String,
    pub payment_type: String,
    pub seller_id: String,
    pub it_b_pay: String,
    pub sign: String,
    pub sign_type: String,
}

impl MapiRequestPayload {
    pub fn new(
        service: &str,           // create_direct_pay_by_user | alipay.wap.create.direct.pay.by.user
        alipay_pid: &str,        // 合作者身份 ID, 商家唯一 ID
        return_url: &str,        // 支付成功跳转
        notify_url: &str,        // 异步通知地址
        merchant_order_no: &str, // 商户订单号
        charge_amount: i32,      // 支付金额, 精确到分
        time_expire: i64,        // 过期时间 timestamp 精确到秒
        subject: &str,           // 标题
        body: &str,              // 详情
    ) -> Result<Self, AlipayError> {
        let total_fee = format!("{:.2}", charge_amount as f64 / 100.0);
        let it_b_pay = {
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
        Ok(Self {
            service: String::from(service),
            _input_charset: String::from("utf-8"),
            return_url: return_url.to_string(),
            notify_url: notify_url.to_string(),
            partner: alipay_pid.to_string(),
            out_trade_no: merchant_order_no.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            total_fee,
            payment_type: String::from("1"),
            seller_id: alipay_pid.to_string(),
            it_b_pay,
            sign: String::from(""),
            sign_type: String::from("RSA"),
        })
    }

    pub fn sign_rsa(&mut self, private_key: &str) -> Result<String, AlipayError> {
        let m = self.to_map()?;
        let signature = mapi_rsa::sign(&m, private_key)?;
        self.sign = signature.clone();
        Ok(signature)
    }

    pub fn sign_md5(&mut self, sign_key: &str) -> Result<String, AlipayError> {
        let m = self.to_map()?;
        let signature = mapi_rsa::sign_md5(&m, sign_key);
        self.sign = signature.clone();
        self.sign_type = String::from("MD5");
        Ok(signature)
    }

    /// Signed redirect URL on the gateway.
    pub fn pay_url(&self) -> Result<String, AlipayError> {
        build_gateway_url(self)
    }

    fn to_map(&self) -> Result<HashMap<String, String>, AlipayError> {
        let v = serde_json::to_value(self).map_err(|e| {
            AlipayError::Unexpected(format!("error serializing mapi payload: {:?}", e))
        })?;
        serde_json::from_value(v).map_err(|e| {
            AlipayError::Unexpected(format!("mapi payload fields must be strings: {:?}", e))
        })
    }
}

/// refund_fastpay_by_platform_pwd: batch format, one entry of
/// `out_trade_no^amount^reason`. The result is a URL the merchant
/// operator opens to confirm with the platform password.
#[derive(Debug, Serialize)]
pub struct MapiRefundPayload {
    pub service: String,
    pub partner: String,
    pub _input_charset: String,
    pub sign_type: String,
    pub sign: String,
    pub notify_url: String,
    pub seller_user_id: String,
    pub refund_date: String,
    pub batch_no: String,
    pub batch_num: String,
    pub detail_data: String,
}

impl MapiRefundPayload {
    pub fn new(
        alipay_pid: &str,        // 合作者身份 ID, 商家唯一 ID
        notify_url: &str,        // 退款异步通知地址
        merchant_order_no: &str, // 商户订单号
        refund_amount: i32,      // 退款金额, 精确到分
        description: &str,       // 退款说明
    ) -> Result<Self, AlipayError> {
        let refund_amount = format!("{:.2}", refund_amount as f64 / 100.0);
        let now = chrono::Utc::now();
        let batch_no = format!("{}{}", now.format("%Y%m%d"), now.timestamp_millis());
        let refund_date = now.format("%Y-%m-%d %H:%M:%S").to_string();
        Ok(Self {
            service: String::from("refund_fastpay_by_platform_pwd"),
            partner: alipay_pid.to_string(),
            _input_charset: String::from("utf-8"),
            sign_type: String::from("RSA"),
            sign: String::from(""),
            notify_url: notify_url.to_string(),
            seller_user_id: alipay_pid.to_string(),
            refund_date,
            batch_no,
            batch_num: String::from("1"),
            detail_data: format!("{}^{}^{}", merchant_order_no, refund_amount, description),
        })
    }

    pub fn sign_rsa(&mut self, private_key: &str) -> Result<String, AlipayError> {
        let v = serde_json::to_value(&self).map_err(|e| {
            AlipayError::Unexpected(format!("error serializing refund payload: {:?}", e))
        })?;
        let m: HashMap<String, String> = serde_json::from_value(v).map_err(|e| {
            AlipayError::Unexpected(format!("refund payload fields must be strings: {:?}", e))
        })?;
        let signature = mapi_rsa::sign(&m, private_key)?;
        self.sign = signature.clone();
        Ok(signature)
    }

    pub fn refund_url(&self) -> Result<String, AlipayError> {
        build_gateway_url(self)
    }
}

fn build_gateway_url<T: Serialize>(payload: &T) -> Result<String, AlipayError> {
    let res = reqwest::Client::new()
        .get(MAPI_GATEWAY)
        .query(payload)
        .build()
        .map_err(|e| AlipayError::Unexpected(format!("error building gateway url: {:?}", e)))?;
    Ok(res.url().to_string())
}

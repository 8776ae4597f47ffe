use super::{sign::SignType, WeChatError, WeChatPayConfig};
use serde::Serialize;
use std::collections::HashMap;

/// Per-endpoint contract: URL, digest mode, signature exclusion rule and
/// which merchant identity fields the endpoint expects. The parameter
/// names are provider constants and cannot be renamed.
pub trait WeChatPayRequest: Serialize {
    fn api_url(&self) -> &'static str;

    fn sign_type(&self) -> SignType {
        SignType::Md5
    }

    /// Most endpoints leave `sign_type` out of the signature base even
    /// when it is sent; getpublickey is the documented exception.
    fn exclude_sign_type(&self) -> bool {
        true
    }

    fn needs_certificate(&self) -> bool {
        false
    }

    /// Fill merchant identity and endpoint-fixed fields from the config.
    /// Fallible because some endpoints also encrypt fields with
    /// config-held key material.
    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if m.get("appid").map_or(true, |v| v.is_empty()) {
            m.insert("appid".to_string(), config.app_id.clone());
        }
        m.insert("mch_id".to_string(), config.mch_id.clone());
        Ok(())
    }

    fn parameters(&self) -> Result<HashMap<String, String>, WeChatError> {
        let v = serde_json::to_value(self).map_err(|e| {
            WeChatError::MalformedRequest(format!("error serializing request: {:?}", e))
        })?;
        serde_json::from_value(v).map_err(|e| {
            WeChatError::MalformedRequest(format!("request fields must be strings: {:?}", e))
        })
    }
}

/// https://pay.weixin.qq.com/wiki/doc/api/jsapi.php?chapter=9_1
#[derive(Debug, Default, Serialize)]
pub struct UnifiedOrderRequest {
    pub appid: String,
    pub body: String,
    pub detail: String,
    pub attach: String,
    pub out_trade_no: String,
    pub fee_type: String,
    pub total_fee: String,
    pub spbill_create_ip: String,
    pub time_expire: String,
    pub notify_url: String,
    pub trade_type: String,
    pub product_id: String,
    pub openid: String,
}

impl UnifiedOrderRequest {
    pub fn new_jsapi(
        open_id: &str,           // 支付用户的 openid
        client_ip: &str,         // 客户端 IP
        notify_url: &str,        // 异步通知地址
        merchant_order_no: &str, // 商户订单号
        charge_amount: i32,      // 支付金额, 精确到分
        time_expire: i64,        // 过期时间 timestamp 精确到秒
        body: &str,              // 详情
    ) -> Result<Self, WeChatError> {
        let time_expire = crate::utils::wechat_time_expire(time_expire).ok_or_else(|| {
            WeChatError::MalformedRequest("can't convert timestamp to datetime".into())
        })?;
        Ok(Self {
            body: body.to_string(),
            out_trade_no: merchant_order_no.to_string(),
            total_fee: format!("{}", charge_amount),
            spbill_create_ip: client_ip.to_string(),
            time_expire,
            notify_url: notify_url.to_string(),
            trade_type: String::from("JSAPI"),
            openid: open_id.to_string(),
            ..Default::default()
        })
    }
}

impl WeChatPayRequest for UnifiedOrderRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/pay/unifiedorder"
    }
}

#[derive(Debug, Default, Serialize)]
pub struct OrderQueryRequest {
    pub transaction_id: String,
    pub out_trade_no: String,
}

impl WeChatPayRequest for OrderQueryRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/pay/orderquery"
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CloseOrderRequest {
    pub out_trade_no: String,
}

impl WeChatPayRequest for CloseOrderRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/pay/closeorder"
    }
}

/// https://pay.weixin.qq.com/wiki/doc/api/jsapi.php?chapter=9_4
#[derive(Debug, Default, Serialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    pub out_trade_no: String,
    pub out_refund_no: String,
    pub total_fee: String,
    pub refund_fee: String,
    pub refund_fee_type: String,
    pub refund_desc: String,
    pub refund_account: String,
    pub notify_url: String,
}

impl WeChatPayRequest for RefundRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/secapi/pay/refund"
    }

    fn needs_certificate(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RefundQueryRequest {
    pub transaction_id: String,
    pub out_trade_no: String,
    pub out_refund_no: String,
    pub refund_id: String,
    pub offset: String,
}

impl WeChatPayRequest for RefundQueryRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/pay/refundquery"
    }
}

/// 企业付款到零钱. Identity fields are `mch_appid` / `mchid` on this
/// endpoint, not `appid` / `mch_id`.
#[derive(Debug, Default, Serialize)]
pub struct TransfersRequest {
    pub mch_appid: String,
    pub partner_trade_no: String,
    pub openid: String,
    pub check_name: String,
    pub re_user_name: String,
    pub amount: String,
    pub desc: String,
    pub spbill_create_ip: String,
}

impl WeChatPayRequest for TransfersRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaymkttransfers/promotion/transfers"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if m.get("mch_appid").map_or(true, |v| v.is_empty()) {
            m.insert("mch_appid".to_string(), config.app_id.clone());
        }
        m.insert("mchid".to_string(), config.mch_id.clone());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
pub struct GetTransferInfoRequest {
    pub partner_trade_no: String,
}

impl WeChatPayRequest for GetTransferInfoRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaymkttransfers/gettransferinfo"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if m.get("appid").map_or(true, |v| v.is_empty()) {
            m.insert("appid".to_string(), config.app_id.clone());
        }
        m.insert("mch_id".to_string(), config.mch_id.clone());
        m.insert("sign_type".to_string(), "MD5".to_string());
        Ok(())
    }
}

/// RSA public key download, served from the fraud host. The only v2
/// endpoint whose `sign_type` field enters the signature base.
#[derive(Debug, Default, Serialize)]
pub struct GetPublicKeyRequest {}

impl WeChatPayRequest for GetPublicKeyRequest {
    fn api_url(&self) -> &'static str {
        "https://fraud.mch.weixin.qq.com/risk/getpublickey"
    }

    fn exclude_sign_type(&self) -> bool {
        false
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        m.insert("mch_id".to_string(), config.mch_id.clone());
        m.insert("sign_type".to_string(), "MD5".to_string());
        Ok(())
    }
}

/// Fund flow bill download, the one HMAC-SHA256 endpoint. On success the
/// body is the bill text rather than an XML document.
#[derive(Debug, Default, Serialize)]
pub struct DownloadFundFlowRequest {
    pub bill_date: String,
    pub account_type: String,
    pub tar_type: String,
}

impl WeChatPayRequest for DownloadFundFlowRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/pay/downloadfundflow"
    }

    fn sign_type(&self) -> SignType {
        SignType::HmacSha256
    }

    fn needs_certificate(&self) -> bool {
        true
    }
}

/// 现金红包. Identity field is `wxappid` here.
#[derive(Debug, Default, Serialize)]
pub struct SendRedPackRequest {
    pub wxappid: String,
    pub mch_billno: String,
    pub send_name: String,
    pub re_openid: String,
    pub total_amount: String,
    pub total_num: String,
    pub wishing: String,
    pub client_ip: String,
    pub act_name: String,
    pub remark: String,
    pub scene_id: String,
}

impl WeChatPayRequest for SendRedPackRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaymkttransfers/sendredpack"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if m.get("wxappid").map_or(true, |v| v.is_empty()) {
            m.insert("wxappid".to_string(), config.app_id.clone());
        }
        m.insert("mch_id".to_string(), config.mch_id.clone());
        Ok(())
    }
}

/// 裂变红包, one sender split across several recipients. Same identity
/// treatment as the single red pack.
#[derive(Debug, Default, Serialize)]
pub struct SendGroupRedPackRequest {
    pub wxappid: String,
    pub mch_billno: String,
    pub send_name: String,
    pub re_openid: String,
    pub total_amount: String,
    pub total_num: String,
    pub amt_type: String,
    pub wishing: String,
    pub act_name: String,
    pub remark: String,
    pub scene_id: String,
}

impl WeChatPayRequest for SendGroupRedPackRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaymkttransfers/sendgroupredpack"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if m.get("wxappid").map_or(true, |v| v.is_empty()) {
            m.insert("wxappid".to_string(), config.app_id.clone());
        }
        m.insert("mch_id".to_string(), config.mch_id.clone());
        Ok(())
    }
}

/// 企业付款到银行卡. Card number and holder name are RSA-OAEP encrypted
/// with the merchant public key during completion; the endpoint takes no
/// appid.
#[derive(Debug, Default, Serialize)]
pub struct PayBankRequest {
    pub partner_trade_no: String,
    pub enc_bank_no: String,
    pub enc_true_name: String,
    pub bank_code: String,
    pub amount: String,
    pub desc: String,
}

impl PayBankRequest {
    pub fn new(
        partner_trade_no: &str, // 商户订单号
        bank_no: &str,          // 银行卡号, 明文
        true_name: &str,        // 开户人姓名, 明文
        bank_code: &str,        // 银行编码
        amount: i32,            // 付款金额, 精确到分
        desc: &str,             // 付款说明
    ) -> Self {
        Self {
            partner_trade_no: partner_trade_no.to_string(),
            enc_bank_no: bank_no.to_string(),
            enc_true_name: true_name.to_string(),
            bank_code: bank_code.to_string(),
            amount: format!("{}", amount),
            desc: desc.to_string(),
        }
    }
}

impl WeChatPayRequest for PayBankRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaysptrans/pay_bank"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        if config.rsa_public_key.is_empty() {
            return Err(WeChatError::InvalidConfig("missing rsa_public_key".into()));
        }
        for field in ["enc_bank_no", "enc_true_name"] {
            let plain = m.get(field).cloned().unwrap_or_default();
            if plain.is_empty() {
                continue;
            }
            let encrypted = super::sign::rsa_oaep_encrypt(&plain, &config.rsa_public_key)?;
            m.insert(field.to_string(), encrypted);
        }
        m.insert("mch_id".to_string(), config.mch_id.clone());
        m.insert("sign_type".to_string(), "MD5".to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
pub struct QueryBankRequest {
    pub partner_trade_no: String,
}

impl WeChatPayRequest for QueryBankRequest {
    fn api_url(&self) -> &'static str {
        "https://api.mch.weixin.qq.com/mmpaysptrans/query_bank"
    }

    fn needs_certificate(&self) -> bool {
        true
    }

    fn complete(
        &self,
        m: &mut HashMap<String, String>,
        config: &WeChatPayConfig,
    ) -> Result<(), WeChatError> {
        m.insert("mch_id".to_string(), config.mch_id.clone());
        m.insert("sign_type".to_string(), "MD5".to_string());
        Ok(())
    }
}

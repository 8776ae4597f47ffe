use super::WeChatError;
use std::collections::HashMap;

/// `<xml><k><![CDATA[v]]></k>...</xml>` request body, keys sorted, empty
/// values skipped (they are not part of the signature either).
pub fn build_xml(m: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = m
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, _)| k)
        .collect();
    keys.sort();
    let mut body = String::from("<xml>");
    for k in keys {
        body.push_str(&format!("<{}><![CDATA[{}]]></{}>", k, m[k], k));
    }
    body.push_str("</xml>");
    body
}

/// Flatten a one-level v2 response/notify document into a parameter map.
/// Values may come as plain text or CDATA.
pub fn parse_xml(payload: &str) -> Result<HashMap<String, String>, WeChatError> {
    let mut m = HashMap::<String, String>::new();
    let mut parser = quick_xml::Reader::from_str(payload);
    parser.config_mut().trim_text(true);
    let _ = parser.read_event(); // Skip root element
    loop {
        match parser.read_event() {
            Ok(quick_xml::events::Event::Start(ref e)) => {
                let key = String::from_utf8_lossy(e.name().0).to_string();
                let value = match parser.read_event() {
                    Ok(quick_xml::events::Event::CData(cdata)) => {
                        String::from_utf8_lossy(&cdata).to_string()
                    }
                    Ok(quick_xml::events::Event::Text(text)) => {
                        text.unescape().unwrap_or_default().to_string()
                    }
                    _ => String::new(),
                };
                m.insert(key, value);
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(WeChatError::ApiError(format!("error parsing xml {}", e))),
            _ => {}
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_xml_sorts_keys_and_skips_empty() {
        let mut m = HashMap::new();
        m.insert("mch_id".to_string(), "10000100".to_string());
        m.insert("appid".to_string(), "wx1234".to_string());
        m.insert("attach".to_string(), "".to_string());
        assert_eq!(
            build_xml(&m),
            "<xml><appid><![CDATA[wx1234]]></appid><mch_id><![CDATA[10000100]]></mch_id></xml>"
        );
    }

    #[test]
    fn parse_xml_handles_text_and_cdata() {
        let payload = "<xml>\
            <return_code><![CDATA[SUCCESS]]></return_code>\
            <return_msg><![CDATA[OK]]></return_msg>\
            <total_fee>100</total_fee>\
            <body><![CDATA[test &amp; demo]]></body>\
            </xml>";
        let m = parse_xml(payload).unwrap();
        assert_eq!(m.get("return_code").map(String::as_str), Some("SUCCESS"));
        assert_eq!(m.get("total_fee").map(String::as_str), Some("100"));
        assert_eq!(m.get("body").map(String::as_str), Some("test &amp; demo"));
    }

    #[test]
    fn build_then_parse_round_trip() {
        let mut m = HashMap::new();
        m.insert("out_trade_no".to_string(), "20240601001".to_string());
        m.insert("nonce_str".to_string(), "ibuaiVcKdpRxkhJA".to_string());
        let parsed = parse_xml(&build_xml(&m)).unwrap();
        assert_eq!(parsed, m);
    }
}

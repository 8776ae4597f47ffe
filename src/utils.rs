/// 32 character alphanumeric nonce, one per request.
pub fn nonce_str() -> String {
    (0..32)
        .map(|_| {
            let idx = rand::random::<usize>() % 62;
            if idx < 10 {
                (idx as u8 + 48) as char
            } else if idx < 36 {
                (idx as u8 + 55) as char
            } else {
                (idx as u8 + 61) as char
            }
        })
        .collect::<String>()
}

pub fn timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Alipay gateway timestamp, `%Y-%m-%d %H:%M:%S`.
pub fn alipay_timestamp() -> String {
    chrono::Utc::now()
        .with_timezone(&chrono::FixedOffset::east_opt(8 * 3600).unwrap())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// WeChat `time_expire` format (`%Y%m%d%H%M%S`, UTC+8) from a unix timestamp.
pub fn wechat_time_expire(time_expire: i64) -> Option<String> {
    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp(time_expire, 0)?;
    Some(
        dt.with_timezone(&chrono::FixedOffset::east_opt(8 * 3600).unwrap())
            .format("%Y%m%d%H%M%S")
            .to_string(),
    )
}

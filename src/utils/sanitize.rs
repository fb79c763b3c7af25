use serde_json::Value;

/// Masks personal data and secrets in JSON payloads for logging.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

/// Same as [`sanitize_json`] for a form-urlencoded body.
pub fn sanitize_form(body: &str) -> String {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(key, value)| {
            let value = if is_sensitive_field(&key) {
                mask_str(&value)
            } else {
                value.into_owned()
            };
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "email"
            | "phone"
            | "address"
            | "password"
            | "secret"
            | "token"
            | "tradeinfo"
            | "tradesha"
            | "hashkey"
            | "hashiv"
            | "payeraccount5code"
            | "authorization"
    )
}

fn mask_str(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 8 {
        let visible: String = chars[..4].iter().collect();
        let end: String = chars[chars.len() - 4..].iter().collect();
        format!("{}****{}", visible, end)
    } else {
        "****".to_string()
    }
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_str(s)),
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_order_intent() {
        let input = json!({
            "name": "王小明",
            "email": "ming@example.com",
            "phone": "0912345678",
            "amount": 1680
        });

        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["email"], "ming****.com");
        assert_eq!(sanitized["phone"], "0912****5678");
        assert_eq!(sanitized["amount"], 1680);
        assert_eq!(sanitized["name"], "王小明");
    }

    #[test]
    fn test_sanitize_nested() {
        let input = json!({
            "customer": {
                "address": "台北市信義區市府路1號",
                "note": "週末配送"
            }
        });

        let sanitized = sanitize_json(&input);
        assert!(sanitized["customer"]["address"].as_str().unwrap().contains("****"));
        assert_eq!(sanitized["customer"]["note"], "週末配送");
    }

    #[test]
    fn test_sanitize_form() {
        let sanitized = sanitize_form("Status=SUCCESS&TradeInfo=abcdef0123456789&TradeSha=AB");
        assert_eq!(sanitized, "Status=SUCCESS&TradeInfo=abcd****6789&TradeSha=****");
    }
}

use serde::Deserialize;
use std::fmt;

use crate::order_service::CreateOrderRequest;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PHONE_LEN: usize = 10;
pub const ADDRESS_MIN_LEN: usize = 5;
pub const ADDRESS_MAX_LEN: usize = 200;
pub const NOTE_MAX_LEN: usize = 500;
pub const PRODUCT_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Order intent exactly as the storefront posts it.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderIntent {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
    pub product_name: String,
}

impl OrderIntent {
    /// Sanitizes every field and checks it, yielding the request to forward.
    pub fn validate(self) -> Result<CreateOrderRequest, ValidationError> {
        let name = sanitize_string(&self.name);
        validate_required("name", &name)?;
        validate_min_chars("name", &name, NAME_MIN_LEN)?;
        validate_max_chars("name", &name, NAME_MAX_LEN)?;

        let email = sanitize_string(&self.email);
        validate_email(&email)?;

        let phone = sanitize_string(&self.phone);
        validate_mobile_phone(&phone)?;

        let address = sanitize_string(&self.address);
        validate_required("address", &address)?;
        validate_min_chars("address", &address, ADDRESS_MIN_LEN)?;
        validate_max_chars("address", &address, ADDRESS_MAX_LEN)?;

        validate_positive_amount(self.amount)?;

        let note = self
            .note
            .map(|note| sanitize_string(&note))
            .filter(|note| !note.is_empty());
        if let Some(note) = &note {
            validate_max_chars("note", note, NOTE_MAX_LEN)?;
        }

        let product_name = sanitize_string(&self.product_name);
        validate_required("product_name", &product_name)?;
        validate_max_chars("product_name", &product_name, PRODUCT_NAME_MAX_LEN)?;

        Ok(CreateOrderRequest {
            name,
            email,
            phone,
            address,
            amount: self.amount,
            note,
            product_name,
        })
    }
}

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() || ch.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_min_chars(field: &'static str, value: &str, min_len: usize) -> ValidationResult {
    if value.chars().count() < min_len {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", min_len),
        ));
    }

    Ok(())
}

pub fn validate_max_chars(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    validate_required("email", email)?;
    validate_max_chars("email", email, EMAIL_MAX_LEN)?;

    let invalid = || ValidationError::new("email", "must be a valid email address");

    if email.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

/// Local mobile numbers: `09` followed by eight digits.
pub fn validate_mobile_phone(phone: &str) -> ValidationResult {
    validate_required("phone", phone)?;

    if phone.len() != PHONE_LEN
        || !phone.starts_with("09")
        || !phone.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "phone",
            "must be a mobile number like 0912345678",
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: i64) -> ValidationResult {
    if amount <= 0 {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> OrderIntent {
        OrderIntent {
            name: "王小明".to_string(),
            email: "ming@example.com".to_string(),
            phone: "0912345678".to_string(),
            address: "台北市信義區市府路1號".to_string(),
            amount: 1680,
            note: Some("  請於週末配送 ".to_string()),
            product_name: "生態米禮盒".to_string(),
        }
    }

    #[test]
    fn accepts_and_sanitizes_valid_intent() {
        let request = intent().validate().unwrap();
        assert_eq!(request.note.as_deref(), Some("請於週末配送"));
        assert_eq!(request.amount, 1680);
    }

    #[test]
    fn drops_blank_note() {
        let mut intent = intent();
        intent.note = Some("   ".to_string());
        assert_eq!(intent.validate().unwrap().note, None);
    }

    #[test]
    fn rejects_zero_and_negative_amount() {
        for amount in [0, -1] {
            let mut intent = intent();
            intent.amount = amount;
            assert_eq!(intent.validate().unwrap_err().field, "amount");
        }
    }

    #[test]
    fn rejects_short_name_and_address() {
        let mut short_name = intent();
        short_name.name = "王".to_string();
        assert_eq!(short_name.validate().unwrap_err().field, "name");

        let mut short_address = intent();
        short_address.address = "台北".to_string();
        assert_eq!(short_address.validate().unwrap_err().field, "address");
    }

    #[test]
    fn validates_mobile_phone() {
        assert!(validate_mobile_phone("0912345678").is_ok());
        assert!(validate_mobile_phone("0812345678").is_err());
        assert!(validate_mobile_phone("091234567").is_err());
        assert!(validate_mobile_phone("09123456789").is_err());
        assert!(validate_mobile_phone("09-2345678").is_err());
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a@@b.com").is_err());
        assert!(validate_email("a@b..com").is_err());
        assert!(validate_email("a b@c.com").is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
        assert_eq!(sanitize_string("No.5\r\nMain St"), "No.5 Main St");
    }

    #[test]
    fn multi_line_address_keeps_word_breaks() {
        let mut intent = intent();
        intent.address = "台北市信義區\n市府路1號".to_string();
        assert_eq!(intent.validate().unwrap().address, "台北市信義區 市府路1號");
    }

    #[test]
    fn requires_product_name() {
        let mut intent = intent();
        intent.product_name = " ".to_string();
        assert_eq!(intent.validate().unwrap_err().field, "product_name");
    }
}

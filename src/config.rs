use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use ipnet::IpNet;
use thiserror::Error;

use crate::trade::TextEncoding;

pub const VALID_KEY_LENGTHS: [usize; 3] = [16, 24, 32];
pub const IV_LENGTH: usize = 16;
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub merchant_id: String,
    pub hash_key: String,
    pub hash_iv: String,
    pub trade_version: String,
    pub trade_encoding: TextEncoding,
    pub order_service_url: String,
    pub order_service_timeout: Duration,
    pub order_service_language: String,
    pub payment_result_path: String,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_session_secret: String,
    pub secure_cookies: bool,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub notify_allowed_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    pub log_request_body: bool,
}

impl Config {
    /// Reads the environment (and `.env` if present). Secrets may still be
    /// empty here when they come from Vault; call [`Config::validate`] once
    /// everything is resolved.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Ok(Config {
            server_port: parse_var("SERVER_PORT", 3000)?,
            merchant_id: required("NEWEBPAY_MERCHANT_ID")?,
            hash_key: env::var("NEWEBPAY_HASH_KEY").unwrap_or_default(),
            hash_iv: env::var("NEWEBPAY_HASH_IV").unwrap_or_default(),
            trade_version: env::var("NEWEBPAY_VERSION").unwrap_or_else(|_| "2.0".to_string()),
            trade_encoding: parse_var("NEWEBPAY_TRADE_ENCODING", TextEncoding::Base64)?,
            order_service_url: required("ORDER_SERVICE_URL")?,
            order_service_timeout: Duration::from_secs(parse_var(
                "ORDER_SERVICE_TIMEOUT_SECS",
                30u64,
            )?),
            order_service_language: env::var("ORDER_SERVICE_LANGUAGE")
                .unwrap_or_else(|_| "cht".to_string()),
            payment_result_path: env::var("PAYMENT_RESULT_PATH")
                .unwrap_or_else(|_| "/payment/result".to_string()),
            admin_username: required("ADMIN_USERNAME")?,
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            admin_session_secret: env::var("ADMIN_SESSION_SECRET").unwrap_or_default(),
            secure_cookies: parse_var("SECURE_COOKIES", false)?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|raw| parse_list(&raw))
                .filter(|origins| !origins.is_empty()),
            notify_allowed_ips: parse_allowed_ips(
                &env::var("NOTIFY_ALLOWED_IPS").unwrap_or_else(|_| "*".to_string()),
            )?,
            trusted_proxy_depth: parse_var("TRUSTED_PROXY_DEPTH", 0usize)?,
            log_request_body: parse_var("LOG_REQUEST_BODY", false)?,
        })
    }

    /// Startup-time checks for everything the codec and session signer rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant_id.trim().is_empty() {
            return Err(ConfigError::Missing("NEWEBPAY_MERCHANT_ID"));
        }
        if self.hash_key.is_empty() {
            return Err(ConfigError::Missing("NEWEBPAY_HASH_KEY"));
        }
        if !VALID_KEY_LENGTHS.contains(&self.hash_key.len()) {
            return Err(ConfigError::invalid(
                "NEWEBPAY_HASH_KEY",
                format!("must be 16, 24 or 32 bytes, got {}", self.hash_key.len()),
            ));
        }
        if self.hash_iv.is_empty() {
            return Err(ConfigError::Missing("NEWEBPAY_HASH_IV"));
        }
        if self.hash_iv.len() != IV_LENGTH {
            return Err(ConfigError::invalid(
                "NEWEBPAY_HASH_IV",
                format!("must be {} bytes, got {}", IV_LENGTH, self.hash_iv.len()),
            ));
        }
        if self.trade_version.trim().is_empty() {
            return Err(ConfigError::Missing("NEWEBPAY_VERSION"));
        }

        let url = url::Url::parse(&self.order_service_url)
            .map_err(|e| ConfigError::invalid("ORDER_SERVICE_URL", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "ORDER_SERVICE_URL",
                "scheme must be http or https",
            ));
        }
        if self.order_service_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "ORDER_SERVICE_TIMEOUT_SECS",
                "must be greater than 0",
            ));
        }
        if !self.payment_result_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "PAYMENT_RESULT_PATH",
                "must be an absolute path",
            ));
        }

        if self.admin_password.is_empty() {
            return Err(ConfigError::Missing("ADMIN_PASSWORD"));
        }
        if self.admin_session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::invalid(
                "ADMIN_SESSION_SECRET",
                format!("must be at least {} bytes", MIN_SESSION_SECRET_LEN),
            ));
        }

        Ok(())
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_allowed_ips(raw: &str) -> Result<AllowedIps, ConfigError> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = parse_list(value)
        .iter()
        .map(|entry| entry.parse::<IpNet>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::invalid("NOTIFY_ALLOWED_IPS", e.to_string()))?;

    if cidrs.is_empty() {
        return Err(ConfigError::invalid(
            "NOTIFY_ALLOWED_IPS",
            "must be '*' or a comma-separated list of CIDRs",
        ));
    }

    Ok(AllowedIps::Cidrs(cidrs))
}

#[cfg(test)]
pub(crate) fn test_config(order_service_url: &str) -> Config {
    Config {
        server_port: 3000,
        merchant_id: "MS12345678".to_string(),
        hash_key: "12345678901234567890123456789012".to_string(),
        hash_iv: "1234567890123456".to_string(),
        trade_version: "2.0".to_string(),
        trade_encoding: TextEncoding::Base64,
        order_service_url: order_service_url.to_string(),
        order_service_timeout: Duration::from_secs(30),
        order_service_language: "cht".to_string(),
        payment_result_path: "/payment/result".to_string(),
        admin_username: "admin".to_string(),
        admin_password: "correct horse battery staple".to_string(),
        admin_session_secret: "s".repeat(MIN_SESSION_SECRET_LEN),
        secure_cookies: false,
        cors_allowed_origins: None,
        notify_allowed_ips: AllowedIps::Any,
        trusted_proxy_depth: 0,
        log_request_body: false,
    }
}

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "admin_session";
pub const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Malformed,
    BadSignature,
    Expired,
    Forbidden,
}

/// Issues and verifies `admin_session` tokens:
/// `base64url(user:issued_at_ms:role).hex(hmac_sha256(payload))`.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
    username: String,
}

impl SessionSigner {
    pub fn new(secret: &str, username: &str) -> Result<Self, ConfigError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| ConfigError::Invalid {
            field: "ADMIN_SESSION_SECRET",
            reason: e.to_string(),
        })?;

        Ok(Self {
            mac,
            username: username.to_string(),
        })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp_millis())
    }

    pub fn issue_at(&self, issued_at_ms: i64) -> String {
        let payload = format!("{}:{}:{}", self.username, issued_at_ms, ADMIN_ROLE);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{}.{}", URL_SAFE_NO_PAD.encode(payload), signature)
    }

    pub fn verify(&self, token: &str) -> Result<(), SessionError> {
        self.verify_at(token, Utc::now().timestamp_millis())
    }

    pub fn verify_at(&self, token: &str, now_ms: i64) -> Result<(), SessionError> {
        let (encoded, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| SessionError::Malformed)?;
        let mut parts = payload.rsplitn(3, ':');
        let role = parts.next().ok_or(SessionError::Malformed)?;
        let issued_at: i64 = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .ok_or(SessionError::Malformed)?;
        let username = parts.next().ok_or(SessionError::Malformed)?;

        if username != self.username || role != ADMIN_ROLE {
            return Err(SessionError::Forbidden);
        }
        if issued_at > now_ms || now_ms - issued_at >= SESSION_TTL_MS {
            return Err(SessionError::Expired);
        }

        Ok(())
    }

    pub fn set_cookie(&self, token: &str, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            SESSION_COOKIE,
            token,
            SESSION_TTL_MS / 1000
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(secure: bool) -> String {
        let mut cookie = format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
            SESSION_COOKIE
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Pulls `admin_session` out of a `Cookie` header value.
pub fn session_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

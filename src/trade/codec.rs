use std::fmt;
use std::str::FromStr;

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose, Engine};
use cbc::cipher::block_padding::{Pkcs7, UnpadError};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::models::{DecryptedOutcome, PaymentRequest, TradeEnvelope};
use crate::utils::constant_time_eq;

const BLOCK_SIZE: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("trade codec misconfigured: {0}")]
    Config(String),

    #[error("failed to decode trade info: {0}")]
    Decode(String),

    #[error("trade info integrity check failed: {0}")]
    Integrity(String),

    #[error("invalid payment request: {0}")]
    InvalidRequest(String),

    #[error("failed to serialize payment request: {0}")]
    Encode(String),
}

/// Text form of the ciphertext on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Base64,
    Hex,
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(TextEncoding::Base64),
            "hex" => Ok(TextEncoding::Hex),
            other => Err(format!("unknown trade encoding '{}'", other)),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Base64 => f.write_str("base64"),
            TextEncoding::Hex => f.write_str("hex"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

/// AES-CBC/PKCS#7 with the merchant's fixed key and IV, plus the
/// `TradeSha` signature. Encryption is deterministic on purpose: the gateway
/// recomputes the same bytes.
#[derive(Clone)]
pub struct TradeCodec {
    merchant_id: String,
    version: String,
    hash_key: String,
    hash_iv: String,
    key_size: KeySize,
    encoding: TextEncoding,
}

impl fmt::Debug for TradeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradeCodec")
            .field("merchant_id", &self.merchant_id)
            .field("version", &self.version)
            .field("key_size", &self.key_size)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl TradeCodec {
    pub fn new(
        merchant_id: impl Into<String>,
        version: impl Into<String>,
        hash_key: impl Into<String>,
        hash_iv: impl Into<String>,
        encoding: TextEncoding,
    ) -> Result<Self, CodecError> {
        let hash_key = hash_key.into();
        let hash_iv = hash_iv.into();
        let key_size = check_secrets(&hash_key, &hash_iv)?;

        Ok(Self {
            merchant_id: merchant_id.into(),
            version: version.into(),
            hash_key,
            hash_iv,
            key_size,
            encoding,
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, CodecError> {
        Self::new(
            config.merchant_id.clone(),
            config.trade_version.clone(),
            config.hash_key.clone(),
            config.hash_iv.clone(),
            config.trade_encoding,
        )
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Checks, serializes, encrypts and signs an outgoing request.
    pub fn encode(&self, request: &PaymentRequest) -> Result<TradeEnvelope, CodecError> {
        request.validate()?;
        let plaintext =
            serde_json::to_vec(request).map_err(|e| CodecError::Encode(e.to_string()))?;
        let trade_info = self.encrypt(&plaintext)?;
        let trade_sha = self.sign(&trade_info);

        Ok(TradeEnvelope {
            merchant_id: request.merchant_id.clone(),
            trade_info,
            trade_sha,
            version: request.version.clone(),
        })
    }

    /// Decrypts `TradeInfo` into a structured outcome. Merchant and version
    /// matching is left to the caller.
    pub fn decode(&self, trade_info: &str) -> Result<DecryptedOutcome, CodecError> {
        let plaintext = self.decrypt(trade_info)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CodecError::Decode(format!("decrypted payload is not valid JSON: {}", e)))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        check_secrets(&self.hash_key, &self.hash_iv)?;
        let key = self.hash_key.as_bytes();
        let iv = self.hash_iv.as_bytes();

        let ciphertext = match self.key_size {
            KeySize::Aes128 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            KeySize::Aes192 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            KeySize::Aes256 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };

        Ok(match self.encoding {
            TextEncoding::Base64 => general_purpose::STANDARD.encode(ciphertext),
            TextEncoding::Hex => hex::encode(ciphertext),
        })
    }

    /// Decrypts `TradeInfo` in either text form. Hex-looking input is tried as
    /// hex first; the other form is the fallback.
    pub fn decrypt(&self, trade_info: &str) -> Result<Vec<u8>, CodecError> {
        check_secrets(&self.hash_key, &self.hash_iv)?;
        let trade_info = trade_info.trim();
        if trade_info.is_empty() {
            return Err(CodecError::Decode("empty trade info".to_string()));
        }

        let order = if looks_like_hex(trade_info) {
            [TextEncoding::Hex, TextEncoding::Base64]
        } else {
            [TextEncoding::Base64, TextEncoding::Hex]
        };

        let mut first_error = None;
        for encoding in order {
            match self.decrypt_as(trade_info, encoding) {
                Ok(plaintext) => return Ok(plaintext),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| CodecError::Decode("undecodable trade info".to_string())))
    }

    fn decrypt_as(&self, trade_info: &str, encoding: TextEncoding) -> Result<Vec<u8>, CodecError> {
        let ciphertext = match encoding {
            TextEncoding::Base64 => general_purpose::STANDARD
                .decode(trade_info)
                .map_err(|e| CodecError::Decode(format!("invalid base64: {}", e)))?,
            TextEncoding::Hex => hex::decode(trade_info)
                .map_err(|e| CodecError::Decode(format!("invalid hex: {}", e)))?,
        };
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::Decode(format!(
                "ciphertext length {} is not a multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        let key = self.hash_key.as_bytes();
        let iv = self.hash_iv.as_bytes();

        match self.key_size {
            KeySize::Aes128 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
            KeySize::Aes192 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
            KeySize::Aes256 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|e| CodecError::Config(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
        }
    }

    /// `SHA256("HashKey={key}&{ciphertext}&HashIV={iv}")` as uppercase hex.
    pub fn sign(&self, trade_info: &str) -> String {
        let digest = Sha256::digest(
            format!(
                "HashKey={}&{}&HashIV={}",
                self.hash_key, trade_info, self.hash_iv
            )
            .as_bytes(),
        );
        hex::encode_upper(digest)
    }

    pub fn verify(&self, trade_info: &str, trade_sha: &str) -> Result<(), CodecError> {
        let expected = self.sign(trade_info);
        let provided = trade_sha.trim().to_ascii_uppercase();

        if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            Ok(())
        } else {
            Err(CodecError::Integrity("TradeSha mismatch".to_string()))
        }
    }
}

fn looks_like_hex(text: &str) -> bool {
    text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

fn padding_error(_: UnpadError) -> CodecError {
    CodecError::Decode("invalid padding".to_string())
}

fn check_secrets(hash_key: &str, hash_iv: &str) -> Result<KeySize, CodecError> {
    if hash_key.is_empty() || hash_iv.is_empty() {
        return Err(CodecError::Config("hash key and IV must be set".to_string()));
    }
    if hash_iv.len() != BLOCK_SIZE {
        return Err(CodecError::Config(format!(
            "hash IV must be {} bytes, got {}",
            BLOCK_SIZE,
            hash_iv.len()
        )));
    }

    match hash_key.len() {
        16 => Ok(KeySize::Aes128),
        24 => Ok(KeySize::Aes192),
        32 => Ok(KeySize::Aes256),
        other => Err(CodecError::Config(format!(
            "hash key must be 16, 24 or 32 bytes, got {}",
            other
        ))),
    }
}

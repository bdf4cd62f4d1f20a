use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ring::{
    hmac, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

use crate::config::AppConfig;

const HASH_PREFIX: &str = "pbkdf2";
const PBKDF2_ITERATIONS: u32 = 100_000;
const HASH_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 16;

pub const SESSION_COOKIE: &str = "rt_session";
pub const SESSION_TTL_MS: i64 = 1000 * 60 * 60 * 24 * 30;

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    iat: i64,
    exp: i64,
    nonce: String,
}

pub struct CryptoService;

impl CryptoService {
    /// Produces `pbkdf2$<salt hex>$<hash hex>`.
    pub fn hash_password(password: &str) -> Result<String> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| anyhow!("Failed to generate salt"))?;
        Self::hash_password_with_salt(password, &hex::encode(salt))
    }

    pub fn hash_password_with_salt(password: &str, salt: &str) -> Result<String> {
        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations()?,
            salt.as_bytes(),
            password.as_bytes(),
            &mut hash,
        );
        Ok(format!("{}${}${}", HASH_PREFIX, salt, hex::encode(hash)))
    }

    pub fn verify_password(password: &str, stored: &str) -> bool {
        let mut parts = stored.split('$');
        let (prefix, salt, hash_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(salt), Some(hash_hex)) => (prefix, salt, hash_hex),
            _ => return false,
        };
        if prefix != HASH_PREFIX || salt.is_empty() || hash_hex.is_empty() {
            return false;
        }
        let expected = match hex::decode(hash_hex) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let iterations = match iterations() {
            Ok(iterations) => iterations,
            Err(_) => return false,
        };

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt.as_bytes(),
            password.as_bytes(),
            &expected,
        )
        .is_ok()
    }

    /// Checks a login attempt against the plain password if one is
    /// configured, otherwise against the stored hash.
    pub fn verify_login(password: &str, config: &AppConfig) -> bool {
        if let Some(plain) = config.plain_password() {
            return constant_time_eq(password, plain);
        }
        match config.stored_password_hash() {
            Some(stored) => Self::verify_password(password, &stored),
            None => false,
        }
    }

    pub fn create_session_token(secret: &str) -> Result<String> {
        Self::create_session_token_at(secret, Utc::now().timestamp_millis())
    }

    pub fn create_session_token_at(secret: &str, now_ms: i64) -> Result<String> {
        if secret.trim().is_empty() {
            return Err(anyhow!("Session secret is empty"));
        }
        let rng = SystemRandom::new();
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce)
            .map_err(|_| anyhow!("Failed to generate nonce"))?;

        let payload = SessionPayload {
            iat: now_ms,
            exp: now_ms + SESSION_TTL_MS,
            nonce: hex::encode(nonce),
        };
        let data = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
        let signature = sign(secret, &data);
        Ok(format!("{}.{}", data, signature))
    }

    pub fn validate_session_token(secret: &str, token: &str) -> bool {
        Self::validate_session_token_at(secret, token, Utc::now().timestamp_millis())
    }

    pub fn validate_session_token_at(secret: &str, token: &str, now_ms: i64) -> bool {
        if secret.trim().is_empty() {
            return false;
        }
        let (data, signature) = match token.split_once('.') {
            Some((data, signature)) if !data.is_empty() && !signature.is_empty() => {
                (data, signature)
            }
            _ => return false,
        };
        let signature = match general_purpose::URL_SAFE_NO_PAD.decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        if hmac::verify(&key, data.as_bytes(), &signature).is_err() {
            return false;
        }

        general_purpose::URL_SAFE_NO_PAD
            .decode(data)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<SessionPayload>(&bytes).ok())
            .map(|payload| payload.exp > now_ms)
            .unwrap_or(false)
    }
}

fn iterations() -> Result<NonZeroU32> {
    NonZeroU32::new(PBKDF2_ITERATIONS).ok_or_else(|| anyhow!("Invalid iterations"))
}

fn sign(secret: &str, data: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hmac::sign(&key, data.as_bytes()).as_ref())
}

/// Compares two strings without leaking where they differ.
fn constant_time_eq(candidate: &str, expected: &str) -> bool {
    let rng = SystemRandom::new();
    let key = match hmac::Key::generate(hmac::HMAC_SHA256, &rng) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let tag = hmac::sign(&key, expected.as_bytes());
    hmac::verify(&key, candidate.as_bytes(), tag.as_ref()).is_ok()
}

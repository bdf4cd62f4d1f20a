use base64::{engine::general_purpose, Engine as _};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub session_secret: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub password_plain: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub password_hash: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub password_hash_b64: Option<String>,
}

/// Blank values (`APP_SESSION_SECRET=`) count as unset.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_database_path() -> String {
    "rentals.sqlite".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
            log_level: default_log_level(),
            session_secret: None,
            password_plain: None,
            password_hash: None,
            password_hash_b64: None,
        }
    }
}

impl AppConfig {
    /// Reads `rentals.toml` (optional) and `APP_*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("rentals").required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn session_secret(&self) -> Option<&str> {
        present(&self.session_secret)
    }

    pub fn plain_password(&self) -> Option<&str> {
        present(&self.password_plain)
    }

    /// Stored password hash; the base64 form wins over the raw one.
    pub fn stored_password_hash(&self) -> Option<String> {
        if let Some(encoded) = present(&self.password_hash_b64) {
            return general_purpose::STANDARD
                .decode(encoded.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .filter(|hash| !hash.trim().is_empty());
        }
        present(&self.password_hash).map(str::to_string)
    }
}

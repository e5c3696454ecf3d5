//! Process configuration read from the environment.

use std::path::PathBuf;

use url::Url;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "SECQUIZ_DB_URL";
pub const LOCAL_STORE_VAR: &str = "SECQUIZ_LOCAL_STORE";
pub const PAYSTACK_SECRET_VAR: &str = "SECQUIZ_PAYSTACK_SECRET";
pub const PAYSTACK_BASE_URL_VAR: &str = "SECQUIZ_PAYSTACK_BASE_URL";
pub const PAYMENT_WALL_VAR: &str = "SECQUIZ_PAYMENT_WALL";

pub const DEFAULT_DB_URL: &str = "sqlite://secquiz.sqlite3";
pub const DEFAULT_LOCAL_STORE: &str = "secquiz-local.json";
pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub local_store_path: PathBuf,
    pub paystack_secret: Option<String>,
    pub paystack_base_url: Url,
    pub payment_wall_enabled: bool,
}

impl AppConfig {
    /// Read configuration from the process environment, loading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_url = lookup(DB_URL_VAR).unwrap_or_else(|| DEFAULT_DB_URL.into());
        if db_url.trim().is_empty() {
            return Err(ConfigError::Empty { var: DB_URL_VAR });
        }

        let local_store_path =
            PathBuf::from(lookup(LOCAL_STORE_VAR).unwrap_or_else(|| DEFAULT_LOCAL_STORE.into()));

        let paystack_secret = lookup(PAYSTACK_SECRET_VAR)
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        let raw_base =
            lookup(PAYSTACK_BASE_URL_VAR).unwrap_or_else(|| DEFAULT_PAYSTACK_BASE_URL.into());
        let paystack_base_url = Url::parse(raw_base.trim()).map_err(|_| ConfigError::InvalidUrl {
            var: PAYSTACK_BASE_URL_VAR,
            raw: raw_base.clone(),
        })?;

        let payment_wall_enabled = match lookup(PAYMENT_WALL_VAR) {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidBool {
                var: PAYMENT_WALL_VAR,
                raw,
            })?,
        };

        Ok(Self {
            db_url,
            local_store_path,
            paystack_secret,
            paystack_base_url,
            payment_wall_enabled,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

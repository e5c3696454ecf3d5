use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

use crate::model::ids::UserId;

/// Backend setting key holding the free question limit.
pub const FREE_QUESTIONS_LIMIT_KEY: &str = "free_questions_limit";
/// Backend setting key holding the general app settings object.
pub const APP_SETTINGS_KEY: &str = "app_settings";
/// Free questions allowed before the sign-up prompt.
pub const DEFAULT_QUESTION_LIMIT: u32 = 10;

/// A key/value row from the backend `settings` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingEntry {
    pub key: String,
    pub value: Value,
    pub updated_by: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

/// Freemium configuration shared by the counter and the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreemiumSettings {
    enabled: bool,
    question_limit: u32,
}

impl Default for FreemiumSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            question_limit: DEFAULT_QUESTION_LIMIT,
        }
    }
}

impl FreemiumSettings {
    #[must_use]
    pub fn new(enabled: bool, question_limit: u32) -> Self {
        Self {
            enabled,
            question_limit,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn question_limit(&self) -> u32 {
        self.question_limit
    }

    /// JSON value stored under [`APP_SETTINGS_KEY`].
    #[must_use]
    pub fn app_settings_value(&self) -> Value {
        json!({ "freemium_enabled": self.enabled })
    }

    /// JSON value stored under [`FREE_QUESTIONS_LIMIT_KEY`].
    #[must_use]
    pub fn limit_value(&self) -> Value {
        json!(self.question_limit)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("question limit must be between 0 and {max}, got {got}")]
    LimitOutOfRange { got: i64, max: u32 },
}

/// Admin edit of the freemium configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreemiumSettingsDraft {
    pub enabled: Option<bool>,
    pub question_limit: Option<i64>,
}

impl FreemiumSettingsDraft {
    /// Upper bound on the configurable free question limit.
    pub const MAX_LIMIT: u32 = 10_000;

    /// Apply the draft on top of `current`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::LimitOutOfRange` for negative or huge limits.
    pub fn apply(self, current: FreemiumSettings) -> Result<FreemiumSettings, SettingsError> {
        let question_limit = match self.question_limit {
            None => current.question_limit,
            Some(raw) => u32::try_from(raw)
                .ok()
                .filter(|limit| *limit <= Self::MAX_LIMIT)
                .ok_or(SettingsError::LimitOutOfRange {
                    got: raw,
                    max: Self::MAX_LIMIT,
                })?,
        };
        Ok(FreemiumSettings {
            enabled: self.enabled.unwrap_or(current.enabled),
            question_limit,
        })
    }
}

/// Read the free question limit from a setting value.
///
/// Accepts a JSON number or a numeric string; anything else yields `None`.
#[must_use]
pub fn limit_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Read the `freemium_enabled` flag from the app settings object.
#[must_use]
pub fn enabled_from_value(value: &Value) -> Option<bool> {
    value.get("freemium_enabled").and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_parses_numbers_and_strings() {
        assert_eq!(limit_from_value(&json!(15)), Some(15));
        assert_eq!(limit_from_value(&json!("20")), Some(20));
        assert_eq!(limit_from_value(&json!(-1)), None);
        assert_eq!(limit_from_value(&json!({"x": 1})), None);
    }

    #[test]
    fn enabled_flag_is_optional() {
        assert_eq!(enabled_from_value(&json!({"freemium_enabled": false})), Some(false));
        assert_eq!(enabled_from_value(&json!({})), None);
    }

    #[test]
    fn draft_keeps_unspecified_fields() {
        let current = FreemiumSettings::default();
        let next = FreemiumSettingsDraft {
            enabled: Some(false),
            question_limit: None,
        }
        .apply(current)
        .unwrap();
        assert!(!next.enabled());
        assert_eq!(next.question_limit(), DEFAULT_QUESTION_LIMIT);
    }

    #[test]
    fn draft_rejects_negative_limit() {
        let err = FreemiumSettingsDraft {
            enabled: None,
            question_limit: Some(-3),
        }
        .apply(FreemiumSettings::default())
        .unwrap_err();
        assert!(matches!(err, SettingsError::LimitOutOfRange { got: -3, .. }));
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::UserId;

/// Length of paid access granted by one verified payment.
pub const ACCESS_PERIOD_DAYS: i64 = 30;

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("email address is invalid")]
    InvalidEmail,
}

/// Backend-owned user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: UserId,
    email: String,
    name: Option<String>,
    is_admin: bool,
    has_access: bool,
    access_expires_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// A freshly signed-up, non-admin profile without paid access.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidEmail` for an obviously malformed address.
    pub fn new(id: UserId, email: &str, name: Option<String>) -> Result<Self, ProfileError> {
        Self::from_persisted(id, email, name, false, false, None)
    }

    /// Rehydrate a profile from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidEmail` for an obviously malformed address.
    pub fn from_persisted(
        id: UserId,
        email: &str,
        name: Option<String>,
        is_admin: bool,
        has_access: bool,
        access_expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProfileError> {
        let email = normalize_email(email)?;
        Ok(Self {
            id,
            email,
            name: name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
            is_admin,
            has_access,
            access_expires_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    #[must_use]
    pub fn has_access_flag(&self) -> bool {
        self.has_access
    }

    #[must_use]
    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_expires_at
    }

    /// Paid access is valid when flagged and not past its expiry.
    #[must_use]
    pub fn has_valid_access(&self, now: DateTime<Utc>) -> bool {
        self.has_access && self.access_expires_at.is_none_or(|exp| exp >= now)
    }

    pub fn grant_access(&mut self, until: DateTime<Utc>) {
        self.has_access = true;
        self.access_expires_at = Some(until);
    }

    pub fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
    }
}

/// Lowercases and trims an email address.
///
/// # Errors
///
/// Returns `ProfileError::InvalidEmail` unless the address has a non-empty
/// local part and domain around a single `@`.
pub fn normalize_email(raw: &str) -> Result<String, ProfileError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(ProfileError::InvalidEmail),
    }
}

//
// ─── PAYMENTS ──────────────────────────────────────────────────────────────────
//

/// Transaction status as reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Success,
    Failed,
    Abandoned,
    Other(String),
}

impl PaymentStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
            Self::Other(s) => s,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified payment that grants a fixed period of access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub user_id: UserId,
    pub reference: String,
    pub email: String,
    /// Amount in the currency's minor unit (kobo).
    pub amount_minor: u64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Payment {
    /// Record a payment made at `now`, expiring after the access period.
    #[must_use]
    pub fn new(
        user_id: UserId,
        reference: impl Into<String>,
        email: impl Into<String>,
        amount_minor: u64,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            reference: reference.into(),
            email: email.into(),
            amount_minor,
            status,
            created_at: now,
            expires_at: now + Duration::days(ACCESS_PERIOD_DAYS),
        }
    }

    /// Amount in major units (naira).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn amount_major(&self) -> f64 {
        self.amount_minor as f64 / 100.0
    }
}

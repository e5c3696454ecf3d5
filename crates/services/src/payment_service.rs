//! Paid access: server-side verification of a checkout reference.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use quiz_core::Clock;
use quiz_core::model::{Payment, PaymentStatus, Profile, UserId};
use storage::repository::{PaymentRepository, ProfileRepository, StorageError};

use crate::error::PaymentError;

/// Price of one access period, in naira.
pub const ACCESS_PRICE_NAIRA: u64 = 5_000;

/// A transaction as confirmed by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: PaymentStatus,
    /// Amount in kobo.
    pub amount_minor: u64,
    pub customer_email: String,
}

/// Port to the payment provider's verification endpoint.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, PaymentError>;
}

/// Verifies references with `GET /transaction/verify/{reference}`.
#[derive(Clone)]
pub struct PaystackVerifier {
    client: Client,
    base_url: Url,
    secret: String,
}

impl PaystackVerifier {
    #[must_use]
    pub fn new(base_url: Url, secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            secret: secret.into(),
        }
    }

    fn verify_url(&self, reference: &str) -> Result<Url, PaymentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["transaction", "verify", reference]);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: u64,
    customer: VerifyCustomer,
}

#[derive(Debug, Deserialize)]
struct VerifyCustomer {
    email: String,
}

fn transaction_from_body(body: VerifyResponse) -> Result<VerifiedTransaction, PaymentError> {
    let data = match body.data {
        Some(data) if body.status => data,
        _ => {
            return Err(PaymentError::MalformedResponse(
                body.message.unwrap_or_else(|| "missing transaction data".into()),
            ));
        }
    };
    Ok(VerifiedTransaction {
        reference: data.reference,
        status: PaymentStatus::parse(&data.status),
        amount_minor: data.amount,
        customer_email: data.customer.email,
    })
}

#[async_trait]
impl PaymentVerifier for PaystackVerifier {
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, PaymentError> {
        let response = self
            .client
            .get(self.verify_url(reference)?)
            .bearer_auth(&self.secret)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::HttpStatus(response.status()));
        }

        let body: VerifyResponse = response.json().await?;
        transaction_from_body(body)
    }
}

/// Outcome of a confirmed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub payment: Payment,
    pub profile: Profile,
    /// The reference had already been recorded; access was not extended again.
    pub duplicate: bool,
}

#[derive(Clone)]
pub struct PaymentService {
    clock: Clock,
    verifier: Option<Arc<dyn PaymentVerifier>>,
    profiles: Arc<dyn ProfileRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl PaymentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        verifier: Option<Arc<dyn PaymentVerifier>>,
        profiles: Arc<dyn ProfileRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            clock,
            verifier,
            profiles,
            payments,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Verify a checkout reference and, on success, grant the access period.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if payments are disabled, the provider does not
    /// report success, no profile matches the customer email, or storage fails.
    pub async fn confirm(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        let verifier = self.verifier.as_ref().ok_or(PaymentError::Disabled)?;
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PaymentError::EmptyReference);
        }

        let tx = verifier.verify(reference).await?;
        if !tx.status.is_success() {
            tracing::warn!(reference, status = %tx.status, "payment not successful");
            return Err(PaymentError::NotSuccessful {
                status: tx.status.to_string(),
            });
        }

        let mut profile = self
            .profiles
            .find_profile_by_email(&tx.customer_email)
            .await?
            .ok_or_else(|| PaymentError::UnknownCustomer {
                email: tx.customer_email.clone(),
            })?;

        let payment = Payment::new(
            profile.id(),
            tx.reference.clone(),
            tx.customer_email.clone(),
            tx.amount_minor,
            tx.status.clone(),
            self.clock.now(),
        );

        match self.payments.record_payment(&payment).await {
            Ok(_) => {}
            Err(StorageError::Conflict) => {
                tracing::info!(reference, "payment already recorded");
                return Ok(PaymentConfirmation {
                    payment,
                    profile,
                    duplicate: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        profile.grant_access(payment.expires_at);
        self.profiles.upsert_profile(&profile).await?;
        tracing::info!(
            user_id = %profile.id(),
            amount = payment.amount_major(),
            expires_at = %payment.expires_at,
            "paid access granted"
        );

        Ok(PaymentConfirmation {
            payment,
            profile,
            duplicate: false,
        })
    }

    /// Whether the user currently holds valid paid access.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Storage` on backend failures.
    pub async fn check_access(&self, user_id: UserId) -> Result<bool, PaymentError> {
        let now = self.clock.now();
        Ok(self
            .profiles
            .get_profile(user_id)
            .await?
            .is_some_and(|p| p.has_valid_access(now)))
    }

    /// # Errors
    ///
    /// Returns `PaymentError::Storage` on backend failures.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError> {
        Ok(self.payments.list_payments(user_id).await?)
    }
}

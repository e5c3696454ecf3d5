use std::sync::Arc;
use std::time::Duration;

use storage::local::{InMemoryLocalStore, JsonFileLocalStore, LocalStore};
use storage::repository::Storage;
use storage::sqlite::SqliteInitError;

use crate::Clock;
use crate::access_service::AccessService;
use crate::auth_service::{AuthProvider, AuthStore, InMemoryAuthProvider};
use crate::config::AppConfig;
use crate::counter_service::QuestionCounterStore;
use crate::error::AppServicesError;
use crate::feedback_service::FeedbackService;
use crate::local_auth::LocalAuthProvider;
use crate::payment_service::{PaymentService, PaymentVerifier, PaystackVerifier};
use crate::progress_service::ProgressService;
use crate::quiz::QuizLoopService;
use crate::settings_service::FreemiumSettingsService;
use crate::topic_service::TopicService;

pub const CONFIGURATION_MESSAGE: &str =
    "Application configuration error. Please contact support.";
pub const CONNECTION_MESSAGE: &str =
    "Unable to connect to the database. Please check your connection and try again.";

/// Bounded retry for the initial database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Connect and migrate, retrying with linear backoff.
///
/// # Errors
///
/// Returns `AppServicesError::Degraded` once every attempt has failed.
pub async fn connect_with_retry(
    db_url: &str,
    policy: RetryPolicy,
) -> Result<Storage, AppServicesError> {
    let mut attempt = 0;
    loop {
        match Storage::sqlite(db_url).await {
            Ok(storage) => return Ok(storage),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                let delay = policy.base_delay * attempt;
                tracing::warn!(attempt, ?delay, error = %e, "database connection failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(attempts = attempt + 1, error = %e, "giving up on database connection");
                return Err(degraded(e));
            }
        }
    }
}

fn degraded(cause: SqliteInitError) -> AppServicesError {
    let message = if cause.is_configuration() {
        CONFIGURATION_MESSAGE
    } else {
        CONNECTION_MESSAGE
    };
    AppServicesError::Degraded { message, cause }
}

/// Every app-facing service, wired over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    counter: QuestionCounterStore,
    auth: Arc<AuthStore>,
    settings: Arc<FreemiumSettingsService>,
    topics: Arc<TopicService>,
    access: Arc<AccessService>,
    quiz: Arc<QuizLoopService>,
    progress: Arc<ProgressService>,
    feedback: Arc<FeedbackService>,
    payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wire services from already-built parts.
    #[must_use]
    pub fn assemble(
        clock: Clock,
        storage: &Storage,
        local: Arc<dyn LocalStore>,
        auth_provider: Arc<dyn AuthProvider>,
        verifier: Option<Arc<dyn PaymentVerifier>>,
        payment_wall_enabled: bool,
    ) -> Self {
        let counter = QuestionCounterStore::load(Arc::clone(&local));
        let auth = Arc::new(AuthStore::new(
            auth_provider,
            Arc::clone(&storage.profiles),
            Arc::clone(&local),
        ));
        let settings = Arc::new(FreemiumSettingsService::new(
            clock,
            Arc::clone(&storage.settings),
            Arc::clone(&storage.profiles),
            Arc::clone(&local),
            counter.clone(),
        ));
        let topics = Arc::new(TopicService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.questions),
        ));
        let payments = Arc::new(PaymentService::new(
            clock,
            verifier,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.payments),
        ));
        let access = Arc::new(AccessService::new(
            counter.clone(),
            Arc::clone(&settings),
            Arc::clone(&payments),
            payment_wall_enabled,
        ));
        let quiz = Arc::new(QuizLoopService::new(
            clock,
            Arc::clone(&topics),
            counter.clone(),
            Arc::clone(&access),
            Arc::clone(&storage.results),
            Arc::clone(&storage.progress),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.results),
            Arc::clone(&storage.progress),
        ));
        let feedback = Arc::new(FeedbackService::new(clock, Arc::clone(&storage.feedback)));

        Self {
            counter,
            auth,
            settings,
            topics,
            access,
            quiz,
            progress,
            feedback,
            payments,
        }
    }

    /// Services over in-memory storage with payments disabled.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::assemble(
            clock,
            &Storage::in_memory(),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryAuthProvider::new()),
            None,
            false,
        )
    }

    /// Services backed by `SQLite` and a JSON local store, per `config`.
    ///
    /// Accounts are kept by a [`LocalAuthProvider`] in the same local store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Degraded` if the database stays unreachable,
    /// or `AppServicesError::Local` if the local store cannot be opened.
    pub async fn sqlite(
        config: &AppConfig,
        clock: Clock,
        policy: RetryPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = connect_with_retry(&config.db_url, policy).await?;
        let local: Arc<dyn LocalStore> =
            Arc::new(JsonFileLocalStore::open(&config.local_store_path)?);

        let verifier: Option<Arc<dyn PaymentVerifier>> =
            config.paystack_secret.as_ref().map(|secret| {
                Arc::new(PaystackVerifier::new(
                    config.paystack_base_url.clone(),
                    secret.clone(),
                )) as Arc<dyn PaymentVerifier>
            });
        if verifier.is_none() {
            tracing::info!("no payment secret configured, payments disabled");
        }

        Ok(Self::assemble(
            clock,
            &storage,
            Arc::clone(&local),
            Arc::new(LocalAuthProvider::new(local)),
            verifier,
            config.payment_wall_enabled,
        ))
    }

    #[must_use]
    pub fn counter(&self) -> QuestionCounterStore {
        self.counter.clone()
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthStore> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<FreemiumSettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn topics(&self) -> Arc<TopicService> {
        Arc::clone(&self.topics)
    }

    #[must_use]
    pub fn access(&self) -> Arc<AccessService> {
        Arc::clone(&self.access)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn feedback(&self) -> Arc<FeedbackService> {
        Arc::clone(&self.feedback)
    }

    #[must_use]
    pub fn payments(&self) -> Arc<PaymentService> {
        Arc::clone(&self.payments)
    }
}

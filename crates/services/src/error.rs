//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{
    AttemptError, FeedbackError, ProfileError, ProgressError, QuestionError, SettingsError,
};
use storage::local::LocalStoreError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors reported by an auth provider adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthProviderError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    AlreadyRegistered,
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted by `AuthStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Provider(#[from] AuthProviderError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FreemiumSettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error("only administrators can change settings")]
    NotAdmin,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Local(#[from] LocalStoreError),
}

/// Errors emitted by `TopicService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicServiceError {
    #[error("topic not found")]
    TopicNotFound,
    #[error("no valid questions available for this topic")]
    NoQuestions,
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FeedbackService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedbackServiceError {
    #[error("sign in to leave feedback")]
    NotAuthenticated,
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by payment verification and `PaymentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PaymentError {
    #[error("payments are not configured")]
    Disabled,
    #[error("payment reference is empty")]
    EmptyReference,
    #[error("payment was not successful: {status}")]
    NotSuccessful { status: String },
    #[error("no profile found for {email}")]
    UnknownCustomer { email: String },
    #[error("payment verification failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("payment verification returned an unexpected body: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the quiz state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no answer selected")]
    NoSelection,
    #[error("option is not part of the current question: {0}")]
    UnknownOption(String),
    #[error("results are being saved")]
    Busy,
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}

/// Errors emitted by `QuizLoopService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizFlowError {
    #[error("purchase access to continue")]
    PaymentRequired,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
    #[error("{var} is not a valid boolean: {raw}")]
    InvalidBool { var: &'static str, raw: String },
    #[error("{var} is not a valid URL: {raw}")]
    InvalidUrl { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error("{message}")]
    Degraded {
        message: &'static str,
        #[source]
        cause: SqliteInitError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Local(#[from] LocalStoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

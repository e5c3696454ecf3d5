#![forbid(unsafe_code)]

pub mod access_service;
pub mod app_services;
pub mod auth_service;
pub mod config;
pub mod counter_service;
pub mod error;
pub mod feedback_service;
pub mod local_auth;
pub mod payment_service;
pub mod progress_service;
pub mod quiz;
pub mod settings_service;
pub mod telemetry;
pub mod topic_service;

pub use quiz_core::Clock;

pub use access_service::AccessService;
pub use app_services::{AppServices, RetryPolicy};
pub use auth_service::{AuthProvider, AuthStore, InMemoryAuthProvider};
pub use config::AppConfig;
pub use counter_service::QuestionCounterStore;
pub use error::{
    AppServicesError, AuthError, FeedbackServiceError, PaymentError, ProgressServiceError,
    QuizError, QuizFlowError, SettingsServiceError, TopicServiceError,
};
pub use feedback_service::FeedbackService;
pub use local_auth::LocalAuthProvider;
pub use payment_service::{PaymentService, PaymentVerifier, PaystackVerifier};
pub use progress_service::ProgressService;
pub use quiz::{QuizController, QuizLoopService, QuizPhase};
pub use settings_service::FreemiumSettingsService;
pub use topic_service::TopicService;

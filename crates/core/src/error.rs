use thiserror::Error;

use crate::model::{
    AttemptError, FeedbackError, ProfileError, ProgressError, QuestionError, SettingsError,
    TopicError,
};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

mod attempt;
mod auth;
mod counter;
mod feedback;
mod ids;
mod profile;
mod progress;
mod question;
mod settings;
mod topic;

pub use ids::{FeedbackId, ParseIdError, ProgressId, QuestionId, ResultId, TopicId, UserId};

pub use attempt::{AttemptError, QuizAttempt, QuizAttemptRow, percentage};
pub use auth::{AuthEvent, AuthSession, PersistedAuth, SessionUser};
pub use counter::{PersistedCounter, QuestionCounter};
pub use feedback::{Feedback, FeedbackError, FeedbackKind, FeedbackRow};
pub use profile::{
    ACCESS_PERIOD_DAYS, Payment, PaymentStatus, Profile, ProfileError, normalize_email,
};
pub use progress::{ProgressError, TopicProgress, TopicProgressRow};
pub use question::{
    OptionReveal, Question, QuestionDraft, QuestionError, RawQuestion, ValidatedQuestion,
    answers_match, normalize_answer,
};
pub use settings::{
    APP_SETTINGS_KEY, DEFAULT_QUESTION_LIMIT, FREE_QUESTIONS_LIMIT_KEY, FreemiumSettings,
    FreemiumSettingsDraft, SettingEntry, SettingsError, enabled_from_value, limit_from_value,
};
pub use topic::{Topic, TopicError};

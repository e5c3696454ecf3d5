use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{FeedbackId, QuestionId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("feedback text cannot be empty")]
    EmptyText,

    #[error("unknown feedback type: {0}")]
    UnknownKind(String),
}

/// What the user thinks about a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Helpful,
    Confusing,
    Incorrect,
}

impl FeedbackKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::Confusing => "confusing",
            Self::Incorrect => "incorrect",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helpful" => Ok(Self::Helpful),
            "confusing" => Ok(Self::Confusing),
            "incorrect" => Ok(Self::Incorrect),
            other => Err(FeedbackError::UnknownKind(other.to_owned())),
        }
    }
}

/// User feedback on a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    user_id: UserId,
    question_id: QuestionId,
    kind: FeedbackKind,
    text: String,
    created_at: DateTime<Utc>,
}

impl Feedback {
    /// # Errors
    ///
    /// Returns `FeedbackError::EmptyText` if the text is blank.
    pub fn new(
        user_id: UserId,
        question_id: QuestionId,
        kind: FeedbackKind,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FeedbackError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedbackError::EmptyText);
        }
        Ok(Self {
            user_id,
            question_id,
            kind,
            text: text.to_owned(),
            created_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn kind(&self) -> FeedbackKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRow {
    pub id: FeedbackId,
    pub feedback: Feedback,
}

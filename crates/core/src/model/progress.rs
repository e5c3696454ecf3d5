use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::attempt::QuizAttempt;
use crate::model::ids::{ProgressId, TopicId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("questions correct ({correct}) exceeds questions attempted ({attempted})")]
    CorrectExceedsAttempted { correct: u32, attempted: u32 },

    #[error("attempt belongs to a different user or topic")]
    Mismatch,
}

/// Cumulative per-user, per-topic tally.
///
/// Updated in place on every attempt (read-modify-write). This is distinct
/// from the individual attempt log and the two may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    user_id: UserId,
    topic_id: TopicId,
    questions_attempted: u32,
    questions_correct: u32,
    completion_percentage: u32,
    last_activity: DateTime<Utc>,
}

impl TopicProgress {
    /// First tally for a (user, topic) pair, created from its first attempt.
    #[must_use]
    pub fn first(attempt: &QuizAttempt, at: DateTime<Utc>) -> Self {
        let attempted = attempt.total_questions();
        let correct = attempt.score();
        Self {
            user_id: attempt.user_id(),
            topic_id: attempt.topic_id().clone(),
            questions_attempted: attempted,
            questions_correct: correct,
            completion_percentage: completion(correct, attempted),
            last_activity: at,
        }
    }

    /// Rehydrate from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CorrectExceedsAttempted` for inconsistent rows.
    pub fn from_persisted(
        user_id: UserId,
        topic_id: TopicId,
        questions_attempted: u32,
        questions_correct: u32,
        completion_percentage: u32,
        last_activity: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if questions_correct > questions_attempted {
            return Err(ProgressError::CorrectExceedsAttempted {
                correct: questions_correct,
                attempted: questions_attempted,
            });
        }
        Ok(Self {
            user_id,
            topic_id,
            questions_attempted,
            questions_correct,
            completion_percentage,
            last_activity,
        })
    }

    /// Fold another attempt into the tally.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Mismatch` if the attempt is for another user/topic.
    pub fn record(&mut self, attempt: &QuizAttempt, at: DateTime<Utc>) -> Result<(), ProgressError> {
        if attempt.user_id() != self.user_id || attempt.topic_id() != &self.topic_id {
            return Err(ProgressError::Mismatch);
        }
        self.questions_attempted = self
            .questions_attempted
            .saturating_add(attempt.total_questions());
        self.questions_correct = self.questions_correct.saturating_add(attempt.score());
        self.completion_percentage = completion(self.questions_correct, self.questions_attempted);
        self.last_activity = at;
        Ok(())
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn questions_attempted(&self) -> u32 {
        self.questions_attempted
    }

    #[must_use]
    pub fn questions_correct(&self) -> u32 {
        self.questions_correct
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u32 {
        self.completion_percentage
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }
}

/// A persisted tally with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProgressRow {
    pub id: ProgressId,
    pub progress: TopicProgress,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn completion(correct: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        return 0;
    }
    (f64::from(correct) / f64::from(attempted) * 100.0).round() as u32
}

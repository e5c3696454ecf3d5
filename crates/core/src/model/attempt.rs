use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ResultId, TopicId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score ({score}) exceeds total questions ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },
}

/// One completed run through a topic's question set.
///
/// Immutable once written; one row per completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    user_id: UserId,
    topic_id: TopicId,
    score: u32,
    total_questions: u32,
    created_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Build an attempt from a finished quiz.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreExceedsTotal` if `score > total_questions`.
    pub fn new(
        user_id: UserId,
        topic_id: TopicId,
        score: u32,
        total_questions: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if score > total_questions {
            return Err(AttemptError::ScoreExceedsTotal {
                score,
                total: total_questions,
            });
        }
        Ok(Self {
            user_id,
            topic_id,
            score,
            total_questions,
            created_at,
        })
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
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Score as a percentage of total, or `None` for an empty attempt.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.total_questions)
    }
}

/// A persisted attempt with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttemptRow {
    pub id: ResultId,
    pub attempt: QuizAttempt,
}

/// `score / total * 100`, or `None` when `total` is zero.
#[must_use]
pub fn percentage(score: u32, total: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(f64::from(score) / f64::from(total) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_above_total_is_rejected() {
        let err = QuizAttempt::new(UserId::random(), TopicId::new("t"), 3, 2, fixed_now())
            .unwrap_err();
        assert_eq!(err, AttemptError::ScoreExceedsTotal { score: 3, total: 2 });
    }

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(percentage(0, 0), None);
        assert_eq!(percentage(4, 5), Some(80.0));
    }
}

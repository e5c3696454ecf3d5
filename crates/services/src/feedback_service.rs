use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{AuthSession, Feedback, FeedbackKind, FeedbackRow, QuestionId, UserId};
use storage::repository::FeedbackRepository;

use crate::error::FeedbackServiceError;

#[derive(Clone)]
pub struct FeedbackService {
    clock: Clock,
    repo: Arc<dyn FeedbackRepository>,
}

impl FeedbackService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn FeedbackRepository>) -> Self {
        Self { clock, repo }
    }

    /// Record feedback on a question from the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackServiceError::NotAuthenticated` for anonymous sessions,
    /// or a validation/storage error.
    pub async fn submit(
        &self,
        session: &AuthSession,
        question_id: QuestionId,
        kind: FeedbackKind,
        text: &str,
    ) -> Result<FeedbackRow, FeedbackServiceError> {
        let user_id = session
            .user_id()
            .ok_or(FeedbackServiceError::NotAuthenticated)?;
        let feedback = Feedback::new(user_id, question_id, kind, text, self.clock.now())?;
        let id = self.repo.append_feedback(&feedback).await?;
        tracing::info!(feedback_id = id, kind = %kind, "feedback submitted");
        Ok(FeedbackRow { id, feedback })
    }

    /// # Errors
    ///
    /// Returns `FeedbackServiceError::Storage` on backend failures.
    pub async fn for_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<FeedbackRow>, FeedbackServiceError> {
        Ok(self.repo.list_for_question(question_id).await?)
    }

    /// # Errors
    ///
    /// Returns `FeedbackServiceError::Storage` on backend failures.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<FeedbackRow>, FeedbackServiceError> {
        Ok(self.repo.list_for_user(user_id).await?)
    }
}

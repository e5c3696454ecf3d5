use std::sync::Arc;

use quiz_core::gate::GateDecision;
use quiz_core::model::{
    AuthSession, QuestionCounter, QuizAttempt, ResultId, TopicId, TopicProgress, UserId,
};
use storage::repository::{ProgressRepository, QuizResultRepository};

use super::controller::{AnswerOutcome, QuizController};
use super::results::ResultsState;
use crate::Clock;
use crate::access_service::AccessService;
use crate::counter_service::QuestionCounterStore;
use crate::error::{QuizFlowError, TopicServiceError};
use crate::topic_service::TopicService;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load questions. Please try again.";
pub const NO_QUESTIONS_MESSAGE: &str = "No questions available for this topic.";
pub const SAVE_FAILED_NOTICE: &str = "Your results could not be saved, but your score is shown below.";

/// A freshly started quiz plus the gate decision at start.
pub struct QuizStart {
    pub controller: QuizController,
    pub gate: GateDecision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    pub outcome: AnswerOutcome,
    pub counter: QuestionCounter,
}

/// Outcome of finishing a quiz. `notice` is set when saving failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishReport {
    pub results: ResultsState,
    pub result_id: Option<ResultId>,
    pub notice: Option<String>,
}

/// Drives a [`QuizController`] and performs its side effects.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    topics: Arc<TopicService>,
    counter: QuestionCounterStore,
    access: Arc<AccessService>,
    results: Arc<dyn QuizResultRepository>,
    progress: Arc<dyn ProgressRepository>,
    shuffle: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        topics: Arc<TopicService>,
        counter: QuestionCounterStore,
        access: Arc<AccessService>,
        results: Arc<dyn QuizResultRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            topics,
            counter,
            access,
            results,
            progress,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Check the gate and load the topic's questions.
    ///
    /// A load failure does not error: the controller comes back in its
    /// `Error` phase with a redirect to the topic list.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::PaymentRequired` if the payment wall blocks the user.
    pub async fn start(
        &self,
        topic_id: TopicId,
        session: &AuthSession,
    ) -> Result<QuizStart, QuizFlowError> {
        let gate = self.access.evaluate(session).await;
        if gate.blocks() {
            return Err(QuizFlowError::PaymentRequired);
        }

        let mut controller = QuizController::new(topic_id.clone());
        match self.topics.quiz_questions(&topic_id).await {
            Ok(questions) => controller.loaded(questions, self.shuffle)?,
            Err(TopicServiceError::NoQuestions) => controller.load_failed(NO_QUESTIONS_MESSAGE),
            Err(e) => {
                tracing::warn!(%topic_id, error = %e, "failed to load quiz questions");
                controller.load_failed(LOAD_FAILED_MESSAGE);
            }
        }
        Ok(QuizStart { controller, gate })
    }

    /// Grade the current selection and count the answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` if the controller rejects the submit.
    pub fn submit(&self, controller: &mut QuizController) -> Result<SubmitResult, QuizFlowError> {
        let outcome = controller.submit()?;
        let counter = self.counter.increment();
        Ok(SubmitResult { outcome, counter })
    }

    /// Move to the next question and re-evaluate the (advisory) gate.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` if there is no next question.
    pub async fn advance(
        &self,
        controller: &mut QuizController,
        session: &AuthSession,
    ) -> Result<GateDecision, QuizFlowError> {
        controller.next()?;
        Ok(self.access.evaluate(session).await)
    }

    /// Finish the quiz, saving the attempt for signed-in users.
    ///
    /// Save failures do not block completion; they surface as `notice`.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` if the last explanation is not showing.
    pub async fn finish(
        &self,
        controller: &mut QuizController,
        session: &AuthSession,
    ) -> Result<FinishReport, QuizFlowError> {
        let pending = controller.begin_submit()?;

        let (result_id, notice) = match session.user_id() {
            Some(user_id) => match self.persist(user_id, &pending).await {
                Ok(id) => (Some(id), None),
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "failed to save quiz result");
                    (None, Some(SAVE_FAILED_NOTICE.to_owned()))
                }
            },
            None => (None, None),
        };

        let results = controller.complete()?;
        tracing::info!(
            topic_id = %results.topic_id,
            score = results.score,
            total = results.total,
            saved = result_id.is_some(),
            "quiz finished"
        );
        Ok(FinishReport {
            results,
            result_id,
            notice,
        })
    }

    async fn persist(&self, user_id: UserId, state: &ResultsState) -> Result<ResultId, QuizFlowError> {
        let now = self.clock.now();
        let attempt = QuizAttempt::new(user_id, state.topic_id.clone(), state.score, state.total, now)?;
        let id = self.results.append_result(&attempt).await?;

        // The tally is a second, non-atomic write; a failure here is only logged.
        if let Err(e) = self.bump_progress(&attempt).await {
            tracing::warn!(%user_id, topic_id = %state.topic_id, error = %e, "failed to update progress");
        }
        Ok(id)
    }

    async fn bump_progress(&self, attempt: &QuizAttempt) -> Result<(), QuizFlowError> {
        let now = self.clock.now();
        match self
            .progress
            .get_progress(attempt.user_id(), attempt.topic_id())
            .await?
        {
            Some(mut row) => {
                row.progress.record(attempt, now)?;
                self.progress.update_progress(row.id, &row.progress).await?;
            }
            None => {
                self.progress
                    .insert_progress(&TopicProgress::first(attempt, now))
                    .await?;
            }
        }
        Ok(())
    }
}

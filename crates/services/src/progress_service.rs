use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::aggregate::{self, AttemptRecord, ProgressReport, ProgressSeed};
use quiz_core::model::{TopicId, UserId};
use storage::repository::{ProgressRepository, QuizResultRepository, TopicRepository};

use crate::error::ProgressServiceError;

/// Reads both progress sources and reconciles them into one report.
#[derive(Clone)]
pub struct ProgressService {
    topics: Arc<dyn TopicRepository>,
    results: Arc<dyn QuizResultRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        topics: Arc<dyn TopicRepository>,
        results: Arc<dyn QuizResultRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            topics,
            results,
            progress,
        }
    }

    /// Build the progress report for a user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if any of the reads fail.
    pub async fn report(&self, user_id: UserId) -> Result<ProgressReport, ProgressServiceError> {
        let (tallies, attempts, topics) = tokio::try_join!(
            self.progress.list_progress(user_id),
            self.results.list_results(user_id),
            self.topics.list_topics(),
        )?;

        let titles: HashMap<TopicId, String> = topics
            .into_iter()
            .map(|t| (t.id().clone(), t.title().to_owned()))
            .collect();

        let seeds: Vec<ProgressSeed> = tallies
            .into_iter()
            .map(|row| ProgressSeed {
                topic_title: titles.get(row.progress.topic_id()).cloned(),
                topic_id: row.progress.topic_id().clone(),
                questions_attempted: row.progress.questions_attempted(),
                completion_percentage: row.progress.completion_percentage(),
                last_activity: row.progress.last_activity(),
            })
            .collect();

        let records: Vec<AttemptRecord> = attempts
            .into_iter()
            .map(|row| AttemptRecord {
                topic_title: titles.get(row.attempt.topic_id()).cloned(),
                topic_id: row.attempt.topic_id().clone(),
                score: row.attempt.score(),
                total_questions: row.attempt.total_questions(),
                completed_at: row.attempt.created_at(),
            })
            .collect();

        let report = aggregate::aggregate(&seeds, &records);
        tracing::debug!(
            %user_id,
            topics = report.topics.len(),
            quizzes = report.stats.total_quizzes,
            "built progress report"
        );
        Ok(report)
    }
}

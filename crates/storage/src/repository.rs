use async_trait::async_trait;
use quiz_core::model::{
    Feedback, FeedbackId, FeedbackRow, Payment, Profile, ProgressId, Question, QuestionId,
    QuizAttempt, QuizAttemptRow, RawQuestion, ResultId, SettingEntry, Topic, TopicId,
    TopicProgress, TopicProgressRow, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convert a validated question into the row shape the backend stores.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the options cannot be encoded.
pub fn raw_from_question(question: &Question) -> Result<RawQuestion, StorageError> {
    Ok(RawQuestion {
        id: question.id().clone(),
        topic_id: question.topic_id().clone(),
        question: Some(question.prompt().to_owned()),
        options: Some(
            question
                .options_json()
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        ),
        correct_answer: Some(question.correct_answer().to_owned()),
        explanation: question.explanation().map(str::to_owned),
    })
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Persist or update a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// Fetch a topic by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError>;

    /// All topics, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store a question row as-is. No schema checks are applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_raw_question(&self, question: &RawQuestion) -> Result<(), StorageError>;

    /// All question rows of a topic, unvalidated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn raw_questions(&self, topic_id: &TopicId) -> Result<Vec<RawQuestion>, StorageError>;

    /// Store a validated question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let raw = raw_from_question(question)?;
        self.upsert_raw_question(&raw).await
    }
}

#[async_trait]
pub trait QuizResultRepository: Send + Sync {
    /// Append an immutable attempt row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn append_result(&self, attempt: &QuizAttempt) -> Result<ResultId, StorageError>;

    /// Attempts of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizAttemptRow>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Tally for a (user, topic) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<TopicProgressRow>, StorageError>;

    /// Create the first tally for a (user, topic) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if one already exists.
    async fn insert_progress(&self, progress: &TopicProgress) -> Result<ProgressId, StorageError>;

    /// Overwrite an existing tally.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if `id` does not exist.
    async fn update_progress(
        &self,
        id: ProgressId,
        progress: &TopicProgress,
    ) -> Result<(), StorageError>;

    /// All tallies of a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<TopicProgressRow>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError>;

    /// Lookup by normalized (lowercase) email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StorageError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the reference was already recorded.
    async fn record_payment(&self, payment: &Payment) -> Result<i64, StorageError>;

    /// Payments of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_payments(&self, user_id: UserId) -> Result<Vec<Payment>, StorageError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn append_feedback(&self, feedback: &Feedback) -> Result<FeedbackId, StorageError>;

    /// Feedback on a question, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_for_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<FeedbackRow>, StorageError>;

    /// Feedback written by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<FeedbackRow>, StorageError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_setting(&self, key: &str) -> Result<Option<SettingEntry>, StorageError>;

    /// Insert or replace a setting by key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the setting cannot be stored.
    async fn put_setting(&self, entry: &SettingEntry) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    topics: Vec<Topic>,
    questions: Vec<RawQuestion>,
    results: Vec<QuizAttemptRow>,
    progress: Vec<TopicProgressRow>,
    profiles: HashMap<UserId, Profile>,
    payments: Vec<Payment>,
    feedback: Vec<FeedbackRow>,
    settings: HashMap<String, SettingEntry>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, i64),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.topics.iter_mut().find(|t| t.id() == topic.id()) {
            Some(existing) => *existing = topic.clone(),
            None => guard.topics.push(topic.clone()),
        }
        Ok(())
    }

    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.topics.iter().find(|t| t.id() == id).cloned())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
        let guard = self.lock()?;
        let mut topics = guard.topics.clone();
        topics.sort_by_key(Topic::created_at);
        Ok(topics)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_raw_question(&self, question: &RawQuestion) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => *existing = question.clone(),
            None => guard.questions.push(question.clone()),
        }
        Ok(())
    }

    async fn raw_questions(&self, topic_id: &TopicId) -> Result<Vec<RawQuestion>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .iter()
            .filter(|q| &q.topic_id == topic_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizResultRepository for InMemoryRepository {
    async fn append_result(&self, attempt: &QuizAttempt) -> Result<ResultId, StorageError> {
        let mut guard = self.lock()?;
        let id = guard.next_id();
        guard.results.push(QuizAttemptRow {
            id,
            attempt: attempt.clone(),
        });
        Ok(id)
    }

    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizAttemptRow>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<_> = guard
            .results
            .iter()
            .filter(|r| r.attempt.user_id() == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| (r.attempt.created_at(), r.id));
        Ok(rows)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<TopicProgressRow>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .iter()
            .find(|r| r.progress.user_id() == user_id && r.progress.topic_id() == topic_id)
            .cloned())
    }

    async fn insert_progress(&self, progress: &TopicProgress) -> Result<ProgressId, StorageError> {
        let mut guard = self.lock()?;
        let exists = guard.progress.iter().any(|r| {
            r.progress.user_id() == progress.user_id() && r.progress.topic_id() == progress.topic_id()
        });
        if exists {
            return Err(StorageError::Conflict);
        }
        let id = guard.next_id();
        guard.progress.push(TopicProgressRow {
            id,
            progress: progress.clone(),
        });
        Ok(id)
    }

    async fn update_progress(
        &self,
        id: ProgressId,
        progress: &TopicProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard
            .progress
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StorageError::NotFound)?;
        row.progress = progress.clone();
        Ok(())
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<TopicProgressRow>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .iter()
            .filter(|r| r.progress.user_id() == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.profiles.insert(profile.id(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.get(&id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StorageError> {
        let needle = email.trim().to_lowercase();
        let guard = self.lock()?;
        Ok(guard
            .profiles
            .values()
            .find(|p| p.email() == needle)
            .cloned())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryRepository {
    async fn record_payment(&self, payment: &Payment) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        if guard.payments.iter().any(|p| p.reference == payment.reference) {
            return Err(StorageError::Conflict);
        }
        guard.payments.push(payment.clone());
        Ok(guard.next_id())
    }

    async fn list_payments(&self, user_id: UserId) -> Result<Vec<Payment>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<_> = guard
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryRepository {
    async fn append_feedback(&self, feedback: &Feedback) -> Result<FeedbackId, StorageError> {
        let mut guard = self.lock()?;
        let id = guard.next_id();
        guard.feedback.push(FeedbackRow {
            id,
            feedback: feedback.clone(),
        });
        Ok(id)
    }

    async fn list_for_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<FeedbackRow>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<_> = guard
            .feedback
            .iter()
            .filter(|r| r.feedback.question_id() == question_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| (r.feedback.created_at(), r.id));
        Ok(rows)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<FeedbackRow>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<_> = guard
            .feedback
            .iter()
            .filter(|r| r.feedback.user_id() == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| (r.feedback.created_at(), r.id));
        Ok(rows)
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingEntry>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.settings.get(key).cloned())
    }

    async fn put_setting(&self, entry: &SettingEntry) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.settings.insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}

//
// ─── STORAGE BUNDLE ────────────────────────────────────────────────────────────
//

/// Aggregates the backend tables behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub topics: Arc<dyn TopicRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn QuizResultRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Use one repository value for every table.
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: TopicRepository
            + QuestionRepository
            + QuizResultRepository
            + ProgressRepository
            + ProfileRepository
            + PaymentRepository
            + FeedbackRepository
            + SettingsRepository
            + Clone
            + 'static,
    {
        Self {
            topics: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            payments: Arc::new(repo.clone()),
            feedback: Arc::new(repo.clone()),
            settings: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{FeedbackKind, QuestionDraft};
    use quiz_core::time::fixed_now;

    fn topic(id: &str, minutes: i64) -> Topic {
        Topic::new(
            TopicId::new(id),
            id.to_uppercase(),
            None,
            None,
            fixed_now() + chrono::Duration::minutes(minutes),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn topics_are_listed_oldest_first() {
        let repo = InMemoryRepository::new();
        repo.upsert_topic(&topic("b", 2)).await.unwrap();
        repo.upsert_topic(&topic("a", 1)).await.unwrap();
        repo.upsert_topic(&topic("b", 2)).await.unwrap();

        let ids: Vec<_> = repo
            .list_topics()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn validated_question_is_stored_as_raw_row() {
        let repo = InMemoryRepository::new();
        let question = QuestionDraft {
            topic_id: Some(TopicId::new("net")),
            prompt: "Port for HTTPS?".into(),
            options: vec!["80".into(), "443".into()],
            correct_answer: "443".into(),
            explanation: None,
        }
        .validate()
        .unwrap()
        .assign_id(QuestionId::new("q1"));

        repo.upsert_question(&question).await.unwrap();
        let rows = repo.raw_questions(&TopicId::new("net")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].options.as_deref(), Some(r#"["80","443"]"#));
        assert_eq!(Question::from_raw(rows[0].clone()).unwrap(), question);
    }

    #[tokio::test]
    async fn progress_insert_conflicts_on_duplicate_pair() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let attempt = QuizAttempt::new(user, TopicId::new("net"), 1, 2, fixed_now()).unwrap();
        let progress = TopicProgress::first(&attempt, fixed_now());

        repo.insert_progress(&progress).await.unwrap();
        let err = repo.insert_progress(&progress).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn results_are_newest_first() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        for minutes in [1, 3, 2] {
            let at = fixed_now() + chrono::Duration::minutes(minutes);
            let attempt = QuizAttempt::new(user, TopicId::new("net"), 1, 1, at).unwrap();
            repo.append_result(&attempt).await.unwrap();
        }
        let times: Vec<_> = repo
            .list_results(user)
            .await
            .unwrap()
            .iter()
            .map(|r| r.attempt.created_at())
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn feedback_is_filtered_by_question() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        for q in ["q1", "q2", "q1"] {
            let fb = Feedback::new(
                user,
                QuestionId::new(q),
                FeedbackKind::Helpful,
                "nice",
                fixed_now(),
            )
            .unwrap();
            repo.append_feedback(&fb).await.unwrap();
        }
        assert_eq!(repo.list_for_question(&QuestionId::new("q1")).await.unwrap().len(), 2);
        assert_eq!(repo.list_for_user(user).await.unwrap().len(), 3);
    }
}

use std::sync::Arc;

use quiz_core::model::{Question, QuestionDraft, QuestionId, Topic, TopicId};
use storage::repository::{QuestionRepository, TopicRepository};

use crate::error::TopicServiceError;

/// Topic catalog and question loading.
#[derive(Clone)]
pub struct TopicService {
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl TopicService {
    #[must_use]
    pub fn new(topics: Arc<dyn TopicRepository>, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { topics, questions }
    }

    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` on backend failures.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, TopicServiceError> {
        Ok(self.topics.list_topics().await?)
    }

    /// # Errors
    ///
    /// Returns `TopicServiceError::TopicNotFound` if the topic does not exist.
    pub async fn get_topic(&self, id: &TopicId) -> Result<Topic, TopicServiceError> {
        self.topics
            .get_topic(id)
            .await?
            .ok_or(TopicServiceError::TopicNotFound)
    }

    /// Questions of a topic that pass read-time validation, in stored order.
    ///
    /// Rows that fail validation are dropped with a warning. A correct answer
    /// missing from the options is kept but logged.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::NoQuestions` if nothing survives filtering.
    pub async fn quiz_questions(&self, topic_id: &TopicId) -> Result<Vec<Question>, TopicServiceError> {
        let rows = self.questions.raw_questions(topic_id).await?;
        let fetched = rows.len();
        let questions: Vec<Question> = rows
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                match Question::from_raw(raw) {
                    Ok(q) => {
                        if !q.has_listed_answer() {
                            tracing::warn!(question_id = %id, "correct answer is not among the options");
                        }
                        Some(q)
                    }
                    Err(e) => {
                        tracing::warn!(question_id = %id, error = %e, "dropping invalid question");
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(%topic_id, fetched, valid = questions.len(), "loaded quiz questions");
        if questions.is_empty() {
            return Err(TopicServiceError::NoQuestions);
        }
        Ok(questions)
    }

    /// Validate and store a new question under a generated id.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Question` if the draft is invalid, or
    /// `TopicServiceError::TopicNotFound` if its topic does not exist.
    pub async fn add_question(&self, draft: QuestionDraft) -> Result<Question, TopicServiceError> {
        let validated = draft.validate()?;
        let question = validated.assign_id(QuestionId::new(uuid::Uuid::new_v4().to_string()));
        if self.topics.get_topic(question.topic_id()).await?.is_none() {
            return Err(TopicServiceError::TopicNotFound);
        }
        self.questions.upsert_question(&question).await?;
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::RawQuestion;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn raw(id: &str, options: Option<&str>, correct: Option<&str>) -> RawQuestion {
        RawQuestion {
            id: QuestionId::new(id),
            topic_id: TopicId::new("net"),
            question: Some(format!("Question {id}")),
            options: options.map(str::to_owned),
            correct_answer: correct.map(str::to_owned),
            explanation: None,
        }
    }

    async fn service_with(rows: &[RawQuestion]) -> TopicService {
        let repo = InMemoryRepository::new();
        repo.upsert_topic(&Topic::new(TopicId::new("net"), "Net", None, None, fixed_now()).unwrap())
            .await
            .unwrap();
        for row in rows {
            repo.upsert_raw_question(row).await.unwrap();
        }
        TopicService::new(Arc::new(repo.clone()), Arc::new(repo))
    }

    #[tokio::test]
    async fn invalid_rows_are_filtered() {
        let svc = service_with(&[
            raw("ok", Some(r#"["a","b"]"#), Some("a")),
            raw("empty", Some("[]"), Some("a")),
            raw("garbled", Some("{oops"), Some("a")),
            raw("no-answer", Some(r#"["a"]"#), None),
            raw("unlisted", Some(r#"["a","b"]"#), Some("z")),
        ])
        .await;

        let ids: Vec<_> = svc
            .quiz_questions(&TopicId::new("net"))
            .await
            .unwrap()
            .iter()
            .map(|q| q.id().to_string())
            .collect();
        assert_eq!(ids, vec!["ok", "unlisted"]);
    }

    #[tokio::test]
    async fn all_invalid_is_an_error() {
        let svc = service_with(&[raw("empty", Some("[]"), Some("a"))]).await;
        let err = svc.quiz_questions(&TopicId::new("net")).await.unwrap_err();
        assert!(matches!(err, TopicServiceError::NoQuestions));
    }

    #[tokio::test]
    async fn authoring_rejects_unlisted_answer_and_unknown_topic() {
        let svc = service_with(&[]).await;
        let draft = QuestionDraft {
            topic_id: Some(TopicId::new("net")),
            prompt: "Pick one".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: "c".into(),
            explanation: None,
        };
        let err = svc.add_question(draft.clone()).await.unwrap_err();
        assert!(matches!(err, TopicServiceError::Question(_)));

        let orphan = QuestionDraft {
            topic_id: Some(TopicId::new("missing")),
            correct_answer: "a".into(),
            ..draft.clone()
        };
        let err = svc.add_question(orphan).await.unwrap_err();
        assert!(matches!(err, TopicServiceError::TopicNotFound));

        let ok = QuestionDraft {
            correct_answer: " A ".into(),
            ..draft
        };
        let stored = svc.add_question(ok).await.unwrap();
        assert_eq!(stored.correct_answer(), "a");
    }
}

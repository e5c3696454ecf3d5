use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::gate::GateDecision;
use quiz_core::model::{
    AuthSession, QuestionDraft, QuestionId, QuizAttempt, QuizAttemptRow, ResultId, SessionUser,
    Topic, TopicId, UserId,
};
use quiz_core::time::fixed_now;
use services::quiz::{ResultsState, ResultsView, Route, resolve};
use services::{AppServices, Clock, InMemoryAuthProvider, QuizFlowError, QuizPhase};
use storage::local::InMemoryLocalStore;
use storage::repository::{QuizResultRepository, Storage, StorageError};

const TOPIC: &str = "network-security";

async fn seed(storage: &Storage, questions: usize) {
    let topic = Topic::new(
        TopicId::new(TOPIC),
        "Network Security",
        Some("Firewalls, ports and protocols".into()),
        None,
        fixed_now(),
    )
    .unwrap();
    storage.topics.upsert_topic(&topic).await.unwrap();

    for n in 1..=questions {
        let question = QuestionDraft {
            topic_id: Some(TopicId::new(TOPIC)),
            prompt: format!("Which port does HTTPS use? ({n})"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: "c".into(),
            explanation: Some("HTTPS listens on 443.".into()),
        }
        .validate()
        .unwrap()
        .assign_id(QuestionId::new(format!("{TOPIC}-{n}")));
        storage.questions.upsert_question(&question).await.unwrap();
    }
}

fn services(storage: &Storage, payment_wall_enabled: bool) -> AppServices {
    AppServices::assemble(
        Clock::fixed(fixed_now()),
        storage,
        Arc::new(InMemoryLocalStore::new()),
        Arc::new(InMemoryAuthProvider::new()),
        None,
        payment_wall_enabled,
    )
}

fn learner() -> AuthSession {
    AuthSession::signed_in(SessionUser {
        id: UserId::random(),
        email: "learner@secquiz.io".into(),
        name: Some("Ada".into()),
        is_admin: false,
    })
}

struct OfflineResults;

#[async_trait]
impl QuizResultRepository for OfflineResults {
    async fn append_result(&self, _attempt: &QuizAttempt) -> Result<ResultId, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn list_results(&self, _user_id: UserId) -> Result<Vec<QuizAttemptRow>, StorageError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn single_correct_answer_reaches_results() {
    let storage = Storage::in_memory();
    seed(&storage, 1).await;
    let app = services(&storage, false);
    let session = learner();
    let user_id = session.user_id().unwrap();
    let quiz = app.quiz();

    let mut start = quiz.start(TopicId::new(TOPIC), &session).await.unwrap();
    assert_eq!(start.gate, GateDecision::Allow);
    assert_eq!(start.controller.phase(), &QuizPhase::Presenting(0));

    start.controller.select("c").unwrap();
    let submitted = quiz.submit(&mut start.controller).unwrap();
    assert!(submitted.outcome.correct);
    assert_eq!(submitted.counter.count(), 1);

    let report = quiz.finish(&mut start.controller, &session).await.unwrap();
    assert_eq!(
        report.results,
        ResultsState {
            score: 1,
            total: 1,
            topic_id: TopicId::new(TOPIC),
        }
    );
    assert!(report.result_id.is_some());
    assert_eq!(report.notice, None);
    assert_eq!(start.controller.phase(), &QuizPhase::Done);
    assert!(matches!(
        resolve(Some(&report.results)),
        ResultsView::Render { percentage: 100, .. }
    ));

    let progress = storage
        .progress
        .get_progress(user_id, &TopicId::new(TOPIC))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.progress.questions_attempted(), 1);
    assert_eq!(progress.progress.questions_correct(), 1);
    assert_eq!(storage.results.list_results(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn repeated_quizzes_accumulate_progress() {
    let storage = Storage::in_memory();
    seed(&storage, 2).await;
    let app = services(&storage, false);
    let session = learner();
    let user_id = session.user_id().unwrap();
    let quiz = app.quiz();

    for pick in ["c", "a"] {
        let mut start = quiz.start(TopicId::new(TOPIC), &session).await.unwrap();
        start.controller.select(pick).unwrap();
        quiz.submit(&mut start.controller).unwrap();
        quiz.advance(&mut start.controller, &session).await.unwrap();
        start.controller.select("c").unwrap();
        quiz.submit(&mut start.controller).unwrap();
        quiz.finish(&mut start.controller, &session).await.unwrap();
    }

    let row = storage
        .progress
        .get_progress(user_id, &TopicId::new(TOPIC))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.progress.questions_attempted(), 4);
    assert_eq!(row.progress.questions_correct(), 3);
    assert_eq!(row.progress.completion_percentage(), 75);
    assert_eq!(app.counter().snapshot().count(), 4);

    let report = app.progress().report(user_id).await.unwrap();
    assert_eq!(report.stats.total_quizzes, 2);
    assert_eq!(report.stats.topics_attempted, 1);
    assert_eq!(report.stats.best_topic.as_deref(), Some("Network Security"));
}

#[tokio::test]
async fn anonymous_results_are_not_saved() {
    let storage = Storage::in_memory();
    seed(&storage, 1).await;
    let app = services(&storage, false);
    let quiz = app.quiz();
    let session = AuthSession::anonymous();

    let mut start = quiz.start(TopicId::new(TOPIC), &session).await.unwrap();
    start.controller.select("a").unwrap();
    quiz.submit(&mut start.controller).unwrap();
    let report = quiz.finish(&mut start.controller, &session).await.unwrap();

    assert_eq!(report.results.score, 0);
    assert_eq!(report.result_id, None);
    assert_eq!(report.notice, None);
    assert_eq!(app.counter().snapshot().count(), 1);
}

#[tokio::test]
async fn signup_prompt_is_advisory() {
    let storage = Storage::in_memory();
    seed(&storage, 12).await;
    let app = services(&storage, false);
    let quiz = app.quiz();
    let session = AuthSession::anonymous();

    let mut start = quiz.start(TopicId::new(TOPIC), &session).await.unwrap();
    let mut prompted = None;
    for _ in 0..11 {
        start.controller.select("c").unwrap();
        quiz.submit(&mut start.controller).unwrap();
        let gate = quiz.advance(&mut start.controller, &session).await.unwrap();
        if prompted.is_none() && gate != GateDecision::Allow {
            prompted = Some(gate);
        }
    }

    assert_eq!(
        prompted,
        Some(GateDecision::SignupPrompt {
            answered: 10,
            limit: 10
        })
    );
    assert_eq!(start.controller.phase(), &QuizPhase::Presenting(11));
    assert_eq!(app.access().free_questions_left(&session).await, Some(0));
}

#[tokio::test]
async fn payment_wall_blocks_unpaid_users() {
    let storage = Storage::in_memory();
    seed(&storage, 1).await;
    let app = services(&storage, true);

    let result = app.quiz().start(TopicId::new(TOPIC), &learner()).await;
    assert!(matches!(result, Err(QuizFlowError::PaymentRequired)));

    let anonymous = app
        .quiz()
        .start(TopicId::new(TOPIC), &AuthSession::anonymous())
        .await
        .unwrap();
    assert_eq!(anonymous.controller.phase(), &QuizPhase::Presenting(0));
}

#[tokio::test]
async fn unknown_topic_redirects_to_topics() {
    let storage = Storage::in_memory();
    let app = services(&storage, false);

    let start = app
        .quiz()
        .start(TopicId::new("missing"), &learner())
        .await
        .unwrap();
    assert!(matches!(start.controller.phase(), QuizPhase::Error { .. }));
    assert_eq!(start.controller.redirect(), Some(Route::Topics));
}

#[tokio::test]
async fn failed_save_still_shows_score() {
    let mut storage = Storage::in_memory();
    seed(&storage, 1).await;
    storage.results = Arc::new(OfflineResults);
    let app = services(&storage, false);
    let session = learner();
    let quiz = app.quiz();

    let mut start = quiz.start(TopicId::new(TOPIC), &session).await.unwrap();
    start.controller.select("c").unwrap();
    quiz.submit(&mut start.controller).unwrap();
    let report = quiz.finish(&mut start.controller, &session).await.unwrap();

    assert_eq!(report.results.score, 1);
    assert_eq!(report.result_id, None);
    assert!(report.notice.is_some());
    assert_eq!(start.controller.phase(), &QuizPhase::Done);

    let tally = storage
        .progress
        .get_progress(session.user_id().unwrap(), &TopicId::new(TOPIC))
        .await
        .unwrap();
    assert!(tally.is_none());
}

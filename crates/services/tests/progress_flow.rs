use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{QuizAttempt, Topic, TopicId, TopicProgress, UserId};
use quiz_core::time::fixed_now;
use services::ProgressService;
use storage::repository::{
    InMemoryRepository, ProgressRepository, QuizResultRepository, TopicRepository,
};

fn service(repo: &InMemoryRepository) -> ProgressService {
    ProgressService::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

async fn topic(repo: &InMemoryRepository, id: &str, title: &str, minutes: i64) {
    let topic = Topic::new(
        TopicId::new(id),
        title,
        None,
        None,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap();
    repo.upsert_topic(&topic).await.unwrap();
}

async fn result(repo: &InMemoryRepository, user: UserId, topic: &str, score: u32, total: u32, minutes: i64) {
    let attempt = QuizAttempt::new(
        user,
        TopicId::new(topic),
        score,
        total,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap();
    repo.append_result(&attempt).await.unwrap();
}

#[tokio::test]
async fn merges_tallies_with_attempt_history() {
    let repo = InMemoryRepository::new();
    let user = UserId::random();
    topic(&repo, "network-security", "Network Security", 0).await;
    topic(&repo, "cryptography", "Cryptography", 1).await;

    let tally = TopicProgress::from_persisted(
        user,
        TopicId::new("network-security"),
        4,
        3,
        75,
        fixed_now(),
    )
    .unwrap();
    repo.insert_progress(&tally).await.unwrap();

    result(&repo, user, "network-security", 1, 2, 10).await;
    result(&repo, user, "cryptography", 2, 2, 20).await;
    // Topic was removed from the catalog; counted in stats, skipped in the fold.
    result(&repo, user, "retired-topic", 0, 4, 5).await;

    let report = service(&repo).report(user).await.unwrap();

    let network = report.topic(&TopicId::new("network-security")).unwrap();
    assert_eq!(network.attempts, 5);
    assert!((network.average_score - 70.0).abs() < 1e-9);
    assert!((network.best_score - 75.0).abs() < 1e-9);
    assert_eq!(network.last_attempt, fixed_now() + Duration::minutes(10));

    let crypto = report.topic(&TopicId::new("cryptography")).unwrap();
    assert_eq!(crypto.attempts, 1);
    assert!((crypto.best_score - 100.0).abs() < 1e-9);

    assert!(report.topic(&TopicId::new("retired-topic")).is_none());
    assert_eq!(report.stats.total_quizzes, 3);
    assert_eq!(report.stats.topics_attempted, 3);
    assert!((report.stats.average_score - 50.0).abs() < 1e-9);
    assert_eq!(report.stats.best_topic.as_deref(), Some("Cryptography"));
    assert_eq!(
        report.stats.recent_activity[0].topic_id,
        TopicId::new("cryptography")
    );
}

#[tokio::test]
async fn empty_history_yields_empty_report() {
    let repo = InMemoryRepository::new();
    topic(&repo, "network-security", "Network Security", 0).await;

    let report = service(&repo).report(UserId::random()).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(report.stats.total_quizzes, 0);
    assert_eq!(report.stats.best_topic, None);
}

#[tokio::test]
async fn other_users_rows_are_ignored() {
    let repo = InMemoryRepository::new();
    topic(&repo, "cryptography", "Cryptography", 0).await;
    let me = UserId::random();
    let someone_else = UserId::random();

    result(&repo, someone_else, "cryptography", 2, 2, 1).await;
    result(&repo, me, "cryptography", 1, 4, 2).await;

    let report = service(&repo).report(me).await.unwrap();
    assert_eq!(report.stats.total_quizzes, 1);
    let crypto = report.topic(&TopicId::new("cryptography")).unwrap();
    assert!((crypto.best_score - 25.0).abs() < 1e-9);
}

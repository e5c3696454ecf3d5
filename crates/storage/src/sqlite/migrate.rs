use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            topic_id TEXT NOT NULL,
            question TEXT,
            options TEXT,
            correct_answer TEXT,
            explanation TEXT,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_results (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            topic_id TEXT NOT NULL,
            score INTEGER NOT NULL CHECK (score >= 0),
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            created_at TEXT NOT NULL,
            CHECK (score <= total_questions)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_progress (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            topic_id TEXT NOT NULL,
            questions_attempted INTEGER NOT NULL CHECK (questions_attempted >= 0),
            questions_correct INTEGER NOT NULL CHECK (questions_correct >= 0),
            completion_percentage INTEGER NOT NULL
                CHECK (completion_percentage BETWEEN 0 AND 100),
            last_activity TEXT NOT NULL,
            UNIQUE (user_id, topic_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            has_access INTEGER NOT NULL DEFAULT 0,
            access_expires_at TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            reference TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS question_feedback (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            feedback_type TEXT NOT NULL
                CHECK (feedback_type IN ('helpful', 'confusing', 'incorrect')),
            feedback_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_by TEXT,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_topic
            ON questions (topic_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_results_user_created
            ON quiz_results (user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_payments_user_created
            ON payments (user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_feedback_question_created
            ON question_feedback (question_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_feedback_user_created
            ON question_feedback (user_id, created_at);
    ",
];

/// Runs a single, consolidated migration for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: topics, questions, results, progress, profiles, payments, feedback, settings.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1.iter().copied() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}

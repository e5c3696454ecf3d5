use quiz_core::model::{QuizAttempt, QuizAttemptRow, ResultId, TopicId, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64, user_id_from_text};
use crate::repository::{QuizResultRepository, StorageError};

fn attempt_row_from_row(row: &SqliteRow) -> Result<QuizAttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id = user_id_from_text(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let topic_id = TopicId::new(row.try_get::<String, _>("topic_id").map_err(ser)?);
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let total = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    let attempt = QuizAttempt::new(user_id, topic_id, score, total, created_at).map_err(ser)?;
    Ok(QuizAttemptRow { id, attempt })
}

#[async_trait::async_trait]
impl QuizResultRepository for SqliteRepository {
    async fn append_result(&self, attempt: &QuizAttempt) -> Result<ResultId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO quiz_results (user_id, topic_id, score, total_questions, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(attempt.user_id().to_string())
        .bind(attempt.topic_id().as_str())
        .bind(i64::from(attempt.score()))
        .bind(i64::from(attempt.total_questions()))
        .bind(attempt.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizAttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, topic_id, score, total_questions, created_at
            FROM quiz_results
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(attempt_row_from_row).collect()
    }
}

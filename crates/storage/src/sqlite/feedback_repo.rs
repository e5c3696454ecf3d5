use quiz_core::model::{Feedback, FeedbackId, FeedbackKind, FeedbackRow, QuestionId, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, user_id_from_text};
use crate::repository::{FeedbackRepository, StorageError};

fn feedback_row_from_row(row: &SqliteRow) -> Result<FeedbackRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id = user_id_from_text(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let question_id = QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?);
    let kind: FeedbackKind = row
        .try_get::<String, _>("feedback_type")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let text: String = row.try_get("feedback_text").map_err(ser)?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    let feedback = Feedback::new(user_id, question_id, kind, &text, created_at).map_err(ser)?;
    Ok(FeedbackRow { id, feedback })
}

const SELECT_FEEDBACK: &str = r"
    SELECT id, user_id, question_id, feedback_type, feedback_text, created_at
    FROM question_feedback
";

#[async_trait::async_trait]
impl FeedbackRepository for SqliteRepository {
    async fn append_feedback(&self, feedback: &Feedback) -> Result<FeedbackId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO question_feedback (
                user_id, question_id, feedback_type, feedback_text, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(feedback.user_id().to_string())
        .bind(feedback.question_id().as_str())
        .bind(feedback.kind().as_str())
        .bind(feedback.text())
        .bind(feedback.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_for_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<FeedbackRow>, StorageError> {
        let sql = format!("{SELECT_FEEDBACK} WHERE question_id = ?1 ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .bind(question_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(feedback_row_from_row).collect()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<FeedbackRow>, StorageError> {
        let sql = format!("{SELECT_FEEDBACK} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(feedback_row_from_row).collect()
    }
}

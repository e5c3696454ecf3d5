use quiz_core::model::{ProgressId, TopicId, TopicProgress, TopicProgressRow, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64, user_id_from_text};
use crate::repository::{ProgressRepository, StorageError};

fn progress_row_from_row(row: &SqliteRow) -> Result<TopicProgressRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id = user_id_from_text(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let topic_id = TopicId::new(row.try_get::<String, _>("topic_id").map_err(ser)?);
    let attempted = u32_from_i64(
        "questions_attempted",
        row.try_get::<i64, _>("questions_attempted").map_err(ser)?,
    )?;
    let correct = u32_from_i64(
        "questions_correct",
        row.try_get::<i64, _>("questions_correct").map_err(ser)?,
    )?;
    let completion = u32_from_i64(
        "completion_percentage",
        row.try_get::<i64, _>("completion_percentage").map_err(ser)?,
    )?;
    let last_activity = row.try_get("last_activity").map_err(ser)?;

    let progress = TopicProgress::from_persisted(
        user_id,
        topic_id,
        attempted,
        correct,
        completion,
        last_activity,
    )
    .map_err(ser)?;
    Ok(TopicProgressRow { id, progress })
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<TopicProgressRow>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, topic_id, questions_attempted, questions_correct,
                   completion_percentage, last_activity
            FROM user_progress
            WHERE user_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(topic_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(progress_row_from_row).transpose()
    }

    async fn insert_progress(&self, progress: &TopicProgress) -> Result<ProgressId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO user_progress (
                user_id, topic_id, questions_attempted, questions_correct,
                completion_percentage, last_activity
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(progress.user_id().to_string())
        .bind(progress.topic_id().as_str())
        .bind(i64::from(progress.questions_attempted()))
        .bind(i64::from(progress.questions_correct()))
        .bind(i64::from(progress.completion_percentage()))
        .bind(progress.last_activity())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn update_progress(
        &self,
        id: ProgressId,
        progress: &TopicProgress,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE user_progress SET
                questions_attempted = ?2,
                questions_correct = ?3,
                completion_percentage = ?4,
                last_activity = ?5
            WHERE id = ?1
            ",
        )
        .bind(id)
        .bind(i64::from(progress.questions_attempted()))
        .bind(i64::from(progress.questions_correct()))
        .bind(i64::from(progress.completion_percentage()))
        .bind(progress.last_activity())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<TopicProgressRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, topic_id, questions_attempted, questions_correct,
                   completion_percentage, last_activity
            FROM user_progress
            WHERE user_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        // One bad tally must not hide the rest of the user's progress.
        Ok(rows
            .iter()
            .filter_map(|row| match progress_row_from_row(row) {
                Ok(progress) => Some(progress),
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "skipping unreadable progress row");
                    None
                }
            })
            .collect())
    }
}

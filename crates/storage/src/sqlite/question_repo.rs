use quiz_core::model::{QuestionId, RawQuestion, TopicId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{QuestionRepository, StorageError};

fn raw_from_row(row: &SqliteRow) -> Result<RawQuestion, StorageError> {
    Ok(RawQuestion {
        id: QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?),
        topic_id: TopicId::new(row.try_get::<String, _>("topic_id").map_err(ser)?),
        question: row.try_get("question").map_err(ser)?,
        options: row.try_get("options").map_err(ser)?,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_raw_question(&self, question: &RawQuestion) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (id, topic_id, question, options, correct_answer, explanation)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                topic_id = excluded.topic_id,
                question = excluded.question,
                options = excluded.options,
                correct_answer = excluded.correct_answer,
                explanation = excluded.explanation
            ",
        )
        .bind(question.id.as_str())
        .bind(question.topic_id.as_str())
        .bind(question.question.as_deref())
        .bind(question.options.as_deref())
        .bind(question.correct_answer.as_deref())
        .bind(question.explanation.as_deref())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn raw_questions(&self, topic_id: &TopicId) -> Result<Vec<RawQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic_id, question, options, correct_answer, explanation
            FROM questions
            WHERE topic_id = ?1
            ORDER BY rowid ASC
            ",
        )
        .bind(topic_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(raw_from_row).collect()
    }
}

use quiz_core::model::{Topic, TopicId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{StorageError, TopicRepository};

fn topic_from_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let description: Option<String> = row.try_get("description").map_err(ser)?;
    let image_url: Option<String> = row.try_get("image_url").map_err(ser)?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    Topic::new(TopicId::new(id), title, description, image_url, created_at).map_err(ser)
}

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topics (id, title, description, image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                image_url = excluded.image_url
            ",
        )
        .bind(topic.id().as_str())
        .bind(topic.title())
        .bind(topic.description())
        .bind(topic.image_url())
        .bind(topic.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, image_url, created_at
            FROM topics WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(topic_from_row).transpose()
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, image_url, created_at
            FROM topics
            ORDER BY created_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(topic_from_row).collect()
    }
}

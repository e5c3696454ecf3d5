use quiz_core::model::SettingEntry;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, user_id_from_text};
use crate::repository::{SettingsRepository, StorageError};

fn setting_from_row(row: &SqliteRow) -> Result<SettingEntry, StorageError> {
    let raw_value: String = row.try_get("value").map_err(ser)?;
    let updated_by = row
        .try_get::<Option<String>, _>("updated_by")
        .map_err(ser)?
        .as_deref()
        .map(user_id_from_text)
        .transpose()?;

    Ok(SettingEntry {
        key: row.try_get("key").map_err(ser)?,
        value: serde_json::from_str(&raw_value).map_err(ser)?,
        updated_by,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingEntry>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT key, value, updated_by, updated_at
            FROM settings WHERE key = ?1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(setting_from_row).transpose()
    }

    async fn put_setting(&self, entry: &SettingEntry) -> Result<(), StorageError> {
        let value = serde_json::to_string(&entry.value).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO settings (key, value, updated_by, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            ",
        )
        .bind(entry.key.as_str())
        .bind(value)
        .bind(entry.updated_by.map(|id| id.to_string()))
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

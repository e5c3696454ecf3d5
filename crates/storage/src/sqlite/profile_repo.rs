use quiz_core::model::{Profile, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, user_id_from_text};
use crate::repository::{ProfileRepository, StorageError};

fn profile_from_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let id = user_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let email: String = row.try_get("email").map_err(ser)?;
    let name: Option<String> = row.try_get("name").map_err(ser)?;
    let is_admin: bool = row.try_get("is_admin").map_err(ser)?;
    let has_access: bool = row.try_get("has_access").map_err(ser)?;
    let access_expires_at = row.try_get("access_expires_at").map_err(ser)?;

    Profile::from_persisted(id, &email, name, is_admin, has_access, access_expires_at).map_err(ser)
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (id, email, name, is_admin, has_access, access_expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                is_admin = excluded.is_admin,
                has_access = excluded.has_access,
                access_expires_at = excluded.access_expires_at
            ",
        )
        .bind(profile.id().to_string())
        .bind(profile.email())
        .bind(profile.name())
        .bind(profile.is_admin())
        .bind(profile.has_access_flag())
        .bind(profile.access_expires_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, is_admin, has_access, access_expires_at
            FROM profiles WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, is_admin, has_access, access_expires_at
            FROM profiles WHERE email = ?1
            ",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(profile_from_row).transpose()
    }
}

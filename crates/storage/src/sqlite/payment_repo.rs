use quiz_core::model::{Payment, PaymentStatus, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, ser, u64_from_i64, user_id_from_text};
use crate::repository::{PaymentRepository, StorageError};

fn payment_from_row(row: &SqliteRow) -> Result<Payment, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Payment {
        user_id: user_id_from_text(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        reference: row.try_get("reference").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        amount_minor: u64_from_i64("amount", row.try_get::<i64, _>("amount").map_err(ser)?)?,
        status: PaymentStatus::parse(&status),
        created_at: row.try_get("created_at").map_err(ser)?,
        expires_at: row.try_get("expires_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl PaymentRepository for SqliteRepository {
    async fn record_payment(&self, payment: &Payment) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO payments (user_id, reference, email, amount, status, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(payment.user_id.to_string())
        .bind(payment.reference.as_str())
        .bind(payment.email.as_str())
        .bind(i64_from_u64("amount", payment.amount_minor)?)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.expires_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_payments(&self, user_id: UserId) -> Result<Vec<Payment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, reference, email, amount, status, created_at, expires_at
            FROM payments
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(payment_from_row).collect()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A payment order against the external gateway.
///
/// `status` moves pending -> succeeded at most once (guarded update);
/// `ui_status` tracks whether the post-confirmation notification batch has
/// been dispatched ('shown' = owed, 'paid' = delivered), which is what the
/// sweeper polls.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub target_type: String,
    pub target_id: i64,
    pub gateway_payment_id: Option<String>,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub ui_status: String,
    pub created_at: String,
    pub paid_at: Option<String>,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        amount: i64,
        payment_method: &str,
        target_type: &str,
        target_id: i64,
        chat_id: Option<i64>,
        message_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (user_id, amount, currency, payment_method, status,
                                  target_type, target_id, chat_id, message_id, ui_status, created_at)
            VALUES (?, ?, 'RUB', ?, 'pending', ?, ?, ?, ?, 'shown', ?)
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(payment_method)
        .bind(target_type)
        .bind(target_id)
        .bind(chat_id)
        .bind(message_id)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

        Self::find_by_id(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        payment_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(payment_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_gateway_id(
        pool: &sqlx::SqlitePool,
        gateway_payment_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE gateway_payment_id = ?")
            .bind(gateway_payment_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_gateway_id(
        pool: &sqlx::SqlitePool,
        payment_id: i64,
        gateway_payment_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payments SET gateway_payment_id = ? WHERE id = ?")
            .bind(gateway_payment_id)
            .bind(payment_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Guarded pending -> succeeded. Zero rows affected means the event was
    /// already applied (duplicate webhook delivery): the caller acknowledges
    /// and performs no side effects.
    pub async fn mark_succeeded(
        pool: &sqlx::SqlitePool,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'succeeded', paid_at = ?
             WHERE id = ? AND status != 'succeeded'",
        )
        .bind(paid_at.to_rfc3339())
        .bind(payment_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_canceled(
        pool: &sqlx::SqlitePool,
        payment_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payments SET status = 'canceled' WHERE id = ? AND status = 'pending'")
            .bind(payment_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Succeeded payments whose notification batch is still owed.
    pub async fn succeeded_unnotified(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments
             WHERE status = 'succeeded' AND ui_status = 'shown'
               AND target_type IN ('slot', 'subscription')",
        )
        .fetch_all(pool)
        .await
    }

    /// Flips the UI flag after the notification batch went out. Not atomic
    /// with the sends: a crash in between duplicates at most one batch.
    pub async fn mark_ui_paid(pool: &sqlx::SqlitePool, payment_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payments SET ui_status = 'paid' WHERE id = ?")
            .bind(payment_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

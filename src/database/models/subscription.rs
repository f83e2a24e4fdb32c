use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A subscription purchase order. Confirmation is terminal: the credit
/// grant happens exactly once, inside `activate`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub count: i64,
    pub status: String,
    pub created_at: String,
}

impl Subscription {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (user_id, count, status, created_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(user_id)
        .bind(count)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

        Self::find_by_id(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        subscription_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, user_id, count, status, created_at FROM subscriptions WHERE id = ?",
        )
        .bind(subscription_id)
        .fetch_optional(pool)
        .await
    }

    /// Confirms the order and grants the credits as one transaction.
    ///
    /// The status flip is guarded on `status = 'pending'`, which is what
    /// makes a replay a no-op: zero rows affected means another task (a
    /// duplicate webhook, a racing admin) already applied it, and we
    /// return false without touching the balance.
    pub async fn activate(
        pool: &sqlx::SqlitePool,
        subscription_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE subscriptions SET status = 'confirmed' WHERE id = ? AND status = 'pending'",
        )
        .bind(subscription_id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let order = sqlx::query_as::<_, Subscription>(
            "SELECT id, user_id, count, status, created_at FROM subscriptions WHERE id = ?",
        )
        .bind(subscription_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET credits = credits + ? WHERE user_id = ?")
            .bind(order.count)
            .bind(order.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Guarded delete of a still-pending order (admin rejection).
    pub async fn delete_pending(
        pool: &sqlx::SqlitePool,
        subscription_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ? AND status = 'pending'")
            .bind(subscription_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

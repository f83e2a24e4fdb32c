use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A scheduled training session. Capacity is structural (configuration),
/// not stored per row; `full_announced` is the durable one-shot flag for
/// the "fully booked" announcement.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Training {
    pub id: i64,
    pub date: String,
    pub status: String,
    pub full_announced: bool,
}

impl Training {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        date: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query("INSERT INTO trainings (date, status) VALUES (?, 'open')")
            .bind(date.to_rfc3339())
            .execute(pool)
            .await?;

        Self::find_by_id(pool, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Training>(
            "SELECT id, date, status, full_announced FROM trainings WHERE id = ?",
        )
        .bind(training_id)
        .fetch_optional(pool)
        .await
    }

    /// Open trainings scheduled after `now`, soonest first.
    pub async fn list_open_upcoming(
        pool: &sqlx::SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Training>(
            "SELECT id, date, status, full_announced FROM trainings
             WHERE status = 'open' AND date > ?
             ORDER BY date ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(pool)
        .await
    }

    pub async fn find_on_day(
        pool: &sqlx::SqlitePool,
        day_prefix: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Training>(
            "SELECT id, date, status, full_announced FROM trainings
             WHERE date LIKE ? AND status != 'cancelled' LIMIT 1",
        )
        .bind(format!("{day_prefix}%"))
        .fetch_optional(pool)
        .await
    }

    /// Guarded cancellation; false means someone else already cancelled it.
    pub async fn cancel<'e, E>(executor: E, training_id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result =
            sqlx::query("UPDATE trainings SET status = 'cancelled' WHERE id = ? AND status = 'open'")
                .bind(training_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn confirmed_count(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM slots WHERE training_id = ? AND status = 'confirmed'",
        )
        .bind(training_id)
        .fetch_one(pool)
        .await
    }

    pub async fn confirmed_count_by_group(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        group: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM slots
             WHERE training_id = ? AND group_name = ? AND status = 'confirmed'",
        )
        .bind(training_id)
        .bind(group)
        .fetch_one(pool)
        .await
    }

    /// One-shot flag for the fully-booked announcement; false when another
    /// sweep already claimed it.
    pub async fn mark_full_announced(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE trainings SET full_announced = 1 WHERE id = ? AND full_announced = 0",
        )
        .bind(training_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

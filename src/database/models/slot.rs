use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One reserved channel in one group of one training.
///
/// Status machine: pending -> confirmed -> (pending_cancel -> confirmed | deleted),
/// every transition a guarded update so the first writer wins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub training_id: i64,
    pub user_id: i64,
    pub group_name: String,
    pub channel: String,
    pub payment_method: String,
    pub status: String,
    pub refund_due: bool,
    pub created_at: String,
}

/// Slot joined with its training date and owner profile, for listings
/// and admin prompts.
#[derive(Debug, Clone, FromRow)]
pub struct SlotDetails {
    pub id: i64,
    pub training_id: i64,
    pub user_id: i64,
    pub group_name: String,
    pub channel: String,
    pub payment_method: String,
    pub status: String,
    pub refund_due: bool,
    pub date: String,
    pub nickname: String,
    pub video_system: String,
    pub credits: i64,
}

impl Slot {
    /// Atomic check-then-insert: the uniqueness checks and the insert are a
    /// single SQL statement, so two interleaved reservations cannot both
    /// pass the checks. Returns the new slot id, or None when a guard
    /// failed (caller diagnoses which one).
    pub async fn reserve(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        user_id: i64,
        group: &str,
        channel: &str,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO slots (training_id, user_id, group_name, channel, payment_method, status, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, 'pending', ?6
            WHERE NOT EXISTS (
                SELECT 1 FROM slots
                WHERE training_id = ?1 AND group_name = ?3 AND channel = ?4
                  AND status IN ('pending', 'confirmed')
            )
            AND NOT EXISTS (
                SELECT 1 FROM slots WHERE training_id = ?1 AND user_id = ?2
            )
            "#,
        )
        .bind(training_id)
        .bind(user_id)
        .bind(group)
        .bind(channel)
        .bind(payment_method)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        slot_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Slot>(
            "SELECT id, training_id, user_id, group_name, channel, payment_method, status, refund_due, created_at
             FROM slots WHERE id = ?",
        )
        .bind(slot_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn user_has_slot(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM slots WHERE training_id = ? AND user_id = ?",
        )
        .bind(training_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Channels held by a pending or confirmed slot in the given group.
    pub async fn taken_channels(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        group: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT channel FROM slots
             WHERE training_id = ? AND group_name = ? AND status IN ('pending', 'confirmed')",
        )
        .bind(training_id)
        .bind(group)
        .fetch_all(pool)
        .await
    }

    /// Guarded pending -> confirmed.
    pub async fn confirm<'e, E>(executor: E, slot_id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result =
            sqlx::query("UPDATE slots SET status = 'confirmed' WHERE id = ? AND status = 'pending'")
                .bind(slot_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Guarded confirmed -> pending_cancel, capturing whether the refund
    /// window was still open at request time.
    pub async fn request_cancel(
        pool: &sqlx::SqlitePool,
        slot_id: i64,
        refund_due: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE slots SET status = 'pending_cancel', refund_due = ?
             WHERE id = ? AND status = 'confirmed'",
        )
        .bind(refund_due)
        .bind(slot_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a pending_cancel slot and returns the removed row, so the
    /// refund decision is made on the row's final state rather than an
    /// earlier read.
    pub async fn take_pending_cancel<'e, E>(
        executor: E,
        slot_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Slot>(
            r#"
            DELETE FROM slots WHERE id = ? AND status = 'pending_cancel'
            RETURNING id, training_id, user_id, group_name, channel, payment_method, status, refund_due, created_at
            "#,
        )
        .bind(slot_id)
        .fetch_optional(executor)
        .await
    }

    /// Guarded pending_cancel -> confirmed (admin declined the cancellation).
    pub async fn restore_confirmed(
        pool: &sqlx::SqlitePool,
        slot_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE slots SET status = 'confirmed', refund_due = 0
             WHERE id = ? AND status = 'pending_cancel'",
        )
        .bind(slot_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes the still-unconfirmed slots of a training, used when the
    /// whole training is cancelled.
    pub async fn delete_pending_for_training<'e, E>(
        executor: E,
        training_id: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM slots WHERE training_id = ? AND status = 'pending'")
            .bind(training_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Guarded delete, only from the expected state.
    pub async fn delete_in_status<'e, E>(
        executor: E,
        slot_id: i64,
        expected_status: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM slots WHERE id = ? AND status = ?")
            .bind(slot_id)
            .bind(expected_status)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn details(
        pool: &sqlx::SqlitePool,
        slot_id: i64,
    ) -> Result<Option<SlotDetails>, sqlx::Error> {
        sqlx::query_as::<_, SlotDetails>(
            r#"
            SELECT s.id, s.training_id, s.user_id, s.group_name, s.channel,
                   s.payment_method, s.status, s.refund_due,
                   t.date, u.nickname, u.video_system, u.credits
            FROM slots s
            JOIN trainings t ON s.training_id = t.id
            JOIN users u ON s.user_id = u.user_id
            WHERE s.id = ?
            "#,
        )
        .bind(slot_id)
        .fetch_optional(pool)
        .await
    }

    /// Pending slots that never got an admin prompt (lost notification).
    pub async fn pending_without_prompt(
        pool: &sqlx::SqlitePool,
    ) -> Result<Vec<SlotDetails>, sqlx::Error> {
        sqlx::query_as::<_, SlotDetails>(
            r#"
            SELECT s.id, s.training_id, s.user_id, s.group_name, s.channel,
                   s.payment_method, s.status, s.refund_due,
                   t.date, u.nickname, u.video_system, u.credits
            FROM slots s
            JOIN trainings t ON s.training_id = t.id
            JOIN users u ON s.user_id = u.user_id
            WHERE s.status = 'pending'
              AND NOT EXISTS (
                SELECT 1 FROM admin_prompts n
                WHERE n.entity_type = 'slot' AND n.entity_id = s.id
              )
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn for_user(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<Vec<SlotDetails>, sqlx::Error> {
        sqlx::query_as::<_, SlotDetails>(
            r#"
            SELECT s.id, s.training_id, s.user_id, s.group_name, s.channel,
                   s.payment_method, s.status, s.refund_due,
                   t.date, u.nickname, u.video_system, u.credits
            FROM slots s
            JOIN trainings t ON s.training_id = t.id
            JOIN users u ON s.user_id = u.user_id
            WHERE s.user_id = ? AND t.status != 'cancelled'
            ORDER BY t.date ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn for_training(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Slot>(
            "SELECT id, training_id, user_id, group_name, channel, payment_method, status, refund_due, created_at
             FROM slots WHERE training_id = ?",
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }

    /// Confirmed pilots with their channels, for the timing-system export.
    pub async fn confirmed_participants(
        pool: &sqlx::SqlitePool,
        training_id: i64,
    ) -> Result<Vec<SlotDetails>, sqlx::Error> {
        sqlx::query_as::<_, SlotDetails>(
            r#"
            SELECT s.id, s.training_id, s.user_id, s.group_name, s.channel,
                   s.payment_method, s.status, s.refund_due,
                   t.date, u.nickname, u.video_system, u.credits
            FROM slots s
            JOIN trainings t ON s.training_id = t.id
            JOIN users u ON s.user_id = u.user_id
            WHERE s.training_id = ? AND s.status = 'confirmed'
            ORDER BY s.group_name, s.channel
            "#,
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }

    /// Direct insert of an already-confirmed slot (admin auto-booking on
    /// training creation).
    pub async fn insert_confirmed(
        pool: &sqlx::SqlitePool,
        training_id: i64,
        user_id: i64,
        group: &str,
        channel: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO slots (training_id, user_id, group_name, channel, payment_method, status, created_at)
            VALUES (?, ?, ?, ?, 'admin', 'confirmed', ?)
            "#,
        )
        .bind(training_id)
        .bind(user_id)
        .bind(group)
        .bind(channel)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One approval prompt delivered to one admin for one entity. Kept so the
/// duplicates can be retracted after the first admin acts, and so the
/// sweeper can tell which pending entities never got a prompt at all.
#[derive(Debug, Clone, FromRow)]
pub struct AdminPrompt {
    pub entity_type: String,
    pub entity_id: i64,
    pub admin_id: i64,
    pub message_id: i64,
}

impl AdminPrompt {
    pub async fn record(
        pool: &sqlx::SqlitePool,
        entity_type: &str,
        entity_id: i64,
        admin_id: i64,
        message_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO admin_prompts (entity_type, entity_id, admin_id, message_id) VALUES (?, ?, ?, ?)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(admin_id)
        .bind(message_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn for_entity(
        pool: &sqlx::SqlitePool,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AdminPrompt>(
            "SELECT entity_type, entity_id, admin_id, message_id FROM admin_prompts
             WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_for_entity(
        pool: &sqlx::SqlitePool,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM admin_prompts WHERE entity_type = ? AND entity_id = ?")
            .bind(entity_type)
            .bind(entity_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Durable per-key one-shot flags for announcements.
pub struct AnnouncementLog;

impl AnnouncementLog {
    /// Claims the (kind, key) flag; true only for the first caller.
    pub async fn claim(
        pool: &sqlx::SqlitePool,
        kind: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO announcement_log (kind, key, sent_at) VALUES (?, ?, ?)",
        )
        .bind(kind)
        .bind(key)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

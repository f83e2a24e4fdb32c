use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered club member. `credits` is the subscription balance;
/// it is only ever decremented through the guarded `spend_credit`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub nickname: String,
    pub video_system: String,
    pub credits: i64,
}

impl User {
    pub async fn upsert(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        nickname: &str,
        video_system: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, nickname, video_system, credits)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(user_id) DO UPDATE SET nickname = excluded.nickname,
                                               video_system = excluded.video_system
            "#,
        )
        .bind(user_id)
        .bind(nickname)
        .bind(video_system)
        .execute(pool)
        .await?;

        Self::find(pool, user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find(pool: &sqlx::SqlitePool, user_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, nickname, video_system, credits FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, nickname, video_system, credits FROM users ORDER BY user_id",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list_with_credits(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, nickname, video_system, credits FROM users
             WHERE credits > 0 ORDER BY credits DESC, user_id",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn credits(pool: &sqlx::SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
        let credits = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE((SELECT credits FROM users WHERE user_id = ?), 0)",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(credits)
    }

    pub async fn add_credits(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        count: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET credits = credits + ? WHERE user_id = ?")
            .bind(count)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Guarded single-credit decrement; returns false when the balance is
    /// already empty instead of going negative.
    pub async fn spend_credit<'e, E>(executor: E, user_id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result =
            sqlx::query("UPDATE users SET credits = credits - 1 WHERE user_id = ? AND credits > 0")
                .bind(user_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn refund_credit<'e, E>(executor: E, user_id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("UPDATE users SET credits = credits + 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

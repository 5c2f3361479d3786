//! Repository for the `user_presence` table.

use agora_core::types::{DbId, Timestamp};
use sqlx::SqlitePool;

use crate::models::presence::PresenceRecord;

pub struct PresenceRepo;

impl PresenceRepo {
    /// Insert or update the presence row of a user. Last write wins.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: DbId,
        is_online: bool,
        last_seen: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_presence (user_id, is_online, last_seen)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET
                 is_online = excluded.is_online,
                 last_seen = excluded.last_seen",
        )
        .bind(user_id)
        .bind(is_online)
        .bind(last_seen)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &SqlitePool, user_id: DbId) -> Result<Option<PresenceRecord>, sqlx::Error> {
        sqlx::query_as::<_, PresenceRecord>(
            "SELECT user_id, is_online, last_seen FROM user_presence WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// All users whose durable presence says online, most recently seen first.
    pub async fn list_online(pool: &SqlitePool) -> Result<Vec<PresenceRecord>, sqlx::Error> {
        sqlx::query_as::<_, PresenceRecord>(
            "SELECT user_id, is_online, last_seen FROM user_presence
             WHERE is_online = TRUE
             ORDER BY last_seen DESC",
        )
        .fetch_all(pool)
        .await
    }
}

//! Repository for the `sessions` table.

use agora_core::types::{DbId, Timestamp};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::session::{CreateSession, Session, SweepOutcome};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "token, user_id, credential_hash, expires_at, created_at";

/// Session persistence. Timestamps are always bound from Rust so the stored
/// RFC 3339 strings compare correctly as text.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session after deleting every existing session of the same
    /// user, in one transaction. Returns the created row.
    pub async fn replace_for_user(pool: &SqlitePool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(input.user_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO sessions (token, user_id, credential_hash, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COLUMNS}"
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(&input.token)
            .bind(input.user_id)
            .bind(&input.credential_hash)
            .bind(input.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    /// Find a session by its opaque token, expired or not.
    pub async fn find_by_token(
        pool: &SqlitePool,
        token: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE token = ?1");
        sqlx::query_as::<_, Session>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// Find the session that issued a credential, by the credential's digest.
    pub async fn find_by_credential_hash(
        pool: &SqlitePool,
        hash: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE credential_hash = ?1");
        sqlx::query_as::<_, Session>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete a single session. Returns `true` if a row was removed.
    pub async fn delete(pool: &SqlitePool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session of a user. Returns the count of deleted rows.
    pub async fn delete_all_for_user(pool: &SqlitePool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions whose expiry lies before `now`. Returns the count of deleted rows.
    pub async fn delete_expired<'e, E>(executor: E, now: Timestamp) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(now)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Users currently marked online that own no session still valid at `now`.
    ///
    /// Users that are already offline are left out so a sweep never re-announces
    /// them.
    pub async fn list_users_with_no_active_session<'e, E>(
        executor: E,
        now: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, DbId>(
            "SELECT p.user_id FROM user_presence p
             WHERE p.is_online = TRUE
               AND NOT EXISTS (
                   SELECT 1 FROM sessions s
                   WHERE s.user_id = p.user_id AND s.expires_at >= ?1
               )
             ORDER BY p.user_id",
        )
        .bind(now)
        .fetch_all(executor)
        .await
    }

    /// Identify users left without an active session and delete expired rows,
    /// both inside one transaction so a session renewed in between cannot be
    /// misread.
    pub async fn sweep_expired(pool: &SqlitePool, now: Timestamp) -> Result<SweepOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let offline_user_ids = Self::list_users_with_no_active_session(&mut *tx, now).await?;
        let deleted_sessions = Self::delete_expired(&mut *tx, now).await?;
        tx.commit().await?;

        Ok(SweepOutcome {
            offline_user_ids,
            deleted_sessions,
        })
    }
}

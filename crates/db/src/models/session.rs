//! Authentication session model and DTOs.

use agora_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    /// Opaque session token, also handed to the client as a cookie.
    pub token: String,
    pub user_id: DbId,
    /// SHA-256 hex digest of the signed credential issued with this session.
    pub credential_hash: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl Session {
    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// DTO for creating a new session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub token: String,
    pub user_id: DbId,
    pub credential_hash: String,
    pub expires_at: Timestamp,
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Users marked online that no longer own a non-expired session.
    pub offline_user_ids: Vec<DbId>,
    /// Number of expired session rows deleted.
    pub deleted_sessions: u64,
}

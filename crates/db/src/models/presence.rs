//! Durable online/offline presence.

use agora_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_presence` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct PresenceRecord {
    pub user_id: DbId,
    pub is_online: bool,
    pub last_seen: Timestamp,
}

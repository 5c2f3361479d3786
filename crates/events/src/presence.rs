use agora_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, EventKind};

/// Payload of the `user_online` / `user_offline` events.
///
/// Field names are camelCase because the browser client reads
/// `payload.userId` and `payload.isOnline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChanged {
    pub user_id: DbId,
    pub is_online: bool,
}

impl PresenceChanged {
    pub fn online(user_id: DbId) -> Self {
        Self {
            user_id,
            is_online: true,
        }
    }

    pub fn offline(user_id: DbId) -> Self {
        Self {
            user_id,
            is_online: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        if self.is_online {
            EventKind::UserOnline
        } else {
            EventKind::UserOffline
        }
    }
}

impl From<PresenceChanged> for Envelope {
    fn from(change: PresenceChanged) -> Self {
        Envelope::new(
            change.kind(),
            serde_json::json!({
                "userId": change.user_id,
                "isOnline": change.is_online,
            }),
        )
    }
}

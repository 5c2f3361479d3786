use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Known `type` tags of outbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserOnline,
    UserOffline,
    NewMessage,
    NewNotification,
    PostReaction,
    TypingStatus,
    UnreadCountUpdate,
    MessageListMarkAsRead,
    NewPost,
    NewUser,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserOnline => "user_online",
            Self::UserOffline => "user_offline",
            Self::NewMessage => "new_message",
            Self::NewNotification => "new_notification",
            Self::PostReaction => "post_reaction",
            Self::TypingStatus => "typing_status",
            Self::UnreadCountUpdate => "unread_count_update",
            Self::MessageListMarkAsRead => "message_list_mark_as_read",
            Self::NewPost => "new_post",
            Self::NewUser => "new_user",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `{"type", "payload"}` envelope carried by every dispatched event.
///
/// The payload is opaque here; schema validation is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Build an envelope from any serializable payload.
    pub fn from_payload<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "type": self.kind.as_str(),
            "payload": &self.payload,
        })
        .to_string()
    }
}

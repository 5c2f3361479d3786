//! Classification of inbound text frames.

use agora_core::types::DbId;
use agora_events::{Envelope, EventKind};
use serde_json::{Map, Value};

/// `type` of the application-level heartbeat frame.
pub const PING_TYPE: &str = "ping";

/// A well-formed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `{"type":"ping"}`.
    Heartbeat,
    /// A typing indicator addressed to one user.
    Typing(TypingFrame),
    /// Valid JSON with a `type` nothing here handles.
    Unrecognized { kind: String },
}

/// Why a frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON")]
    NotJson,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("typing frame has no integer `recipient_id`")]
    MissingRecipient,
    #[error("binary frames are not accepted")]
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypingFrame {
    pub recipient_id: DbId,
    payload: Map<String, Value>,
}

impl TypingFrame {
    /// Outbound `typing_status` event with the sender stamped in.
    pub fn into_envelope(self, sender_id: DbId) -> Envelope {
        let mut payload = self.payload;
        payload.insert("sender_id".into(), Value::from(sender_id));
        Envelope::new(EventKind::TypingStatus, Value::Object(payload))
    }
}

pub fn classify(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::NotJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?;

    if kind == PING_TYPE {
        return Ok(InboundFrame::Heartbeat);
    }
    if kind == EventKind::TypingStatus.as_str() {
        return typing_frame(&value).map(InboundFrame::Typing);
    }

    Ok(InboundFrame::Unrecognized {
        kind: kind.to_string(),
    })
}

/// The recipient may sit at the top level or inside `payload`.
fn typing_frame(value: &Value) -> Result<TypingFrame, FrameError> {
    let payload = match value.get("payload") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let recipient_id = value
        .get("recipient_id")
        .or_else(|| payload.get("recipient_id"))
        .and_then(Value::as_i64)
        .ok_or(FrameError::MissingRecipient)?;

    Ok(TypingFrame {
        recipient_id,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_a_heartbeat() {
        assert_eq!(classify(r#"{"type":"ping"}"#), Ok(InboundFrame::Heartbeat));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(classify("hello"), Err(FrameError::NotJson));
        assert_eq!(classify(r#"{"payload":{}}"#), Err(FrameError::MissingType));
        assert_eq!(classify(r#"{"type":7}"#), Err(FrameError::MissingType));
        assert_eq!(classify(r#"[1,2]"#), Err(FrameError::MissingType));
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        assert_eq!(
            classify(r#"{"type":"new_post","payload":{"id":1}}"#),
            Ok(InboundFrame::Unrecognized {
                kind: "new_post".into()
            })
        );
    }

    #[test]
    fn typing_recipient_at_top_level() {
        let frame = classify(r#"{"type":"typing_status","recipient_id":5,"payload":{"is_typing":true}}"#);
        let Ok(InboundFrame::Typing(typing)) = frame else {
            panic!("expected typing frame, got {frame:?}");
        };
        assert_eq!(typing.recipient_id, 5);

        let envelope = typing.into_envelope(9);
        assert_eq!(envelope.kind, EventKind::TypingStatus);
        assert_eq!(envelope.payload["sender_id"], 9);
        assert_eq!(envelope.payload["is_typing"], true);
    }

    #[test]
    fn typing_recipient_inside_payload() {
        let frame = classify(r#"{"type":"typing_status","payload":{"recipient_id":3,"is_typing":false}}"#);
        let Ok(InboundFrame::Typing(typing)) = frame else {
            panic!("expected typing frame, got {frame:?}");
        };
        assert_eq!(typing.recipient_id, 3);
    }

    #[test]
    fn typing_without_recipient_is_rejected() {
        assert_eq!(
            classify(r#"{"type":"typing_status","payload":{"is_typing":true}}"#),
            Err(FrameError::MissingRecipient)
        );
    }
}

use std::sync::Arc;

use agora_core::types::DbId;
use agora_events::Envelope;
use axum::extract::ws::Message;

use crate::ws::registry::ConnectionRegistry;

/// Routes outbound payloads to live connections.
///
/// Delivery is best effort: a user with no connection simply misses the
/// event, and durable state remains the source of truth.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send to every connection of one user. Returns the delivery count.
    pub async fn send_to_user(&self, user_id: DbId, message: Message) -> usize {
        let delivered = self.registry.deliver(Some(user_id), &message).await;
        if delivered == 0 {
            tracing::debug!(user_id, "No live connection for user, event dropped");
        }
        delivered
    }

    /// Send to every live connection. Returns the delivery count.
    pub async fn broadcast(&self, message: Message) -> usize {
        self.registry.deliver(None, &message).await
    }

    pub async fn send_event(&self, user_id: DbId, envelope: &Envelope) -> usize {
        tracing::trace!(user_id, kind = %envelope.kind, "Sending event");
        self.send_to_user(user_id, Message::Text(envelope.to_json().into()))
            .await
    }

    pub async fn broadcast_event(&self, envelope: &Envelope) -> usize {
        let delivered = self
            .broadcast(Message::Text(envelope.to_json().into()))
            .await;
        tracing::trace!(kind = %envelope.kind, delivered, "Broadcast event");
        delivered
    }
}

//! Durable online/offline presence and its change events.

use std::sync::Arc;

use agora_core::types::{DbId, Timestamp};
use agora_db::repositories::PresenceRepo;
use agora_db::DbPool;
use agora_events::{Envelope, PresenceChanged};
use async_trait::async_trait;
use chrono::Utc;

use crate::ws::dispatcher::EventDispatcher;

/// Where presence records are written.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn set_presence(
        &self,
        user_id: DbId,
        is_online: bool,
        at: Timestamp,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl PresenceStore for DbPool {
    async fn set_presence(
        &self,
        user_id: DbId,
        is_online: bool,
        at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        PresenceRepo::upsert(self, user_id, is_online, at).await
    }
}

/// Records presence transitions and announces them to every live connection.
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
    dispatcher: EventDispatcher,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn PresenceStore>, dispatcher: EventDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn mark_online(&self, user_id: DbId) -> Result<(), sqlx::Error> {
        self.record(PresenceChanged::online(user_id)).await
    }

    pub async fn mark_offline(&self, user_id: DbId) -> Result<(), sqlx::Error> {
        self.record(PresenceChanged::offline(user_id)).await
    }

    /// Persist first; the event goes out only if the write succeeded.
    async fn record(&self, change: PresenceChanged) -> Result<(), sqlx::Error> {
        if let Err(e) = self
            .store
            .set_presence(change.user_id, change.is_online, Utc::now())
            .await
        {
            tracing::error!(
                user_id = change.user_id,
                is_online = change.is_online,
                error = %e,
                "Failed to record presence"
            );
            return Err(e);
        }

        let delivered = self.dispatcher.broadcast_event(&Envelope::from(change)).await;
        tracing::debug!(
            user_id = change.user_id,
            is_online = change.is_online,
            delivered,
            "Presence changed"
        );
        Ok(())
    }
}

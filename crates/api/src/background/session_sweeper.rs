//! Periodic removal of expired sessions and the matching presence cleanup.
//!
//! Sweeps immediately on start, then on a fixed interval using
//! `tokio::time::interval`, until the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use agora_db::models::session::SweepOutcome;
use agora_db::repositories::SessionRepo;
use agora_db::DbPool;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::presence::PresenceTracker;
use crate::ws::ConnectionRegistry;

pub struct SessionSweeper {
    pool: DbPool,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceTracker>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(
        pool: DbPool,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceTracker>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            registry,
            presence,
            interval,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Session sweeper started");

        // The first tick completes immediately.
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Session sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Session sweep failed, retrying next tick");
                    }
                }
            }
        }
    }

    /// One pass: delete expired sessions and take their owners offline.
    ///
    /// A user who still holds live connections is disconnected; their
    /// lifecycle cleanup records the offline transition. Everyone else is
    /// marked offline here. Either way each user goes offline once.
    pub async fn sweep_once(&self) -> Result<SweepOutcome, sqlx::Error> {
        let outcome = SessionRepo::sweep_expired(&self.pool, Utc::now()).await?;

        for &user_id in &outcome.offline_user_ids {
            if self.registry.disconnect_user(user_id).await > 0 {
                continue;
            }
            // Already logged by the tracker; the remaining users still get swept.
            let _ = self.presence.mark_offline(user_id).await;
        }

        if outcome.deleted_sessions > 0 || !outcome.offline_user_ids.is_empty() {
            tracing::info!(
                deleted_sessions = outcome.deleted_sessions,
                offline_users = outcome.offline_user_ids.len(),
                "Session sweep: expired sessions purged"
            );
        } else {
            tracing::debug!("Session sweep: nothing to purge");
        }

        Ok(outcome)
    }
}

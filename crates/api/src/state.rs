use std::sync::Arc;

use agora_db::DbPool;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::auth::session::SessionStore;
use crate::config::ServerConfig;
use crate::presence::{PresenceStore, PresenceTracker};
use crate::ws::{ConnectionLifecycle, ConnectionRegistry, EventDispatcher};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind `Arc` or is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    pub config: Arc<ServerConfig>,
    pub sessions: SessionStore,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: EventDispatcher,
    pub presence: Arc<PresenceTracker>,
    pub lifecycle: ConnectionLifecycle,
    /// Every upgraded connection task, awaited during shutdown.
    pub connection_tasks: TaskTracker,
    /// Process-wide shutdown signal; connection close signals are its children.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the real-time components with presence stored in `pool`.
    pub fn new(pool: DbPool, config: ServerConfig) -> Self {
        let store: Arc<dyn PresenceStore> = Arc::new(pool.clone());
        Self::with_presence_store(pool, config, store)
    }

    pub fn with_presence_store(
        pool: DbPool,
        config: ServerConfig,
        store: Arc<dyn PresenceStore>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let presence = Arc::new(PresenceTracker::new(store, dispatcher.clone()));
        let lifecycle = ConnectionLifecycle::new(
            Arc::clone(&registry),
            dispatcher.clone(),
            Arc::clone(&presence),
            config.realtime.clone(),
            shutdown.clone(),
        );
        let sessions = SessionStore::new(pool.clone(), config.credentials.clone());

        Self {
            pool,
            config: Arc::new(config),
            sessions,
            registry,
            dispatcher,
            presence,
            lifecycle,
            connection_tasks: TaskTracker::new(),
            shutdown,
        }
    }
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_api::auth::credential::CredentialConfig;
use agora_api::auth::password::hash_password;
use agora_api::config::{RealtimeConfig, ServerConfig};
use agora_api::presence::PresenceStore;
use agora_api::routes;
use agora_api::state::AppState;
use agora_core::types::{DbId, Timestamp};
use agora_db::models::user::CreateUser;
use agora_db::repositories::{PresenceRepo, UserRepo};
use agora_db::DbPool;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        credentials: CredentialConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            session_ttl_hours: 24,
        },
        realtime: RealtimeConfig::default(),
    }
}

/// Fresh in-memory database with the schema applied.
pub async fn test_pool() -> DbPool {
    let pool = agora_db::create_pool("sqlite::memory:")
        .await
        .expect("in-memory pool should open");
    agora_db::run_migrations(&pool)
        .await
        .expect("migrations should apply");
    pool
}

/// Create a user with [`TEST_PASSWORD`] and return its id.
pub async fn create_user(pool: &DbPool, nickname: &str) -> DbId {
    let input = CreateUser {
        nickname: nickname.to_string(),
        email: format!("{nickname}@forum.test"),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
        .id
}

/// Build the full application router with the same middleware stack as
/// `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Presence recording
// ---------------------------------------------------------------------------

/// Presence store that remembers every write, optionally forwarding to a
/// real database.
#[derive(Default)]
pub struct RecordingPresence {
    calls: Mutex<Vec<(DbId, bool)>>,
    pool: Option<DbPool>,
}

impl RecordingPresence {
    pub fn backed_by(pool: DbPool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            pool: Some(pool),
        }
    }

    pub fn calls(&self) -> Vec<(DbId, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn offline_count(&self, user_id: DbId) -> usize {
        self.calls()
            .iter()
            .filter(|&&(id, online)| id == user_id && !online)
            .count()
    }

    pub fn online_count(&self, user_id: DbId) -> usize {
        self.calls()
            .iter()
            .filter(|&&(id, online)| id == user_id && online)
            .count()
    }

    /// Latest recorded state of a user, if any.
    pub fn last_state(&self, user_id: DbId) -> Option<bool> {
        self.calls()
            .iter()
            .rev()
            .find(|(id, _)| *id == user_id)
            .map(|&(_, online)| online)
    }
}

#[async_trait]
impl PresenceStore for RecordingPresence {
    async fn set_presence(
        &self,
        user_id: DbId,
        is_online: bool,
        at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        self.calls.lock().unwrap().push((user_id, is_online));
        if let Some(pool) = &self.pool {
            PresenceRepo::upsert(pool, user_id, is_online, at).await?;
        }
        Ok(())
    }
}

/// App state whose presence writes go through a [`RecordingPresence`].
pub fn recording_state(pool: DbPool, config: ServerConfig) -> (AppState, Arc<RecordingPresence>) {
    let recorder = Arc::new(RecordingPresence::backed_by(pool.clone()));
    let state = AppState::with_presence_store(pool, config, recorder.clone());
    (state, recorder)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_auth(app: Router, uri: &str, credential: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {credential}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_with_header(app: Router, uri: &str, name: &str, value: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

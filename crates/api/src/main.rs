use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agora_api::background::session_sweeper::SessionSweeper;
use agora_api::config::ServerConfig;
use agora_api::routes;
use agora_api::state::AppState;

const DEFAULT_DATABASE_URL: &str = "sqlite://forum.db?mode=rwc";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        heartbeat_timeout_secs = config.realtime.heartbeat_timeout_secs,
        relay_unrecognized_frames = config.realtime.relay_unrecognized_frames,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());

    let pool = agora_db::create_pool(&database_url)
        .await
        .expect("Failed to open database");
    tracing::info!("Database connection pool created");

    agora_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    agora_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- App state (registry, dispatcher, presence, sessions) ---
    let state = AppState::new(pool.clone(), config.clone());

    // --- Session sweeper ---
    let sweeper_cancel = state.shutdown.child_token();
    let sweeper = SessionSweeper::new(
        pool.clone(),
        Arc::clone(&state.registry),
        Arc::clone(&state.presence),
        config.realtime.sweep_interval(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(sweeper_cancel.clone()));

    let registry = Arc::clone(&state.registry);
    let connection_tasks = state.connection_tasks.clone();
    let shutdown = state.shutdown.clone();

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Upgraded sockets are detached from the HTTP connection, so they are
    // closed explicitly below rather than by axum's graceful shutdown.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain_timeout = config.shutdown_timeout();

    sweeper_cancel.cancel();
    if tokio::time::timeout(drain_timeout, sweeper_handle).await.is_err() {
        tracing::warn!("Session sweeper did not stop in time");
    }
    tracing::info!("Session sweeper stopped");

    let live = registry.connection_count().await;
    tracing::info!(live, "Closing remaining live connections");
    shutdown.cancel();
    registry.shutdown_all().await;

    connection_tasks.close();
    if tokio::time::timeout(drain_timeout, connection_tasks.wait()).await.is_err() {
        tracing::warn!(
            remaining = connection_tasks.len(),
            "Connection tasks did not finish in time"
        );
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

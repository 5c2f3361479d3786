pub mod auth;
pub mod health;
pub mod presence;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                  live connection upgrade (requires auth)
///
/// /auth/register       register (public)
/// /auth/login          login (public)
/// /auth/logout         logout (requires auth)
///
/// /presence/online     users marked online (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/presence", presence::router())
}

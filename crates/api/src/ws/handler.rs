use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use futures::StreamExt;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/ws
///
/// Authentication happens before the upgrade, so an unauthenticated client
/// gets a 401 JSON error instead of a socket. After the upgrade the
/// connection is served by [`ConnectionLifecycle`](crate::ws::lifecycle::ConnectionLifecycle)
/// inside a task tracked for graceful shutdown.
pub async fn ws_handler(
    auth: AuthUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let lifecycle = state.lifecycle.clone();
    let tasks = state.connection_tasks.clone();

    ws.on_upgrade(move |socket| {
        tasks.track_future(async move {
            let (sink, stream) = socket.split();
            lifecycle.run(sink, stream, auth.user_id).await;
        })
    })
}

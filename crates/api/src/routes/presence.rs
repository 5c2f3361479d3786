use axum::routing::get;
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Routes mounted at `/presence`.
pub fn router() -> Router<AppState> {
    Router::new().route("/online", get(presence::list_online))
}

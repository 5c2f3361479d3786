//! Handlers for the `/presence` resource.

use agora_db::models::presence::PresenceRecord;
use agora_db::repositories::PresenceRepo;
use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/presence/online
///
/// Users whose durable presence record says online, most recently seen first.
pub async fn list_online(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<PresenceRecord>>>> {
    let users = PresenceRepo::list_online(&state.pool).await?;
    Ok(Json(DataResponse { data: users }))
}

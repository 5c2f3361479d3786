//! Handlers for the `/auth` resource (register, login, logout).

use agora_core::error::CoreError;
use agora_core::types::{DbId, Timestamp};
use agora_db::models::user::{CreateUser, User};
use agora_db::repositories::UserRepo;
use agora_events::{Envelope, EventKind};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{clear_session_cookie, session_cookie, IssuedSession};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "Nickname must be 3 to 32 characters"))]
    pub nickname: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Request body for `POST /auth/login`. `identifier` is a nickname or an email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Successful authentication response returned by register and login.
///
/// The session token itself travels only in the `session_token` cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub credential: String,
    pub expires_at: Timestamp,
    pub user: UserInfo,
}

/// Public user info embedded in [`AuthResponse`].
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub nickname: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account and log it in. Announces `new_user` to live clients.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            nickname: input.nickname.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            password_hash,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, "User registered");

    let announcement = serde_json::json!({ "id": user.id, "nickname": user.nickname });
    state
        .dispatcher
        .broadcast_event(&Envelope::new(EventKind::NewUser, announcement))
        .await;

    let (headers, body) = start_session(&state, &user).await?;
    Ok((StatusCode::CREATED, headers, Json(body)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with nickname or email + password. Any previous session of
/// the user stops being valid and its live connections are closed.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid credentials".into()));

    let user = UserRepo::find_by_login(&state.pool, input.identifier.trim())
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    let (headers, body) = start_session(&state, &user).await?;
    Ok((headers, Json(body)))
}

/// POST /api/v1/auth/logout
///
/// Delete the user's session, clear the cookie, and close their live
/// connections. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<(StatusCode, HeaderMap)> {
    state
        .sessions
        .delete_all_sessions_for_user(auth_user.user_id)
        .await?;
    state.registry.disconnect_user(auth_user.user_id).await;
    tracing::info!(user_id = auth_user.user_id, "User logged out");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, headers))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Issue a session for `user` and build the cookie header plus response body.
async fn start_session(state: &AppState, user: &User) -> AppResult<(HeaderMap, AuthResponse)> {
    let IssuedSession {
        token,
        credential,
        expires_at,
        ..
    } = state.sessions.create_session(user.id).await?;

    // Connections opened under the replaced session must not outlive it.
    state.registry.disconnect_user(user.id).await;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie(&token, state.sessions.ttl())?);

    Ok((
        headers,
        AuthResponse {
            credential,
            expires_at,
            user: UserInfo {
                id: user.id,
                nickname: user.nickname.clone(),
                email: user.email.clone(),
            },
        },
    ))
}

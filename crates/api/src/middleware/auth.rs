//! Authentication extractor for Axum handlers.

use agora_core::error::CoreError;
use agora_core::types::DbId;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::auth::session::session_token_from_cookies;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user resolved from the request.
///
/// Sources are tried in order:
///
/// 1. `Authorization: Bearer <credential>`
/// 2. `?token=<credential>` (browsers cannot set headers on WebSocket upgrades)
/// 3. the `session_token` cookie
///
/// A credential must verify *and* still belong to a live session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts.headers.get(AUTHORIZATION) {
            let credential = auth_header
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Invalid Authorization format. Expected: Bearer <credential>".into(),
                    ))
                })?;
            let user_id = state.sessions.validate_credential(credential).await?;
            return Ok(AuthUser { user_id });
        }

        if let Ok(Query(TokenQuery { token: Some(credential) })) =
            Query::<TokenQuery>::try_from_uri(&parts.uri)
        {
            let user_id = state.sessions.validate_credential(&credential).await?;
            return Ok(AuthUser { user_id });
        }

        let session_token = parts
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_token_from_cookies);

        if let Some(token) = session_token {
            return match state.sessions.validate_session(token).await? {
                Some(user_id) => Ok(AuthUser { user_id }),
                None => Err(AppError::Core(CoreError::Unauthorized(
                    "Session is invalid or has expired".into(),
                ))),
            };
        }

        Err(AppError::Core(CoreError::Unauthorized(
            "Missing credentials".into(),
        )))
    }
}

//! Durable login sessions.
//!
//! A session ties an opaque token (handed out as the `session_token` cookie)
//! and a signed credential (handed out in the response body) to one user.
//! Each user holds at most one session: issuing a new one revokes the old.

use agora_core::error::CoreError;
use agora_core::types::{DbId, Timestamp};
use agora_db::models::session::CreateSession;
use agora_db::repositories::SessionRepo;
use agora_db::DbPool;
use axum::http::HeaderValue;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use uuid::Uuid;

use crate::auth::credential::{decode_credential, hash_credential, issue_credential, CredentialConfig};
use crate::error::AppError;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid user id {0}")]
    InvalidUser(DbId),

    #[error("credential is malformed or carries a bad signature")]
    Malformed,

    #[error("session has expired")]
    Expired,

    #[error("credential does not belong to an active session")]
    Revoked,

    #[error("failed to sign credential: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("session storage failed: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidUser(id) => {
                AppError::Core(CoreError::Validation(format!("Invalid user id {id}")))
            }
            SessionError::Malformed | SessionError::Expired | SessionError::Revoked => {
                AppError::Core(CoreError::Unauthorized(err.to_string()))
            }
            SessionError::Signing(e) => AppError::InternalError(format!("Credential signing failed: {e}")),
            SessionError::Storage(e) => AppError::Database(e),
        }
    }
}

/// What a successful login hands back to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: DbId,
    pub token: String,
    pub credential: String,
    pub expires_at: Timestamp,
}

/// Session issue, validation and revocation over the `sessions` table.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
    config: CredentialConfig,
}

impl SessionStore {
    pub fn new(pool: DbPool, config: CredentialConfig) -> Self {
        Self { pool, config }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.config.session_ttl()
    }

    /// Issue a fresh session for `user_id`, replacing any existing one.
    pub async fn create_session(&self, user_id: DbId) -> Result<IssuedSession, SessionError> {
        if user_id <= 0 {
            return Err(SessionError::InvalidUser(user_id));
        }

        let now = Utc::now();
        let expires_at = now + self.ttl();
        let credential =
            issue_credential(user_id, now, expires_at, &self.config).map_err(SessionError::Signing)?;

        let input = CreateSession {
            token: Uuid::new_v4().to_string(),
            user_id,
            credential_hash: hash_credential(&credential),
            expires_at,
        };
        let session = SessionRepo::replace_for_user(&self.pool, &input).await?;

        tracing::info!(user_id, expires_at = %session.expires_at, "Session created");

        Ok(IssuedSession {
            user_id,
            token: session.token,
            credential,
            expires_at: session.expires_at,
        })
    }

    /// Resolve a session token to its user. `None` when absent or expired.
    pub async fn validate_session(&self, token: &str) -> Result<Option<DbId>, SessionError> {
        let Some(session) = SessionRepo::find_by_token(&self.pool, token).await? else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            self.discard_expired(&session.token, session.user_id).await;
            return Ok(None);
        }

        Ok(Some(session.user_id))
    }

    /// Resolve a signed credential to its user.
    ///
    /// The credential must verify and must still be referenced by a live
    /// session row; a credential superseded by a newer login is `Revoked`.
    pub async fn validate_credential(&self, credential: &str) -> Result<DbId, SessionError> {
        let claims = decode_credential(credential, &self.config).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Malformed,
        })?;

        let session = SessionRepo::find_by_credential_hash(&self.pool, &hash_credential(credential))
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or(SessionError::Revoked)?;

        if session.is_expired_at(Utc::now()) {
            self.discard_expired(&session.token, session.user_id).await;
            return Err(SessionError::Expired);
        }

        Ok(session.user_id)
    }

    /// Delete one session. Unknown tokens are not an error.
    pub async fn delete_session(&self, token: &str) -> Result<(), SessionError> {
        if SessionRepo::delete(&self.pool, token).await? {
            tracing::debug!("Session deleted");
        }
        Ok(())
    }

    /// Delete every session of a user. Returns how many rows went away.
    pub async fn delete_all_sessions_for_user(&self, user_id: DbId) -> Result<u64, SessionError> {
        let deleted = SessionRepo::delete_all_for_user(&self.pool, user_id).await?;
        tracing::debug!(user_id, deleted, "Sessions deleted for user");
        Ok(deleted)
    }

    /// Opportunistic cleanup of an expired row; the sweeper catches misses.
    async fn discard_expired(&self, token: &str, user_id: DbId) {
        if let Err(e) = SessionRepo::delete(&self.pool, token).await {
            tracing::warn!(user_id, error = %e, "Failed to delete expired session");
        }
    }
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: chrono::Duration) -> Result<HeaderValue, AppError> {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={}",
        max_age.num_seconds()
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::InternalError(format!("Invalid session cookie: {e}")))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_token=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0")
}

/// Pull the session token out of a `Cookie` request header.
pub fn session_token_from_cookies(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|c| c.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
}

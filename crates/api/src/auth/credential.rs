//! Signed credential issue/decode and the digest stored alongside sessions.
//!
//! Credentials are HS256-signed JWTs carrying a [`Claims`] payload. The
//! database never sees the credential itself, only its SHA-256 hex digest, so
//! a leaked `sessions` table cannot be replayed.

use agora_core::types::{DbId, Timestamp};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Claims embedded in every credential.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique identifier (UUID v4); two credentials issued to the same user
    /// in the same second still differ.
    pub jti: String,
}

/// Credential signing and session lifetime.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// HMAC-SHA256 secret used to sign and verify credentials.
    pub secret: String,
    /// Lifetime of a session and of its credential, in hours (default: 24).
    pub session_ttl_hours: i64,
}

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

impl CredentialConfig {
    /// Load credential configuration from environment variables.
    ///
    /// | Env Var             | Required | Default |
    /// |---------------------|----------|---------|
    /// | `CREDENTIAL_SECRET` | **yes**  | --      |
    /// | `SESSION_TTL_HOURS` | no       | `24`    |
    ///
    /// # Panics
    ///
    /// Panics if `CREDENTIAL_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("CREDENTIAL_SECRET")
            .expect("CREDENTIAL_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "CREDENTIAL_SECRET must not be empty");

        let session_ttl_hours: i64 = std::env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| DEFAULT_SESSION_TTL_HOURS.to_string())
            .parse()
            .expect("SESSION_TTL_HOURS must be a valid i64");
        assert!(session_ttl_hours > 0, "SESSION_TTL_HOURS must be positive");

        Self {
            secret,
            session_ttl_hours,
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

/// Sign a credential for `user_id` valid from `issued_at` until `expires_at`.
pub fn issue_credential(
    user_id: DbId,
    issued_at: Timestamp,
    expires_at: Timestamp,
    config: &CredentialConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp(),
        iat: issued_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify signature and structural expiry, returning the embedded [`Claims`].
///
/// This does not consult the session table; see
/// [`SessionStore::validate_credential`](crate::auth::session::SessionStore::validate_credential).
pub fn decode_credential(
    credential: &str,
    config: &CredentialConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        credential,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

/// SHA-256 hex digest of a credential, as stored in `sessions.credential_hash`.
pub fn hash_credential(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    format!("{:x}", hasher.finalize())
}

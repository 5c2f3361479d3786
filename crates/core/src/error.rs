#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing, invalid, expired or revoked credential or session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

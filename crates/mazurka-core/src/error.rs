use thiserror::Error;

/// Standard error type for the Mazurka engine.
///
/// Each variant maps to one branch of the caller-facing error taxonomy:
/// authentication failures are never retried, expired tokens/sessions are
/// distinguishable from generically invalid ones, and write conflicts only
/// surface after the retry budget is spent.
#[derive(Debug, Error)]
pub enum MazurkaError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Account locked: {0}")]
    AccountLocked(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Refresh token reuse detected for user {user_id}")]
    TokenReuse { user_id: String },

    #[error("Concurrent session limit exceeded for user {user_id}: {active} active, max {max}")]
    SessionLimitExceeded {
        user_id: String,
        active: u64,
        max: u64,
    },

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl MazurkaError {
    /// Get the stable error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            MazurkaError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            MazurkaError::AccountLocked(_) => "ACCOUNT_LOCKED",
            MazurkaError::Unauthorized(_) => "UNAUTHORIZED",
            MazurkaError::Expired(_) => "EXPIRED",
            MazurkaError::TokenReuse { .. } => "TOKEN_REUSE",
            MazurkaError::SessionLimitExceeded { .. } => "SESSION_LIMIT_EXCEEDED",
            MazurkaError::WriteConflict(_) => "WRITE_CONFLICT",
            MazurkaError::NotFound(_) => "NOT_FOUND",
            MazurkaError::Validation(_) => "VALIDATION_ERROR",
            MazurkaError::Internal(_) => "INTERNAL_ERROR",
            MazurkaError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether callers should branch to a re-authentication flow rather
    /// than a generic failure screen.
    pub fn is_expired(&self) -> bool {
        matches!(self, MazurkaError::Expired(_))
    }
}

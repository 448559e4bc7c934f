use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://mazurka.db, postgres://...)
    pub database_url: String,

    /// Environment: development, production, test
    pub environment: String,

    /// Signed-token settings.
    pub tokens: TokenConfig,

    /// Session lifecycle policy.
    pub sessions: SessionPolicy,
}

/// Signing key material and per-token-kind expiry durations.
///
/// All of this is deployment configuration; nothing here is ever
/// hardcoded at call sites.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC-SHA256 signing secret
    pub secret: String,

    /// `iss` claim stamped into and required from every token
    pub issuer: String,

    /// `aud` claim stamped into and required from every token
    pub audience: String,

    /// Access token lifetime in minutes (default: 15)
    pub access_token_expiry_mins: i64,

    /// Refresh token lifetime in hours (default: 8)
    pub refresh_token_expiry_hours: i64,

    /// Temporary (2FA-pending) token lifetime in minutes (default: 10)
    pub temp_token_expiry_mins: i64,
}

/// Session lifecycle policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPolicy {
    /// Maximum concurrent active sessions per user across distinct
    /// devices (default: 3)
    pub max_concurrent_sessions: u64,

    /// Session lifetime in minutes (default: 480)
    pub session_timeout_mins: i64,

    /// When `true`, each successful validity check extends the session's
    /// expiry instead of leaving it fixed from creation
    pub sliding_expiration: bool,

    /// Attempts for a conflicted session write before giving up (default: 3)
    pub write_retry_attempts: u32,

    /// Base backoff delay in milliseconds; attempt N waits N times this
    /// (default: 50)
    pub write_retry_base_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://mazurka.db?mode=rwc".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            tokens: TokenConfig {
                secret: std::env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "mazurka-dev-secret-change-me".to_string()),
                issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mazurka".to_string()),
                audience: std::env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "mazurka-clients".to_string()),
                access_token_expiry_mins: env_i64("ACCESS_TOKEN_EXPIRY_MINS", 15),
                refresh_token_expiry_hours: env_i64("REFRESH_TOKEN_EXPIRY_HOURS", 8),
                temp_token_expiry_mins: env_i64("TEMP_TOKEN_EXPIRY_MINS", 10),
            },
            sessions: SessionPolicy {
                max_concurrent_sessions: std::env::var("MAX_CONCURRENT_SESSIONS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                session_timeout_mins: env_i64("SESSION_TIMEOUT_MINS", 480),
                sliding_expiration: matches!(
                    std::env::var("SLIDING_EXPIRATION")
                        .unwrap_or_default()
                        .to_lowercase()
                        .as_str(),
                    "true" | "1" | "yes"
                ),
                write_retry_attempts: std::env::var("SESSION_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                write_retry_base_delay_ms: std::env::var("SESSION_RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

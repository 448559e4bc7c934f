//! Test support: an in-memory database with the schema applied, a
//! ready-made config, and static stand-ins for the external verifiers.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_sign_in() {
//!     let auth = testing::test_authenticator().await;
//!     let outcome = auth.sign_in("E1042", "correct-horse", None, None, None).await;
//!     assert!(outcome.is_ok());
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::auth::orchestrator::Authenticator;
use crate::auth::verifier::{CredentialCheck, CredentialVerifier, TokenSubject, TwoFactorVerifier};
use crate::config::{Config, SessionPolicy, TokenConfig};
use crate::error::MazurkaError;
use crate::migrations::Migrator;

/// Connect an in-memory SQLite database and apply all migrations.
pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

/// Config with short, deterministic settings for tests.
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        environment: "test".to_string(),
        tokens: TokenConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: "mazurka-test".to_string(),
            audience: "mazurka-test-clients".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_hours: 8,
            temp_token_expiry_mins: 10,
        },
        sessions: SessionPolicy {
            max_concurrent_sessions: 3,
            session_timeout_mins: 480,
            sliding_expiration: false,
            write_retry_attempts: 3,
            write_retry_base_delay_ms: 50,
        },
    }
}

/// A user known to the [`StaticCredentialVerifier`].
#[derive(Debug, Clone)]
pub struct StaticUser {
    pub display_name: String,
    pub secret: String,
    pub locked_out: bool,
    pub two_factor_enabled: bool,
}

impl StaticUser {
    pub fn new(display_name: &str, secret: &str) -> Self {
        StaticUser {
            display_name: display_name.to_string(),
            secret: secret.to_string(),
            locked_out: false,
            two_factor_enabled: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked_out = true;
        self
    }

    pub fn with_two_factor(mut self) -> Self {
        self.two_factor_enabled = true;
        self
    }
}

/// Credential verifier backed by an in-memory user table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialVerifier {
    users: HashMap<String, StaticUser>,
}

impl StaticCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, identity: &str, user: StaticUser) -> Self {
        self.users.insert(identity.to_string(), user);
        self
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify_password(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<CredentialCheck, MazurkaError> {
        let Some(user) = self.users.get(identity) else {
            return Ok(CredentialCheck::Invalid);
        };
        if user.locked_out {
            return Ok(CredentialCheck::LockedOut);
        }
        if user.secret != secret {
            return Ok(CredentialCheck::Invalid);
        }
        Ok(CredentialCheck::Valid(TokenSubject {
            user_id: identity.to_string(),
            display_name: user.display_name.clone(),
        }))
    }

    async fn is_two_factor_enabled(&self, identity: &str) -> Result<bool, MazurkaError> {
        Ok(self
            .users
            .get(identity)
            .map(|u| u.two_factor_enabled)
            .unwrap_or(false))
    }
}

/// 2FA verifier accepting a single fixed code.
#[derive(Debug, Clone)]
pub struct StaticTwoFactorVerifier {
    pub code: String,
}

impl StaticTwoFactorVerifier {
    pub fn accepting(code: &str) -> Self {
        StaticTwoFactorVerifier {
            code: code.to_string(),
        }
    }
}

#[async_trait]
impl TwoFactorVerifier for StaticTwoFactorVerifier {
    async fn verify_code(&self, _identity: &str, code: &str) -> Result<bool, MazurkaError> {
        Ok(code == self.code)
    }
}

/// An authenticator over a fresh in-memory database with two seeded
/// users: `E1042` (no 2FA) and `E2077` (2FA, code `123456`), both with
/// secret `correct-horse`.
pub async fn test_authenticator(
) -> Authenticator<StaticCredentialVerifier, StaticTwoFactorVerifier> {
    let db = test_db().await;
    let credentials = StaticCredentialVerifier::new()
        .with_user("E1042", StaticUser::new("Grace Hopper", "correct-horse"))
        .with_user(
            "E2077",
            StaticUser::new("Ada Lovelace", "correct-horse").with_two_factor(),
        );
    let two_factor = StaticTwoFactorVerifier::accepting("123456");
    Authenticator::new(db, test_config(), credentials, two_factor)
}

//! Contracts for the external credential and second-factor verifiers.
//!
//! Password hashing and TOTP mechanics live outside this engine; the
//! orchestrator only needs the outcomes. Implementations wrap whatever
//! identity store the deployment uses.

use async_trait::async_trait;

use crate::error::MazurkaError;

/// The identity claims embedded into issued tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: String,
    pub display_name: String,
}

/// Outcome of a password check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    /// Password matched; carries the claims the token issuer embeds.
    Valid(TokenSubject),
    Invalid,
    LockedOut,
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_password(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<CredentialCheck, MazurkaError>;

    async fn is_two_factor_enabled(&self, identity: &str) -> Result<bool, MazurkaError>;
}

#[async_trait]
pub trait TwoFactorVerifier: Send + Sync {
    async fn verify_code(&self, identity: &str, code: &str) -> Result<bool, MazurkaError>;
}

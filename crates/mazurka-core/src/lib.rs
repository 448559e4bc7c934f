//! Mazurka: session and authentication-token lifecycle engine.
//!
//! Owns the durable per-device session records and the refresh-token
//! ledger for a user population whose credentials live elsewhere.
//! Enforces the concurrent-session policy, rotates refresh tokens
//! exactly once per exchange, and reconciles conflicting session writes
//! with bounded optimistic-concurrency retries.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod testing;

pub use auth::orchestrator::{Authenticator, IssuedTokens, SignInOutcome};
pub use auth::session::SessionValidity;
pub use auth::verifier::{CredentialCheck, CredentialVerifier, TokenSubject, TwoFactorVerifier};
pub use config::Config;
pub use error::MazurkaError;
pub use logging::{init_logging, init_logging_json};

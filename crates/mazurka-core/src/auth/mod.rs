pub mod audit;
pub mod claims;
pub mod orchestrator;
pub mod refresh;
pub mod retry;
pub mod secrets;
pub mod session;
pub mod verifier;

pub use claims::{AccessTokenClaims, RefreshTokenClaims, TemporaryClaims};
pub use orchestrator::{Authenticator, IssuedTokens, SignInOutcome};
pub use retry::{is_write_conflict, with_retry, RetryPolicy};
pub use secrets::{generate_secure_token, hash_token};
pub use session::SessionValidity;
pub use verifier::{CredentialCheck, CredentialVerifier, TokenSubject, TwoFactorVerifier};

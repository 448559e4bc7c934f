//! Signed-token issuing and validation.
//!
//! The sole authority on token expiry math and signature checks. Every
//! token kind gets its own claims struct; a refresh token deserialized
//! as an access token fails on the missing fields, so a token can never
//! be replayed across kinds.
//!
//! All functions here are pure CPU work; nothing suspends.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::verifier::TokenSubject;
use crate::config::TokenConfig;
use crate::error::MazurkaError;

/// Role claims stamped into every access token.
pub const ACCESS_ROLES: &[&str] = &["employee"];

/// Purpose claim marking a password-verified, 2FA-pending login.
pub const PURPOSE_TEMP_AUTH: &str = "temp_auth";

/// `token_type` claim distinguishing refresh tokens.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims payload of an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name
    pub name: String,
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Unique token identifier, never reused across tokens
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Claims payload of a refresh token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub token_type: String,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims payload of a temporary (2FA-pending) token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TemporaryClaims {
    pub sub: String,
    pub name: String,
    pub purpose: String,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Create an access token for the given subject (minutes-scale expiry).
pub fn generate_access_token(
    subject: &TokenSubject,
    config: &TokenConfig,
) -> Result<String, MazurkaError> {
    let now = Utc::now();
    let claims = AccessTokenClaims {
        sub: subject.user_id.clone(),
        name: subject.display_name.clone(),
        roles: ACCESS_ROLES.iter().map(|r| r.to_string()).collect(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + Duration::minutes(config.access_token_expiry_mins)).timestamp(),
    };
    sign(&claims, config)
}

/// Create a refresh token for the given subject (hours-scale expiry).
pub fn generate_refresh_token(
    subject: &TokenSubject,
    config: &TokenConfig,
) -> Result<String, MazurkaError> {
    let now = Utc::now();
    let claims = RefreshTokenClaims {
        sub: subject.user_id.clone(),
        token_type: TOKEN_TYPE_REFRESH.to_string(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.refresh_token_expiry_hours)).timestamp(),
    };
    sign(&claims, config)
}

/// Create a temporary token bridging the window between password
/// verification and 2FA confirmation. No session exists while one of
/// these is outstanding.
pub fn generate_temporary_token(
    subject: &TokenSubject,
    ttl: Duration,
    config: &TokenConfig,
) -> Result<String, MazurkaError> {
    let now = Utc::now();
    let claims = TemporaryClaims {
        sub: subject.user_id.clone(),
        name: subject.display_name.clone(),
        purpose: PURPOSE_TEMP_AUTH.to_string(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    sign(&claims, config)
}

/// Validate an access token and return the claims.
///
/// `ignore_expiry` skips only the expiry check; signature, issuer, and
/// audience are always enforced. The refresh exchange needs to read
/// claims out of an expired access token without trusting its liveness.
pub fn validate_access_token(
    token: &str,
    config: &TokenConfig,
    ignore_expiry: bool,
) -> Result<AccessTokenClaims, MazurkaError> {
    let validation = validation(config, !ignore_expiry);
    let data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(map_decode_err)?;
    Ok(data.claims)
}

/// Verify a refresh token's signature, issuer, audience, and kind.
///
/// Liveness is deliberately not checked here: whether the token is
/// still exchangeable is the ledger's business, not the signature's.
pub fn validate_refresh_token_signature(
    token: &str,
    config: &TokenConfig,
) -> Result<RefreshTokenClaims, MazurkaError> {
    let validation = validation(config, false);
    let data = decode::<RefreshTokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(map_decode_err)?;

    if data.claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(MazurkaError::Unauthorized(
            "not a refresh token".to_string(),
        ));
    }
    Ok(data.claims)
}

/// Validate a temporary token, including expiry.
pub fn validate_temporary_token(
    token: &str,
    config: &TokenConfig,
) -> Result<TemporaryClaims, MazurkaError> {
    let validation = validation(config, true);
    let data = decode::<TemporaryClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(map_decode_err)?;

    if data.claims.purpose != PURPOSE_TEMP_AUTH {
        return Err(MazurkaError::Unauthorized(
            "not a temporary authentication token".to_string(),
        ));
    }
    Ok(data.claims)
}

/// Read the expiry out of any signed token without validating it.
/// For display and bookkeeping only — never for authorization.
pub fn token_expiry(token: &str) -> Result<NaiveDateTime, MazurkaError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<serde_json::Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| MazurkaError::Validation(format!("Malformed token: {e}")))?;

    let exp = data
        .claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| MazurkaError::Validation("Token has no exp claim".to_string()))?;

    let expiry = DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| MazurkaError::Validation("Token exp out of range".to_string()))?;
    Ok(expiry.naive_utc())
}

fn sign<T: Serialize>(claims: &T, config: &TokenConfig) -> Result<String, MazurkaError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| MazurkaError::Internal(format!("Failed to sign token: {e}")))
}

fn validation(config: &TokenConfig, validate_exp: bool) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.validate_exp = validate_exp;
    validation
}

fn map_decode_err(err: jsonwebtoken::errors::Error) -> MazurkaError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            MazurkaError::Expired("token".to_string())
        }
        _ => MazurkaError::Unauthorized(format!("Invalid token: {err}")),
    }
}

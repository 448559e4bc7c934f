//! Authentication orchestrator: composes the credential verifier, token
//! issuer, session coordinator, and refresh-token ledger into the
//! sign-in / 2FA / refresh / sign-out flows.
//!
//! The one ordering rule everything here serves: a token pair is only
//! minted after its session row is committed, so a valid pair never
//! exists without a backing active session.

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::session::SessionValidity;
use crate::auth::verifier::{CredentialCheck, CredentialVerifier, TokenSubject, TwoFactorVerifier};
use crate::auth::{audit, claims, refresh, session};
use crate::config::Config;
use crate::error::MazurkaError;

/// Fallback fingerprint when the client supplied no device signal.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// An access/refresh token pair handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (UTC)
    pub expires_at: NaiveDateTime,
}

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    /// Password verified but a second factor is pending. No session row
    /// and no refresh token exist yet, only this short-lived token.
    TwoFactorRequired { temporary_token: String },
    Authenticated(IssuedTokens),
}

/// Request-level authentication flows over a shared database handle and
/// the two external verifiers.
pub struct Authenticator<C, T> {
    db: DatabaseConnection,
    config: Config,
    credentials: C,
    two_factor: T,
}

impl<C, T> Authenticator<C, T>
where
    C: CredentialVerifier,
    T: TwoFactorVerifier,
{
    pub fn new(db: DatabaseConnection, config: Config, credentials: C, two_factor: T) -> Self {
        Authenticator {
            db,
            config,
            credentials,
            two_factor,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Sign in with identity and secret.
    ///
    /// Locked accounts and bad credentials fail terminally and are never
    /// retried here. When the account has 2FA enabled, the caller gets a
    /// temporary token and must complete [`verify_two_factor`] before
    /// any session exists.
    pub async fn sign_in(
        &self,
        identity: &str,
        secret: &str,
        device_fingerprint: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SignInOutcome, MazurkaError> {
        match self.credentials.verify_password(identity, secret).await? {
            CredentialCheck::LockedOut => {
                let _ = audit::record_login_event(
                    &self.db,
                    identity,
                    false,
                    Some("account_locked"),
                    ip_address,
                    user_agent,
                )
                .await;
                Err(MazurkaError::AccountLocked(format!(
                    "account {identity} is locked out"
                )))
            }
            CredentialCheck::Invalid => {
                let _ = audit::record_login_event(
                    &self.db,
                    identity,
                    false,
                    Some("invalid_credentials"),
                    ip_address,
                    user_agent,
                )
                .await;
                Err(MazurkaError::InvalidCredentials(
                    "invalid identity or secret".to_string(),
                ))
            }
            CredentialCheck::Valid(subject) => {
                if self.credentials.is_two_factor_enabled(identity).await? {
                    let temporary_token = claims::generate_temporary_token(
                        &subject,
                        Duration::minutes(self.config.tokens.temp_token_expiry_mins),
                        &self.config.tokens,
                    )?;
                    tracing::debug!(user_id = %subject.user_id, "password verified, second factor pending");
                    Ok(SignInOutcome::TwoFactorRequired { temporary_token })
                } else {
                    let tokens = self
                        .establish_session(&subject, device_fingerprint, ip_address, user_agent)
                        .await?;
                    let _ = audit::record_login_event(
                        &self.db,
                        identity,
                        true,
                        None,
                        ip_address,
                        user_agent,
                    )
                    .await;
                    Ok(SignInOutcome::Authenticated(tokens))
                }
            }
        }
    }

    /// Complete a 2FA-pending sign-in with the submitted code.
    pub async fn verify_two_factor(
        &self,
        temporary_token: &str,
        code: &str,
        device_fingerprint: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, MazurkaError> {
        let temp = claims::validate_temporary_token(temporary_token, &self.config.tokens)?;
        let subject = TokenSubject {
            user_id: temp.sub,
            display_name: temp.name,
        };

        if !self.two_factor.verify_code(&subject.user_id, code).await? {
            let _ = audit::record_login_event(
                &self.db,
                &subject.user_id,
                false,
                Some("invalid_two_factor_code"),
                ip_address,
                user_agent,
            )
            .await;
            return Err(MazurkaError::InvalidCredentials(
                "invalid 2FA code".to_string(),
            ));
        }

        let tokens = self
            .establish_session(&subject, device_fingerprint, ip_address, user_agent)
            .await?;
        let _ =
            audit::record_login_event(&self.db, &subject.user_id, true, None, ip_address, user_agent)
                .await;
        Ok(tokens)
    }

    /// Exchange an expired-or-not access token plus its refresh token
    /// for a brand-new pair (rotation).
    ///
    /// The presented refresh token is consumed exactly once; presenting
    /// a consumed one revokes everything the user holds.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<IssuedTokens, MazurkaError> {
        // Identity comes from the access token's claims, not its
        // liveness; it is usually expired by the time it gets here.
        let access = claims::validate_access_token(access_token, &self.config.tokens, true)?;
        let user_id = access.sub.clone();

        let presented = claims::validate_refresh_token_signature(refresh_token, &self.config.tokens)?;
        if presented.sub != user_id {
            return Err(MazurkaError::Unauthorized(
                "refresh token subject mismatch".to_string(),
            ));
        }

        let record = refresh::find_refresh_token(&self.db, &user_id, refresh_token)
            .await?
            .ok_or_else(|| MazurkaError::Unauthorized("unknown refresh token".to_string()))?;

        if record.is_used {
            // A consumed token coming back means a stale copy is being
            // replayed: invalidate everything this user holds.
            let revoked =
                refresh::revoke_all_user_tokens(&self.db, &user_id, refresh::REASON_REUSE_DETECTED)
                    .await?;
            tracing::error!(user_id = %user_id, revoked, "refresh token reuse detected; all tokens revoked");
            let _ = audit::record_login_event(
                &self.db,
                &user_id,
                false,
                Some("refresh_token_reuse"),
                None,
                None,
            )
            .await;
            return Err(MazurkaError::TokenReuse { user_id });
        }
        if record.is_revoked {
            return Err(MazurkaError::Unauthorized(
                "refresh token has been revoked".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        if record.expires_at <= now {
            refresh::revoke_token(&self.db, record.id, refresh::REASON_TOKEN_EXPIRED).await?;
            return Err(MazurkaError::Expired("refresh token".to_string()));
        }

        let subject = TokenSubject {
            user_id: user_id.clone(),
            display_name: access.name,
        };
        let new_access = claims::generate_access_token(&subject, &self.config.tokens)?;
        let new_refresh = claims::generate_refresh_token(&subject, &self.config.tokens)?;
        let expires_at = claims::token_expiry(&new_access)?;
        let refresh_expires_at =
            now + Duration::hours(self.config.tokens.refresh_token_expiry_hours);

        // Rotation order: persist the replacement first, then consume
        // the old token, in one transaction. A crash mid-exchange must
        // not leave the user with no valid token.
        let txn = self.db.begin().await?;
        refresh::store_refresh_token(
            &txn,
            &user_id,
            &new_refresh,
            refresh_expires_at,
            record.created_by_ip.as_deref(),
        )
        .await?;
        refresh::mark_used(&txn, record.id).await?;
        txn.commit().await?;

        tracing::debug!(user_id = %user_id, "refresh token rotated");
        Ok(IssuedTokens {
            access_token: new_access,
            refresh_token: new_refresh,
            expires_at,
        })
    }

    /// Sign out: revoke the user's refresh tokens and end the session
    /// (or every session when `everywhere` is set).
    ///
    /// Best-effort: cleanup failures are logged and the sign-out still
    /// reports success; the caller is leaving regardless.
    pub async fn sign_out(
        &self,
        user_id: &str,
        session_id: &str,
        everywhere: bool,
    ) -> Result<(), MazurkaError> {
        if let Err(err) =
            refresh::revoke_all_user_tokens(&self.db, user_id, refresh::REASON_LOGOUT).await
        {
            tracing::warn!(user_id, error = %err, "failed to revoke refresh tokens during sign-out");
        }

        if everywhere {
            if let Err(err) = session::end_all_user_sessions(&self.db, user_id, None).await {
                tracing::warn!(user_id, error = %err, "failed to end sessions during sign-out");
            }
        } else if let Err(err) = session::end_session(&self.db, session_id).await {
            tracing::warn!(user_id, session_id, error = %err, "failed to end session during sign-out");
        }

        tracing::info!(user_id, everywhere, "signed out");
        Ok(())
    }

    /// Check a session's validity on behalf of a caller.
    pub async fn validate_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionValidity, MazurkaError> {
        session::is_session_valid(&self.db, &self.config.sessions, session_id, user_id).await
    }

    /// Background sweep: expire overdue sessions.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, MazurkaError> {
        session::cleanup_expired_sessions(&self.db).await
    }

    /// Background sweep: drop a user's dead refresh-token rows.
    pub async fn cleanup_expired_tokens(&self, user_id: &str) -> Result<u64, MazurkaError> {
        refresh::cleanup_expired_tokens(&self.db, user_id).await
    }

    async fn establish_session(
        &self,
        subject: &TokenSubject,
        device_fingerprint: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, MazurkaError> {
        let fingerprint = device_fingerprint.unwrap_or(UNKNOWN_DEVICE);
        let session_id = Uuid::new_v4().to_string();

        // Session first, tokens second: if this fails, the sign-in
        // fails and no tokens exist.
        let created = session::create_or_update_session(
            &self.db,
            &self.config.sessions,
            &subject.user_id,
            &session_id,
            ip_address,
            user_agent,
            fingerprint,
        )
        .await?;

        let access_token = claims::generate_access_token(subject, &self.config.tokens)?;
        let refresh_token = claims::generate_refresh_token(subject, &self.config.tokens)?;
        let expires_at = claims::token_expiry(&access_token)?;
        let refresh_expires_at = Utc::now().naive_utc()
            + Duration::hours(self.config.tokens.refresh_token_expiry_hours);

        refresh::store_refresh_token(
            &self.db,
            &subject.user_id,
            &refresh_token,
            refresh_expires_at,
            ip_address,
        )
        .await?;

        tracing::info!(user_id = %subject.user_id, session_id = %created.id, "session established");
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

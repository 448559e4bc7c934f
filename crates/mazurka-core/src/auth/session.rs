//! Session coordinator: device-scoped session upsert, concurrency-limit
//! enforcement, termination, validity checks, and the expiry sweep.
//!
//! All writes for one user's sessions go through a single transaction
//! with bounded retry; concurrent logins for the same (user, device)
//! pair serialize through the store's own conflict detection rather
//! than an application-level lock.

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};

use crate::auth::retry::{is_write_conflict, with_retry, RetryPolicy};
use crate::config::SessionPolicy;
use crate::error::MazurkaError;
use crate::models::session;

pub const REASON_NEW_DEVICE_LOGIN: &str = "New login from another device";
pub const REASON_LIMIT_EXCEEDED: &str = "Concurrent session limit exceeded";
pub const REASON_SESSION_EXPIRED: &str = "Session expired";
pub const REASON_LOGGED_OUT: &str = "Logged out";

/// Outcome of a session validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidity {
    Valid,
    NotFound,
    OwnershipMismatch,
    Inactive,
    Expired,
}

impl SessionValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionValidity::Valid)
    }
}

/// Count the user's active sessions against the policy maximum.
///
/// Returns the current count; fails with `SessionLimitExceeded` once the
/// count has reached the maximum. Callers that want eviction instead of
/// an error use [`end_all_user_sessions`] or simply let
/// [`create_or_update_session`] replace the other-device sessions.
pub async fn check_concurrent_sessions(
    db: &DatabaseConnection,
    policy: &SessionPolicy,
    user_id: &str,
) -> Result<u64, MazurkaError> {
    let active = session::Entity::find()
        .filter(session::Column::UserId.eq(user_id))
        .filter(session::Column::IsActive.eq(true))
        .count(db)
        .await?;

    if active >= policy.max_concurrent_sessions {
        return Err(MazurkaError::SessionLimitExceeded {
            user_id: user_id.to_string(),
            active,
            max: policy.max_concurrent_sessions,
        });
    }
    Ok(active)
}

/// Create or refresh the session for `(user_id, device_fingerprint)`.
///
/// One all-or-nothing transaction: a same-device session is refreshed in
/// place (same id); a new device gets a fresh row under `session_id`,
/// and when that would exceed the concurrency cap, every other-device
/// session is first ended with reason "New login from another device".
/// Write conflicts roll the whole body back and re-run it, up to the
/// policy's attempt budget; exhaustion is a terminal error the caller
/// must surface as a login failure.
pub async fn create_or_update_session(
    db: &DatabaseConnection,
    policy: &SessionPolicy,
    user_id: &str,
    session_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    device_fingerprint: &str,
) -> Result<session::Model, MazurkaError> {
    let retry = RetryPolicy::new(
        policy.write_retry_attempts,
        std::time::Duration::from_millis(policy.write_retry_base_delay_ms),
    );

    with_retry(retry, is_write_conflict, || {
        try_create_or_update(
            db,
            policy,
            user_id,
            session_id,
            ip_address,
            user_agent,
            device_fingerprint,
        )
    })
    .await
    .map_err(|err| {
        if is_write_conflict(&err) {
            MazurkaError::WriteConflict(format!(
                "session write for user {user_id} still conflicted after {} attempts: {err}",
                policy.write_retry_attempts
            ))
        } else {
            err
        }
    })
}

async fn try_create_or_update(
    db: &DatabaseConnection,
    policy: &SessionPolicy,
    user_id: &str,
    session_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    device_fingerprint: &str,
) -> Result<session::Model, MazurkaError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    // Read inside the transaction; a pre-transaction snapshot can go
    // stale under a concurrent login for the same user.
    let active = session::Entity::find()
        .filter(session::Column::UserId.eq(user_id))
        .filter(session::Column::IsActive.eq(true))
        .all(&txn)
        .await?;

    let (same_device, others): (Vec<_>, Vec<_>) = active
        .into_iter()
        .partition(|s| s.device_fingerprint == device_fingerprint);

    // A new device only displaces the others once the user is at the
    // concurrency cap; below it, devices accumulate up to the maximum.
    // A known device re-authenticating is never a concurrency violation.
    let over_limit =
        same_device.is_empty() && others.len() as u64 >= policy.max_concurrent_sessions;
    if over_limit {
        let evicted: Vec<String> = others.iter().map(|s| s.id.clone()).collect();
        session::Entity::update_many()
            .col_expr(session::Column::IsActive, Expr::value(false))
            .col_expr(session::Column::EndedAt, Expr::value(now))
            .col_expr(
                session::Column::EndReason,
                Expr::value(REASON_NEW_DEVICE_LOGIN),
            )
            .filter(session::Column::Id.is_in(evicted.clone()))
            .exec(&txn)
            .await?;
        tracing::info!(user_id, evicted = evicted.len(), "ended other-device sessions");
    }

    let expires_at = now + Duration::minutes(policy.session_timeout_mins);

    let model = if let Some(existing) = same_device.into_iter().next() {
        // Re-authentication on a known device: refresh the existing row,
        // keeping its id.
        let mut active_model: session::ActiveModel = existing.into();
        active_model.ip_address = Set(ip_address.map(str::to_string));
        active_model.user_agent = Set(user_agent.map(str::to_string));
        active_model.last_accessed_at = Set(now);
        active_model.expires_at = Set(expires_at);
        active_model.update(&txn).await?
    } else {
        session::ActiveModel {
            id: Set(session_id.to_string()),
            user_id: Set(user_id.to_string()),
            device_fingerprint: Set(device_fingerprint.to_string()),
            ip_address: Set(ip_address.map(str::to_string)),
            user_agent: Set(user_agent.map(str::to_string)),
            created_at: Set(now),
            last_accessed_at: Set(now),
            expires_at: Set(expires_at),
            is_active: Set(true),
            ended_at: Set(None),
            end_reason: Set(None),
        }
        .insert(&txn)
        .await?
    };

    txn.commit().await?;
    Ok(model)
}

/// End a session. Idempotent: a missing or already-ended session is
/// success, since the desired terminal state already holds.
pub async fn end_session(db: &DatabaseConnection, session_id: &str) -> Result<(), MazurkaError> {
    let Some(model) = session::Entity::find_by_id(session_id.to_string())
        .one(db)
        .await?
    else {
        return Ok(());
    };
    if !model.is_active {
        return Ok(());
    }

    let now = Utc::now().naive_utc();
    let mut active_model: session::ActiveModel = model.into();
    active_model.is_active = Set(false);
    active_model.ended_at = Set(Some(now));
    active_model.end_reason = Set(Some(REASON_LOGGED_OUT.to_string()));
    active_model.update(db).await?;
    Ok(())
}

/// End all of a user's active sessions, optionally sparing one.
/// Returns the number of sessions ended.
pub async fn end_all_user_sessions(
    db: &DatabaseConnection,
    user_id: &str,
    exclude_session_id: Option<&str>,
) -> Result<u64, MazurkaError> {
    let now = Utc::now().naive_utc();
    let mut query = session::Entity::update_many()
        .col_expr(session::Column::IsActive, Expr::value(false))
        .col_expr(session::Column::EndedAt, Expr::value(now))
        .col_expr(
            session::Column::EndReason,
            Expr::value(REASON_LIMIT_EXCEEDED),
        )
        .filter(session::Column::UserId.eq(user_id))
        .filter(session::Column::IsActive.eq(true));

    if let Some(keep) = exclude_session_id {
        query = query.filter(session::Column::Id.ne(keep));
    }

    let result = query.exec(db).await?;
    Ok(result.rows_affected)
}

/// Check whether a session exists, belongs to `user_id`, is active, and
/// has not expired.
///
/// An expired row is transitioned to inactive as a side effect (lazy
/// expiry). With sliding expiration, a successful check extends the
/// expiry by the configured timeout.
pub async fn is_session_valid(
    db: &DatabaseConnection,
    policy: &SessionPolicy,
    session_id: &str,
    user_id: &str,
) -> Result<SessionValidity, MazurkaError> {
    let Some(model) = session::Entity::find_by_id(session_id.to_string())
        .one(db)
        .await?
    else {
        return Ok(SessionValidity::NotFound);
    };

    if model.user_id != user_id {
        return Ok(SessionValidity::OwnershipMismatch);
    }
    if !model.is_active {
        return Ok(SessionValidity::Inactive);
    }

    let now = Utc::now().naive_utc();
    if model.expires_at <= now {
        let mut active_model: session::ActiveModel = model.into();
        active_model.is_active = Set(false);
        active_model.ended_at = Set(Some(now));
        active_model.end_reason = Set(Some(REASON_SESSION_EXPIRED.to_string()));
        active_model.update(db).await?;
        return Ok(SessionValidity::Expired);
    }

    if policy.sliding_expiration {
        let mut active_model: session::ActiveModel = model.into();
        active_model.last_accessed_at = Set(now);
        active_model.expires_at = Set(now + Duration::minutes(policy.session_timeout_mins));
        active_model.update(db).await?;
    }

    Ok(SessionValidity::Valid)
}

/// Sweep every active session whose expiry has passed. Intended for a
/// periodic scheduler, independent of request traffic. Returns the
/// number of sessions expired.
pub async fn cleanup_expired_sessions(db: &DatabaseConnection) -> Result<u64, MazurkaError> {
    let now = Utc::now().naive_utc();
    let result = session::Entity::update_many()
        .col_expr(session::Column::IsActive, Expr::value(false))
        .col_expr(session::Column::EndedAt, Expr::value(now))
        .col_expr(
            session::Column::EndReason,
            Expr::value(REASON_SESSION_EXPIRED),
        )
        .filter(session::Column::IsActive.eq(true))
        .filter(session::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(expired = result.rows_affected, "expired sessions swept");
    }
    Ok(result.rows_affected)
}

//! Refresh-token ledger: the durable record that makes at-most-once
//! exchange and reuse detection possible.
//!
//! Only the SHA-256 hash of a token is stored. Consumed tokens are kept
//! (flagged `is_used`) rather than deleted; a replayed copy of a
//! consumed token must still be recognizable as reuse.
//!
//! Functions take `&impl ConnectionTrait` so the rotation step can run
//! them inside the orchestrator's transaction.

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::auth::secrets::hash_token;
use crate::error::MazurkaError;
use crate::models::refresh_token;

pub const REASON_REUSE_DETECTED: &str = "Refresh token reuse detected";
pub const REASON_TOKEN_EXPIRED: &str = "Refresh token expired";
pub const REASON_LOGOUT: &str = "logout";

/// Persist a newly issued refresh token.
pub async fn store_refresh_token(
    conn: &impl ConnectionTrait,
    user_id: &str,
    raw_token: &str,
    expires_at: NaiveDateTime,
    created_by_ip: Option<&str>,
) -> Result<(), MazurkaError> {
    let model = refresh_token::ActiveModel {
        user_id: Set(user_id.to_string()),
        token_hash: Set(hash_token(raw_token)),
        created_at: Set(Utc::now().naive_utc()),
        expires_at: Set(expires_at),
        is_used: Set(false),
        is_revoked: Set(false),
        revoked_reason: Set(None),
        created_by_ip: Set(created_by_ip.map(str::to_string)),
        ..Default::default()
    };
    model.insert(conn).await?;
    Ok(())
}

/// Look up a presented token scoped to its claimed owner. Returns the
/// row whatever its flags; the caller branches on used/revoked/expired.
pub async fn find_refresh_token(
    conn: &impl ConnectionTrait,
    user_id: &str,
    raw_token: &str,
) -> Result<Option<refresh_token::Model>, MazurkaError> {
    let found = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .filter(refresh_token::Column::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(found)
}

/// Flag a token as consumed by an exchange. Called exactly once per
/// token, after the replacement token is persisted, inside the same
/// transaction.
pub async fn mark_used(conn: &impl ConnectionTrait, token_id: i32) -> Result<(), MazurkaError> {
    refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::IsUsed, Expr::value(true))
        .filter(refresh_token::Column::Id.eq(token_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Revoke a single token.
pub async fn revoke_token(
    conn: &impl ConnectionTrait,
    token_id: i32,
    reason: &str,
) -> Result<(), MazurkaError> {
    refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::IsRevoked, Expr::value(true))
        .col_expr(refresh_token::Column::RevokedReason, Expr::value(reason))
        .filter(refresh_token::Column::Id.eq(token_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Revoke every token the user holds — the containment response to
/// reuse detection, and the logout-everywhere path. Returns the number
/// of tokens revoked.
pub async fn revoke_all_user_tokens(
    conn: &impl ConnectionTrait,
    user_id: &str,
    reason: &str,
) -> Result<u64, MazurkaError> {
    let result = refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::IsRevoked, Expr::value(true))
        .col_expr(refresh_token::Column::RevokedReason, Expr::value(reason))
        .filter(refresh_token::Column::UserId.eq(user_id))
        .filter(refresh_token::Column::IsRevoked.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Delete the user's tokens that are expired and no longer evidentiary
/// (already used or revoked). Unused, unrevoked rows are kept even past
/// expiry: an expired token coming back still deserves an "expired"
/// answer rather than "unknown". Returns the number of rows removed.
pub async fn cleanup_expired_tokens(
    conn: &impl ConnectionTrait,
    user_id: &str,
) -> Result<u64, MazurkaError> {
    let now = Utc::now().naive_utc();
    let result = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .filter(refresh_token::Column::ExpiresAt.lte(now))
        .filter(
            Condition::any()
                .add(refresh_token::Column::IsUsed.eq(true))
                .add(refresh_token::Column::IsRevoked.eq(true)),
        )
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

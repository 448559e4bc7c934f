use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Refresh token ledger entity.
///
/// Rows are never deleted at exchange time; a consumed token stays on
/// record with `is_used = true` so a replayed copy can be recognized as
/// reuse. The cleanup sweep removes rows only once they are expired and
/// no longer evidentiary.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The user who owns this refresh token
    pub user_id: String,

    /// SHA-256 hash of the signed token (the raw token never touches
    /// the database)
    #[sea_orm(unique)]
    pub token_hash: String,

    pub created_at: NaiveDateTime,

    /// When the token expires; `expires_at <= now` is expired
    pub expires_at: NaiveDateTime,

    /// Set exactly once, at the moment the token is exchanged
    #[sea_orm(default_value = false)]
    pub is_used: bool,

    #[sea_orm(default_value = false)]
    pub is_revoked: bool,

    pub revoked_reason: Option<String>,

    /// IP address that created this token
    pub created_by_ip: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

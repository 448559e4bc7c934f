use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-device session entity.
///
/// At most one row with `is_active = true` exists per
/// `(user_id, device_fingerprint)` pair; the coordinator enforces this
/// inside a transaction on every login.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque session identifier (UUID v4, assigned at creation)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who owns this session
    pub user_id: String,

    /// Stable identifier correlating requests from the same client
    /// software; `"unknown"` when the client supplied no signal
    pub device_fingerprint: String,

    /// IP address (diagnostic, not security-authoritative)
    pub ip_address: Option<String>,

    /// User-Agent (diagnostic, not security-authoritative)
    pub user_agent: Option<String>,

    pub created_at: NaiveDateTime,

    pub last_accessed_at: NaiveDateTime,

    /// When the session expires; `expires_at <= now` is expired
    pub expires_at: NaiveDateTime,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Set once, when the session is terminated
    pub ended_at: Option<NaiveDateTime>,

    /// Why the session was terminated
    pub end_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

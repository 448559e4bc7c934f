use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::error::MazurkaError;
use crate::models::login_event;

/// Record an authentication attempt for auditing.
///
/// Best-effort at every call site: callers discard the result so a full
/// audit table never blocks a sign-in.
pub async fn record_login_event(
    db: &DatabaseConnection,
    user_id: &str,
    success: bool,
    failure_reason: Option<&str>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), MazurkaError> {
    let model = login_event::ActiveModel {
        user_id: Set(user_id.to_string()),
        success: Set(success),
        failure_reason: Set(failure_reason.map(str::to_string)),
        ip_address: Set(ip_address.map(str::to_string)),
        user_agent: Set(user_agent.map(str::to_string)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    model.insert(db).await?;
    Ok(())
}

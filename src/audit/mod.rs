use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::schema::audit_log;
use crate::shared::utils::{client_ip, user_agent};

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = audit_log)]
pub struct AuditRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub detail: String,
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Persists an audit entry and mirrors it to the log. Audit failures are
/// logged and swallowed so they never fail the request that triggered them.
pub fn record_audit(
    conn: &mut PgConnection,
    user: Option<&AuthUser>,
    headers: &HeaderMap,
    action: &str,
    detail: &str,
) {
    let row = AuditRow {
        id: Uuid::new_v4(),
        user_id: user.map(|u| u.id),
        action: action.to_string(),
        detail: detail.to_string(),
        ip: client_ip(headers),
        user_agent: user_agent(headers),
        created_at: Utc::now(),
    };

    if let Err(e) = diesel::insert_into(audit_log::table).values(&row).execute(conn) {
        log::error!("failed to persist audit entry action={action}: {e}");
    }

    let username = user.map(|u| u.username.as_str()).unwrap_or("anonymous");
    log::info!(
        "AUDIT: user={username} action={action} ip={} - {}",
        row.ip,
        if detail.is_empty() { "(no detail)" } else { detail },
    );
}

use chrono::Utc;
use sqlx::{PgPool, types::ipnetwork};

use crate::{
    error::Result,
    models::{AuditEntry, AuthEvent},
};

/// Writes an authentication event to the audit table and the `audit` log
/// target.
pub async fn record(db: &PgPool, entry: &AuditEntry) -> Result<()> {
    let ip = entry
        .ip_address
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match entry.event {
        AuthEvent::LoginFailed => tracing::warn!(
            target: "audit",
            event = %entry.event,
            username = %entry.username,
            ip = %ip,
            "failed login attempt"
        ),
        _ => tracing::info!(
            target: "audit",
            event = %entry.event,
            username = %entry.username,
            ip = %ip,
            "authentication event"
        ),
    }

    let ip_network = entry.ip_address.map(ipnetwork::IpNetwork::from);

    sqlx::query(
        r#"
        INSERT INTO auth_audit_log (event, username, user_id, ip_address, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.event)
    .bind(&entry.username)
    .bind(entry.user_id)
    .bind(ip_network)
    .bind(entry.created_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Like [`record`], but a failed insert is logged instead of returned.
pub async fn record_quietly(db: &PgPool, entry: AuditEntry) {
    if let Err(e) = record(db, &entry).await {
        tracing::error!("Failed to write audit entry for {}: {}", entry.username, e);
    }
}

pub fn entry(
    event: AuthEvent,
    username: &str,
    user_id: Option<uuid::Uuid>,
    ip_address: Option<std::net::IpAddr>,
) -> AuditEntry {
    AuditEntry {
        event,
        username: username.to_string(),
        user_id,
        ip_address,
        created_at: Utc::now(),
    }
}

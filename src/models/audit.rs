use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_event", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    Login,
    LoginFailed,
    Logout,
    Signup,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthEvent::Login => "login",
            AuthEvent::LoginFailed => "login_failed",
            AuthEvent::Logout => "logout",
            AuthEvent::Signup => "signup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub event: AuthEvent,
    pub username: String,
    pub user_id: Option<uuid::Uuid>,
    pub ip_address: Option<std::net::IpAddr>,
    pub created_at: DateTime<Utc>,
}

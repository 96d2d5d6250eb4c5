use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// DB row struct for `user_sessions`. Rows are never deleted — revocation
/// flips `is_active` so the audit trail survives.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub session_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub login_role: String,
    pub ip_address: String,
    pub user_agent: String,
    pub device_fingerprint: String,
    pub device_type: String,
    pub browser: String,
    pub operating_system: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_suspicious: bool,
    pub flagged_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What a user sees when listing their own sessions — token material stays
/// server-side.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: i64,
    pub login_role: String,
    pub ip_address: String,
    pub device_type: String,
    pub browser: String,
    pub operating_system: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_suspicious: bool,
}

impl From<Session> for SessionInfo {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            login_role: s.login_role,
            ip_address: s.ip_address,
            device_type: s.device_type,
            browser: s.browser,
            operating_system: s.operating_system,
            last_activity: s.last_activity,
            created_at: s.created_at,
            is_suspicious: s.is_suspicious,
        }
    }
}

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::session::Session;
use crate::services::device::DeviceMetadata;

/// Fields for a new session row; token material is filled in by the gateway.
pub struct NewSession {
    pub user_id: i64,
    pub session_token: String,
    pub refresh_token: String,
    pub login_role: String,
    pub ip_address: String,
    pub user_agent: String,
    pub device: DeviceMetadata,
    pub expires_at: DateTime<Utc>,
}

/// Durable record of issued sessions. Revocation flips `is_active`; rows are
/// kept for the audit trail. All lookups filter on
/// `is_active AND expires_at > NOW()` so an expired or revoked session is
/// indistinguishable from a missing one.
#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a session row and bind its access token in one transaction.
    ///
    /// The token embeds the row id, so it can only be minted after the
    /// INSERT returns one; `make_token` runs between the INSERT and the
    /// UPDATE that stores the final token. If either statement or the
    /// closure fails, the whole row rolls back — no active session is ever
    /// left behind with an unreachable placeholder token.
    pub async fn create_bound<F>(&self, new: &NewSession, make_token: F) -> anyhow::Result<(i64, String)>
    where
        F: FnOnce(i64) -> anyhow::Result<String>,
    {
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO user_sessions
                (user_id, session_token, refresh_token, login_role, ip_address, user_agent,
                 device_fingerprint, device_type, browser, operating_system, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
        )
        .bind(new.user_id)
        .bind(&new.session_token)
        .bind(&new.refresh_token)
        .bind(&new.login_role)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(&new.device.fingerprint)
        .bind(&new.device.device_type)
        .bind(&new.device.browser)
        .bind(&new.device.operating_system)
        .bind(new.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        let token = make_token(id)?;
        sqlx::query("UPDATE user_sessions SET session_token = $2 WHERE id = $1")
            .bind(id)
            .bind(&token)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok((id, token))
    }

    /// Swap in a freshly issued access token and rotated refresh token as a
    /// single statement — the old pair stops resolving atomically.
    pub async fn refresh_rotate(
        &self,
        id: i64,
        session_token: &str,
        refresh_token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE user_sessions SET session_token = $2, refresh_token = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(session_token)
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a live session by its access token, touching `last_activity`
    /// in the same statement — the lookup and the touch are one atomic step.
    /// Touching extends observed activity only, never `expires_at`.
    pub async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "UPDATE user_sessions SET last_activity = NOW()
             WHERE session_token = $1 AND is_active = TRUE AND expires_at > NOW()
             RETURNING *",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn find_by_refresh_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "UPDATE user_sessions SET last_activity = NOW()
             WHERE refresh_token = $1 AND is_active = TRUE AND expires_at > NOW()
             RETURNING *",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Idempotent — deactivating an already-inactive session is a no-op.
    pub async fn deactivate(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk revocation for security events (logout-all, password change).
    pub async fn deactivate_all_for_user(&self, user_id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_active_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions
             WHERE user_id = $1 AND is_active = TRUE AND expires_at > NOW()
             ORDER BY last_activity DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM user_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Marks the session without deactivating it — whether a suspicious
    /// session keeps working is a policy decision made elsewhere.
    pub async fn flag_suspicious(&self, id: i64, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE user_sessions SET is_suspicious = TRUE, flagged_reason = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lazily deactivate everything past its expiry. Run periodically; may
    /// race an in-flight authentication, which then fails closed.
    pub async fn sweep_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE
             WHERE expires_at < NOW() AND is_active = TRUE",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

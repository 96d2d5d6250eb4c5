use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::{
    auth::{AuthenticatedUser, Claims, LoginResponse},
    user::{User, UserRole},
};
use crate::services::{
    device,
    password::verify_password,
    session::{NewSession, SessionStore},
    token::TokenCodec,
};

/// Typed authentication failures. Collapsed to generic 401/403/429 envelopes
/// at the HTTP boundary — the variants exist for logs and tests, never for
/// the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("session not found")]
    SessionNotFound,
    #[error("session inactive")]
    SessionInactive,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("rate limited")]
    RateLimited,
    #[error("persistence failure")]
    Persistence(#[source] anyhow::Error),
}

/// Request context captured at login and stored on the session row.
#[derive(Debug, Clone)]
pub struct LoginContext {
    pub ip_address: String,
    pub user_agent: String,
}

/// Orchestrates token issuance, verification, session binding and role
/// checks. Verification is an explicit two-step pipeline: stateless
/// signature check first, then the server-side session cross-check that
/// makes revocation effective.
pub struct AuthGateway {
    codec: TokenCodec,
    sessions: SessionStore,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl AuthGateway {
    pub fn new(config: &Config, pool: PgPool) -> Self {
        Self {
            codec: TokenCodec::new(config.token_secret.clone()),
            sessions: SessionStore::new(pool),
            access_ttl_seconds: config.access_token_ttl_seconds as i64,
            refresh_ttl_seconds: config.refresh_token_ttl_seconds as i64,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Verify credentials and issue a session + token pair. All credential
    /// failures surface as the same generic error.
    pub async fn login(
        &self,
        pool: &PgPool,
        username: &str,
        password: &str,
        requested_role: Option<UserRole>,
        ctx: &LoginContext,
    ) -> anyhow::Result<LoginResponse> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND is_active = TRUE",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Invalid credentials"))?;

        if !verify_password(password, &user.password_hash) {
            anyhow::bail!("Invalid credentials");
        }

        let account_role: UserRole = user.role.parse()?;
        let login_role = match requested_role {
            // Admins may act as any role; everyone else acts as their own.
            Some(role) if role == account_role || account_role == UserRole::Admin => role,
            Some(_) => anyhow::bail!("Invalid credentials"),
            None => account_role,
        };

        self.issue_session(user.id, &user.username, login_role, ctx)
            .await
    }

    /// Create a session row, then issue the signed token embedding its id.
    /// The row stores the current access token so revocation and refresh
    /// both invalidate the old token immediately.
    pub async fn issue_session(
        &self,
        user_id: i64,
        username: &str,
        login_role: UserRole,
        ctx: &LoginContext,
    ) -> anyhow::Result<LoginResponse> {
        let now = Utc::now();
        let exp = now.timestamp() + self.access_ttl_seconds;
        let refresh_token = opaque_token(64);
        let new = NewSession {
            user_id,
            // Placeholder until the signed token exists; the transaction in
            // create_bound replaces it before the row becomes visible.
            session_token: opaque_token(48),
            refresh_token: refresh_token.clone(),
            login_role: login_role.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            device: device::derive(&ctx.ip_address, &ctx.user_agent),
            expires_at: now + Duration::seconds(self.refresh_ttl_seconds),
        };
        let (_, access_token) = self
            .sessions
            .create_bound(&new, |session_id| {
                let claims = Claims {
                    user_id,
                    username: username.to_string(),
                    login_role,
                    session_id: Some(session_id),
                    iat: now.timestamp(),
                    exp,
                };
                Ok(self.codec.issue(&claims)?)
            })
            .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user_id,
            username: username.to_string(),
            login_role,
            expires_at: exp,
        })
    }

    /// Two-step verification: signature/expiry first, then the session
    /// cross-check. A revoked session invalidates an otherwise
    /// cryptographically valid token. Fails closed on any ambiguity.
    pub async fn authenticate(&self, raw_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.codec.verify(raw_token)?;

        if let Some(session_id) = claims.session_id {
            let session = self
                .sessions
                .find_by_token(raw_token)
                .await
                .map_err(AuthError::Persistence)?;
            match session {
                Some(s) if s.id == session_id && s.user_id == claims.user_id => {}
                _ => {
                    // Distinguish revoked from unknown for the logs only.
                    let err = match self.sessions.find_by_id(session_id).await {
                        Ok(Some(s)) if !s.is_active || s.expires_at <= Utc::now() => {
                            AuthError::SessionInactive
                        }
                        _ => AuthError::SessionNotFound,
                    };
                    debug!(user_id = claims.user_id, session_id, "rejected token: {err}");
                    return Err(err);
                }
            }
        }

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.login_role,
            session_id: claims.session_id,
        })
    }

    /// Consume a refresh token: rotate it, re-issue the access token on the
    /// same session row. Session expiry is not extended — when the session
    /// lapses the user logs in again.
    pub async fn refresh(
        &self,
        pool: &PgPool,
        refresh_token: &str,
    ) -> Result<LoginResponse, AuthError> {
        let session = self
            .sessions
            .find_by_refresh_token(refresh_token)
            .await
            .map_err(AuthError::Persistence)?
            .ok_or(AuthError::SessionNotFound)?;

        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(session.user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AuthError::Persistence(e.into()))?
        .ok_or(AuthError::SessionInactive)?;

        let login_role: UserRole = session
            .login_role
            .parse()
            .map_err(|_| AuthError::SessionInactive)?;

        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            login_role,
            session_id: Some(session.id),
            iat: now.timestamp(),
            exp: now.timestamp() + self.access_ttl_seconds,
        };
        let access_token = self.codec.issue(&claims)?;
        let new_refresh = opaque_token(64);

        self.sessions
            .refresh_rotate(session.id, &access_token, &new_refresh)
            .await
            .map_err(AuthError::Persistence)?;

        Ok(LoginResponse {
            access_token,
            refresh_token: new_refresh,
            user_id: user.id,
            username: user.username,
            login_role,
            expires_at: claims.exp,
        })
    }

    pub async fn logout(&self, session_id: i64) -> anyhow::Result<()> {
        self.sessions.deactivate(session_id).await
    }

    pub async fn logout_all(&self, user_id: i64) -> anyhow::Result<u64> {
        self.sessions.deactivate_all_for_user(user_id).await
    }

    pub fn has_role(required: UserRole, user: &AuthenticatedUser) -> bool {
        user.role.permits(required)
    }

    pub fn has_any_role(required: &[UserRole], user: &AuthenticatedUser) -> bool {
        user.role.permits_any(required)
    }
}

/// Opaque random token material, alphanumeric to stay header- and URL-safe.
fn opaque_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_tokens_are_unique_and_sized() {
        let a = opaque_token(64);
        let b = opaque_token(64);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn gateway_role_helpers_delegate_with_admin_bypass() {
        let admin = AuthenticatedUser {
            user_id: 1,
            username: "root".into(),
            role: UserRole::Admin,
            session_id: None,
        };
        let buyer = AuthenticatedUser {
            user_id: 2,
            username: "alice".into(),
            role: UserRole::Buyer,
            session_id: None,
        };
        assert!(AuthGateway::has_role(UserRole::Seller, &admin));
        assert!(!AuthGateway::has_role(UserRole::Seller, &buyer));
        assert!(AuthGateway::has_role(UserRole::Buyer, &buyer));
        assert!(AuthGateway::has_any_role(&[UserRole::Seller, UserRole::Buyer], &buyer));
        assert!(!AuthGateway::has_any_role(&[UserRole::Seller], &buyer));
    }

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            token_secret: "test-secret".to_string(),
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: 86400,
            rate_limit_max_attempts: 5,
            rate_limit_window_seconds: 300,
            session_sweep_interval_seconds: 3600,
            host: String::new(),
            port: 0,
        }
    }

    async fn seed_user(pool: &PgPool, username: &str, role: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind(bcrypt::hash("hunter2", 4).unwrap())
        .bind(role)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn test_ctx() -> LoginContext {
        LoginContext {
            ip_address: "1.2.3.4".to_string(),
            user_agent: "test-agent".to_string(),
        }
    }

    #[sqlx::test]
    async fn revoked_session_defeats_a_valid_signature(pool: PgPool) {
        let gateway = AuthGateway::new(&test_config(), pool.clone());
        let user_id = seed_user(&pool, "alice", "buyer").await;
        let issued = gateway
            .issue_session(user_id, "alice", UserRole::Buyer, &test_ctx())
            .await
            .unwrap();

        let authed = gateway.authenticate(&issued.access_token).await.unwrap();
        assert_eq!(authed.user_id, user_id);
        assert_eq!(authed.role, UserRole::Buyer);
        let session_id = authed.session_id.unwrap();

        gateway.logout(session_id).await.unwrap();

        // The signature still verifies in isolation — revocation lives in
        // server-side state, not in the token
        let codec = crate::services::token::TokenCodec::new("test-secret");
        assert!(codec.verify(&issued.access_token).is_ok());
        assert!(matches!(
            gateway.authenticate(&issued.access_token).await,
            Err(AuthError::SessionInactive)
        ));
    }

    #[sqlx::test]
    async fn refresh_rotates_and_retires_the_old_pair(pool: PgPool) {
        let gateway = AuthGateway::new(&test_config(), pool.clone());
        let user_id = seed_user(&pool, "alice", "buyer").await;
        let issued = gateway
            .issue_session(user_id, "alice", UserRole::Buyer, &test_ctx())
            .await
            .unwrap();

        let renewed = gateway.refresh(&pool, &issued.refresh_token).await.unwrap();
        assert_ne!(renewed.access_token, issued.access_token);
        assert_ne!(renewed.refresh_token, issued.refresh_token);
        assert_eq!(renewed.login_role, UserRole::Buyer);

        // The new access token resolves; the old pair is dead
        let authed = gateway.authenticate(&renewed.access_token).await.unwrap();
        assert_eq!(authed.user_id, user_id);
        assert!(gateway.authenticate(&issued.access_token).await.is_err());
        assert!(matches!(
            gateway.refresh(&pool, &issued.refresh_token).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[sqlx::test]
    async fn login_validates_credentials_and_requested_role(pool: PgPool) {
        let gateway = AuthGateway::new(&test_config(), pool.clone());
        seed_user(&pool, "alice", "buyer").await;
        seed_user(&pool, "root", "admin").await;
        let ctx = test_ctx();

        let response = gateway
            .login(&pool, "alice", "hunter2", None, &ctx)
            .await
            .unwrap();
        assert_eq!(response.login_role, UserRole::Buyer);

        assert!(gateway.login(&pool, "alice", "wrong", None, &ctx).await.is_err());
        assert!(gateway.login(&pool, "nobody", "hunter2", None, &ctx).await.is_err());
        // A buyer cannot act as a seller
        assert!(gateway
            .login(&pool, "alice", "hunter2", Some(UserRole::Seller), &ctx)
            .await
            .is_err());
        // An admin may act as any role
        let acting = gateway
            .login(&pool, "root", "hunter2", Some(UserRole::Seller), &ctx)
            .await
            .unwrap();
        assert_eq!(acting.login_role, UserRole::Seller);
    }
}

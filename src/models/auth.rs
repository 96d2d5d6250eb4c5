use serde::{Deserialize, Serialize};

use super::user::UserRole;

/// Claims embedded in the signed access token. Key names are part of the
/// wire contract shared with existing clients — do not rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub login_role: UserRole,
    /// Links the token to a `user_sessions` row; a token without one is
    /// verified by signature alone and cannot be revoked server-side.
    pub session_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

/// Extracted from a validated token + live session — available via axum
/// extractors in protected handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
    pub session_id: Option<i64>,
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Role to act as for this session. Must match the account's role;
    /// admins may act as any role.
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
    pub username: String,
    pub login_role: UserRole,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct FlagSessionRequest {
    pub reason: String,
}

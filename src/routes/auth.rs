use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::{AuthenticatedUser, ChangePasswordRequest, LoginRequest, RefreshTokenRequest},
        response::{fail, internal_error, ok, ok_message, unauthorized},
        user::User,
    },
    services::{
        auth::LoginContext,
        password::{hash_password, verify_password},
    },
    AppState,
};

fn client_ip(h: &HeaderMap) -> String {
    h.get("x-real-ip").and_then(|v| v.to_str().ok())
        .or_else(|| h.get("x-forwarded-for").and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next()).map(|s| s.trim()))
        .unwrap_or("unknown")
        .to_string()
}

fn user_agent(h: &HeaderMap) -> String {
    h.get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let ctx = LoginContext {
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };

    // Keyed by username + IP so an attacker cannot lock a victim out from
    // elsewhere, and a NAT'd office cannot burn one shared budget.
    let rate_key = format!("login:{}:{}", body.username.to_lowercase(), ctx.ip_address);
    let allowed = state
        .rate_limiter
        .check_and_record(
            &rate_key,
            state.config.rate_limit_max_attempts,
            state.config.rate_limit_window_seconds,
        )
        .await
        .unwrap_or(false);
    if !allowed {
        return Err(fail(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Try again later.",
        ));
    }

    match state
        .gateway
        .login(&state.db, &body.username, &body.password, body.role, &ctx)
        .await
    {
        Ok(response) => Ok(ok(serde_json::to_value(response).unwrap_or_default())),
        Err(_) => Err(fail(StatusCode::UNAUTHORIZED, "Invalid credentials")),
    }
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    state
        .gateway
        .refresh(&state.db, &body.refresh_token)
        .await
        .map(|response| ok(serde_json::to_value(response).unwrap_or_default()))
        .map_err(|_| unauthorized())
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(session_id) = user.session_id {
        state
            .gateway
            .logout(session_id)
            .await
            .map_err(internal_error)?;
    }
    Ok(ok_message("Logged out"))
}

pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let revoked = state
        .gateway
        .logout_all(user.user_id)
        .await
        .map_err(internal_error)?;
    Ok(ok(json!({ "revoked_sessions": revoked })))
}

pub async fn me(user: AuthenticatedUser) -> (StatusCode, Json<Value>) {
    ok(json!({
        "user_id": user.user_id,
        "username": user.username,
        "login_role": user.role,
        "session_id": user.session_id,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let account = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND is_active = TRUE",
    )
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(internal_error)?
    .ok_or_else(unauthorized)?;

    if !verify_password(&body.current_password, &account.password_hash) {
        return Err(fail(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let new_hash = hash_password(&body.new_password)
        .map_err(internal_error)?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.user_id)
        .bind(&new_hash)
        .execute(&state.db)
        .await
        .map_err(internal_error)?;

    // Security event: every session dies, including the one making this
    // request. The client re-authenticates with the new password. A failed
    // revocation must fail the request — old tokens staying alive after a
    // password change would be a silent fail-open.
    state
        .gateway
        .logout_all(user.user_id)
        .await
        .map_err(internal_error)?;

    Ok(ok_message("Password changed. Please log in again."))
}

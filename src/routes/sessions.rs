use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::auth::AdminUser,
    models::{
        auth::{AuthenticatedUser, FlagSessionRequest},
        response::{fail, internal_error, ok, ok_message},
        session::SessionInfo,
        user::UserRole,
    },
    AppState,
};

/// The caller's active sessions, most recently used first.
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let sessions = state
        .gateway
        .sessions()
        .list_active_for_user(user.user_id)
        .await
        .map_err(internal_error)?;
    let infos: Vec<SessionInfo> = sessions.into_iter().map(SessionInfo::from).collect();
    Ok(ok(serde_json::to_value(infos).unwrap_or_default()))
}

/// Revoke one session by id. Users may revoke their own; admins any.
pub async fn revoke_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let session = state
        .gateway
        .sessions()
        .find_by_id(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Session not found"))?;

    if session.user_id != user.user_id && user.role != UserRole::Admin {
        // Do not reveal that the session exists
        return Err(fail(StatusCode::NOT_FOUND, "Session not found"));
    }

    state
        .gateway
        .sessions()
        .deactivate(id)
        .await
        .map_err(internal_error)?;
    Ok(ok_message("Session revoked"))
}

/// Admin: mark a session suspicious with a reason. Flagging does not revoke.
pub async fn flag_session(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<FlagSessionRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    state
        .gateway
        .sessions()
        .find_by_id(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Session not found"))?;

    state
        .gateway
        .sessions()
        .flag_suspicious(id, &body.reason)
        .await
        .map_err(internal_error)?;
    Ok(ok_message("Session flagged"))
}

/// Admin: run the expiry sweep on demand (also runs in the background).
pub async fn sweep_sessions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let count = state
        .gateway
        .sessions()
        .sweep_expired()
        .await
        .map_err(internal_error)?;
    Ok(ok(json!({ "deactivated": count })))
}

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Confirms the process is up and the session store is reachable.
/// Unauthenticated.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_sessions WHERE is_active = TRUE")
        .fetch_one(&state.db)
        .await
    {
        Ok(active) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "db": "connected", "active_sessions": active })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "db": "unavailable" })),
            )
        }
    }
}

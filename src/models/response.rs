use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

/// Standard response envelope shared with the existing clients:
/// success → `{success: true, timestamp, status, data?, message?}`
/// failure → `{success: false, message, timestamp, status}`.
pub fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "timestamp": Utc::now().to_rfc3339(),
            "status": 200,
            "data": data,
        })),
    )
}

pub fn ok_message(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "timestamp": Utc::now().to_rfc3339(),
            "status": 200,
            "message": message,
        })),
    )
}

pub fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "success": false,
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
        })),
    )
}

/// 401 with the generic message — all authentication failures collapse to
/// this so callers learn nothing about why verification failed.
pub fn unauthorized() -> (StatusCode, Json<Value>) {
    fail(StatusCode::UNAUTHORIZED, "Authentication required")
}

/// 403 with the generic message for authenticated-but-not-authorized.
pub fn forbidden() -> (StatusCode, Json<Value>) {
    fail(StatusCode::FORBIDDEN, "Insufficient permissions")
}

/// 500 with a fixed message. The underlying error goes to the log only —
/// response bodies never carry sqlx/anyhow detail.
pub fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    tracing::error!("request failed: {e}");
    fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let (status, Json(body)) = ok(json!({ "id": 7 }));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], 200);
        assert_eq!(body["data"]["id"], 7);
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn failure_envelope_shape() {
        let (status, Json(body)) = unauthorized();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 401);
        assert_eq!(body["message"], "Authentication required");

        let (status, Json(body)) = forbidden();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient permissions");
    }

    #[test]
    fn internal_errors_never_leak_detail() {
        let leaky = "connection refused: postgres://svc:s3cret@db:5432/auth (SQLSTATE 08006)";
        let (status, Json(body)) = internal_error(leaky);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(!body.to_string().contains("s3cret"));
        assert!(!body.to_string().contains("SQLSTATE"));
    }
}

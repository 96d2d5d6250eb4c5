use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;

use crate::models::auth::AuthenticatedUser;
use crate::models::response::{fail, forbidden, unauthorized};
use crate::models::user::UserRole;
use crate::services::auth::AuthGateway;

/// Extract the token from an `Authorization: Bearer <token>` header.
/// Absence or a malformed header yields `None`, routed to 401.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
}

/// Runs the full authentication pipeline before any handler logic: bearer
/// extraction, signature verification, session cross-check. Every failure is
/// the same generic 401 envelope.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .map(str::to_owned)
            .ok_or_else(unauthorized)?;

        let gateway = parts
            .extensions
            .get::<Arc<AuthGateway>>()
            .cloned()
            .ok_or_else(|| {
                fail(StatusCode::INTERNAL_SERVER_ERROR, "Auth gateway not configured")
            })?;

        gateway
            .authenticate(&token)
            .await
            .map_err(|_| unauthorized())
    }
}

/// Extractor for admin-only handlers: authenticates, then rejects anyone
/// without the admin role with a generic 403.
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(forbidden());
        }
        Ok(AdminUser(user))
    }
}

/// Handler-level role gate for routes open to one specific role
/// (plus admins, who bypass every specific-role check).
pub fn require_role(
    user: &AuthenticatedUser,
    required: UserRole,
) -> Result<(), (StatusCode, Json<Value>)> {
    if user.role.permits(required) {
        Ok(())
    } else {
        Err(forbidden())
    }
}

//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use pharmacheck_core::{PortError, Role, User};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::web::state::AppState;

/// The caller behind a validated bearer token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    /// Fails with 403 unless the caller has `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.user.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("{} role required", role.as_str())))
        }
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves a bearer token to its user. Expired, unknown or orphaned sessions are 401.
async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let user_id = state
        .users
        .validate_auth_session(token)
        .await
        .map_err(|e| {
            match e {
                PortError::Unauthorized => warn!("Rejected expired or unknown session token"),
                other => error!("Failed to validate auth session: {:?}", other),
            }
            ApiError::Unauthorized
        })?;

    // A session for a deleted user is treated as invalid
    state.users.get_user(user_id).await.map_err(|e| {
        warn!("Session references an unknown user: {:?}", e);
        ApiError::Unauthorized
    })
}

/// The caller of a public route, if it sent a valid bearer token.
/// An invalid token makes the request anonymous rather than failing it.
pub async fn optional_caller(state: &AppState, headers: &HeaderMap) -> Option<AuthUser> {
    let token = bearer_token(headers)?;
    let user = authenticate(state, token).await.ok()?;
    Some(AuthUser {
        user,
        token: token.to_string(),
    })
}

/// Middleware that validates the bearer token and loads the user.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If invalid, expired or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token
    let token = bearer_token(req.headers())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // 2. Validate the session and load the user
    let user = authenticate(&state, &token).await?;

    // 3. Insert the caller into request extensions and continue
    req.extensions_mut().insert(AuthUser { user, token });
    Ok(next.run(req).await)
}

//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, the current user and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use pharmacheck_core::{AuthSession, PortError, Role, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// `PATIENT` (default) or `DOCTOR`.
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email.
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The public fields of an account.
#[derive(Serialize, ToSchema)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[schema(value_type = String, example = "PATIENT")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserProfile,
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserProfile,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| ApiError::Internal(format!("Failed to parse password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Issues a new bearer session for `user_id`.
async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let token = Uuid::new_v4().to_string();
    let ttl = Duration::from_std(state.config.auth_session_ttl)
        .map_err(|e| ApiError::Internal(format!("Invalid session lifetime: {}", e)))?;
    let session = AuthSession {
        token: token.clone(),
        user_id,
        expires_at: Utc::now() + ttl,
    };
    state.users.create_auth_session(&session).await?;
    Ok(token)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new account and sign it in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Missing fields or invalid role", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(username), Some(email), Some(password)) = (
        required(req.username),
        required(req.email),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Username, email, and password are required".to_string(),
        ));
    };

    let role = match req.role.as_deref() {
        None => Role::Patient,
        Some(raw) => raw.parse::<Role>().map_err(ApiError::Validation)?,
    };

    let password_hash = hash_password(&password)?;
    let user = state
        .users
        .create_user(&username, &email, &password_hash, role)
        .await?;
    let token = open_session(&state, user.user_id).await?;

    info!(user_id = %user.user_id, role = role.as_str(), "registered user");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user: UserProfile::from(user),
            token,
        }),
    ))
}

/// POST /auth/login - Login with a username or email
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (Some(login), Some(password)) = (
        required(req.username),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Username and password are required".to_string(),
        ));
    };

    // 1. Look the account up; an unknown login is indistinguishable from a bad password
    let credentials = match state.users.get_credentials(&login).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => {
            warn!("Login attempt for unknown account");
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => {
            error!("Failed to get user: {:?}", e);
            return Err(e.into());
        }
    };

    // 2. Verify the password
    if !verify_password(&password, &credentials.password_hash)? {
        warn!(user_id = %credentials.user.user_id, "Login attempt with a wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    // 3. Issue the session
    let token = open_session(&state, credentials.user.user_id).await?;
    Ok(Json(AuthResponse {
        success: true,
        user: UserProfile::from(credentials.user),
        token,
    }))
}

/// GET /auth/me - The authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Authentication required", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me_handler(Extension(caller): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserProfile::from(caller.user),
    })
}

/// POST /auth/logout - Invalidate the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "Authentication required", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.users.delete_auth_session(&caller.token).await?;
    Ok(MessageResponse::new("Logged out successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(required(Some("  ".into())), None);
        assert_eq!(required(Some(" pat ".into())), Some("pat".to_string()));
        assert_eq!(required(None), None);
    }
}

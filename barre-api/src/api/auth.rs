//! Signup, login, and bearer-token middleware

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Json,
};
use barre_common::db::models::{Role, User};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Authenticated caller, inserted as a request extension by
/// [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_guid: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    fn from_user(user: &User) -> Self {
        AuthUser {
            user_guid: user.guid,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Reject unless the caller is an admin. For handlers on shared paths
/// where only some methods are admin-only.
pub fn require_admin(auth: &AuthUser) -> ApiResult<()> {
    if auth.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin role required".to_string()))
    }
}

/// Admin or teacher, for studio-staff operations
pub fn require_staff(auth: &AuthUser) -> ApiResult<()> {
    match auth.role {
        Role::Admin | Role::Teacher => Ok(()),
        Role::Customer => Err(ApiError::Forbidden("Staff role required".to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/signup
///
/// Public signup always creates a CUSTOMER account; staff accounts are
/// provisioned out of band.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<Value>> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }

    let user = users::create_user(
        &state.db,
        &email,
        &req.password,
        req.first_name.trim(),
        req.last_name.trim(),
        Role::Customer,
    )
    .await?;

    let token = users::create_session(&state.db, user.guid, state.session_ttl_hours).await?;

    info!("New signup: {}", user.email);
    Ok(Json(json!({ "user": user, "token": token })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let email = req.email.trim().to_lowercase();

    let user = users::verify_credentials(&state.db, &email, &req.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let token = users::create_session(&state.db, user.guid, state.session_ttl_hours).await?;

    Ok(Json(json!({ "user": user, "token": token })))
}

/// Resolve the Authorization bearer token and stash an [`AuthUser`] on the
/// request. Requests without a valid session get 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let user = users::authenticate_token(&state.db, token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(AuthUser::from_user(&user));
    Ok(next.run(request).await)
}

/// Gate a router subtree on the ADMIN role. Runs after [`auth_middleware`]
/// so the extension is present.
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::Internal("Auth middleware not applied".to_string()))?;

    if auth.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }
    Ok(next.run(request).await)
}

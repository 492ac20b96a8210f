//! Class template endpoints
//!
//! Listing and fetching are open to any authenticated user; mutations are
//! admin-only, checked in-handler because the paths are shared.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use barre_common::db::models::{Class, Role};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::{require_admin, AuthUser};
use crate::db::classes;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Admins may pass true to include deactivated classes
    #[serde(default)]
    pub include_inactive: bool,
}

/// GET /api/classes
pub async fn list_classes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let include_inactive = query.include_inactive && auth.role == Role::Admin;
    let classes = classes::list_classes(&state.db, include_inactive).await?;
    Ok(Json(json!({ "classes": classes })))
}

/// GET /api/classes/:id
pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Class>> {
    let class = classes::load_class(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;
    Ok(Json(class))
}

/// POST /api/classes (admin)
pub async fn create_class(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(new): Json<classes::NewClass>,
) -> ApiResult<Json<Class>> {
    require_admin(&auth)?;
    let class = classes::create_class(&state.db, new).await?;
    Ok(Json(class))
}

/// PATCH /api/classes/:id (admin)
pub async fn update_class(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<classes::ClassUpdate>,
) -> ApiResult<Json<Class>> {
    require_admin(&auth)?;
    let class = classes::update_class(&state.db, id, update).await?;
    Ok(Json(class))
}

/// DELETE /api/classes/:id (admin)
///
/// Soft delete: deactivates the class, leaving instances and bookings
/// intact.
pub async fn deactivate_class(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;
    classes::deactivate_class(&state.db, id).await?;
    Ok(Json(json!({ "deactivated": id })))
}

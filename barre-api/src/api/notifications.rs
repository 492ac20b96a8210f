//! Notification feed endpoints

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db::notifications;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<notifications::NotificationFeed>> {
    let feed =
        notifications::list_notifications(&state.db, auth.user_guid, query.unread_only).await?;
    Ok(Json(feed))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    /// Specific notifications to mark; omit to mark the whole feed
    pub guids: Option<Vec<Uuid>>,
}

/// PATCH /api/notifications
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<Value>> {
    let marked =
        notifications::mark_read(&state.db, auth.user_guid, req.guids.as_deref()).await?;
    Ok(Json(json!({ "marked": marked })))
}

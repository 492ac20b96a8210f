//! Attendance marking endpoint

use axum::{extract::State, Extension, Json};
use barre_common::db::models::CheckInMethod;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::{require_staff, AuthUser};
use crate::db::attendance;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    pub booking_guid: Uuid,
    #[serde(default = "default_method")]
    pub check_in_method: CheckInMethod,
    pub notes: Option<String>,
}

fn default_method() -> CheckInMethod {
    CheckInMethod::Manual
}

/// POST /api/attendance (staff)
///
/// Flips the booking to ATTENDED, bumps the lifetime counter, and awards
/// a milestone checkpoint when a threshold is hit.
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<MarkRequest>,
) -> ApiResult<Json<attendance::AttendanceOutcome>> {
    require_staff(&auth)?;
    let outcome = attendance::mark_attended(
        &state.db,
        req.booking_guid,
        req.check_in_method,
        req.notes,
    )
    .await?;
    Ok(Json(outcome))
}

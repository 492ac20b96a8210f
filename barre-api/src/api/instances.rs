//! Class instance schedule endpoints

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::{require_admin, AuthUser};
use crate::db::instances;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub class_guid: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub available_only: bool,
}

/// GET /api/class-instances
pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<Value>> {
    let filter = instances::InstanceFilter {
        class_guid: query.class_guid,
        from: query.from,
        to: query.to,
        available_only: query.available_only,
    };
    let instances = instances::list_instances(&state.db, &filter).await?;
    Ok(Json(json!({ "instances": instances })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Limit generation to one class; all active classes when absent
    pub class_guid: Option<Uuid>,
    /// Forward horizon in whole weeks
    pub weeks: Option<i64>,
}

/// POST /api/class-instances/generate (admin)
///
/// Idempotent: re-running over an overlapping window only fills gaps.
pub async fn generate_instances(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<instances::GenerationSummary>> {
    require_admin(&auth)?;
    let weeks = req.weeks.unwrap_or(instances::DEFAULT_WINDOW_DAYS / 7);
    let summary = instances::generate_weekly_instances(&state.db, req.class_guid, weeks).await?;
    Ok(Json(summary))
}

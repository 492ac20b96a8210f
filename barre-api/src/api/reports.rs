//! Progress report endpoints (admin)

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use barre_common::db::models::{ProgressReport, ReportType};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db::{customers, reports};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub customer_guid: Option<Uuid>,
}

/// GET /api/admin/progress-reports
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let reports = reports::list_reports(&state.db, query.customer_guid).await?;
    Ok(Json(json!({ "reports": reports })))
}

/// GET /api/admin/progress-reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProgressReport>> {
    let report = reports::load_report(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub customer_guid: Uuid,
    pub report_type: ReportType,
    pub title: String,
    pub content: String,
    #[serde(default = "empty_goals")]
    pub goals: serde_json::Value,
}

fn empty_goals() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// POST /api/admin/progress-reports
///
/// The report is created synchronously; AI analysis is attached afterward
/// and its failure never fails the request.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<Json<ProgressReport>> {
    let customer = customers::load_customer(&state.db, req.customer_guid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    let mut report = reports::create_report(
        &state.db,
        reports::NewReport {
            customer_guid: req.customer_guid,
            teacher_user_guid: auth.user_guid,
            report_type: req.report_type,
            title: req.title,
            content: req.content,
            goals: req.goals,
        },
    )
    .await?;

    if let Some(analysis) = state.ai.analyze_progress(&report, &customer).await {
        match reports::attach_ai_analysis(&state.db, report.guid, &analysis).await {
            Ok(()) => report.ai_analysis = Some(analysis),
            Err(e) => warn!("Failed to store AI analysis for {}: {}", report.guid, e),
        }
    }

    Ok(Json(report))
}

//! Admin back-office endpoints
//!
//! Everything under /api/admin is already gated by the admin middleware.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use barre_common::db::models::{MembershipStatus, TransactionType};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db::{attendance, customers, ledger, stats, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    pub status: Option<MembershipStatus>,
    pub search: Option<String>,
}

/// GET /api/admin/customers
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = customers::CustomerFilter {
        status: query.status,
        search: query.search,
    };
    let customers = customers::list_customers(&state.db, &filter).await?;
    Ok(Json(json!({ "customers": customers })))
}

/// GET /api/admin/customers/:id
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let customer = customers::load_customer(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    let user = users::load_user(&state.db, customer.user_guid).await?;
    let transactions = ledger::list_transactions(&state.db, id, 50).await?;
    let checkpoints = attendance::list_checkpoints(&state.db, id).await?;
    let attendance_rate = stats::customer_attendance_rate(&state.db, id).await?;

    Ok(Json(json!({
        "customer": customer,
        "user": user,
        "transactions": transactions,
        "checkpoints": checkpoints,
        "attendanceRate": attendance_rate,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    pub membership_type: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    /// Present-but-null clears the renewal date; absent leaves it alone
    #[serde(default, deserialize_with = "double_option")]
    pub renewal_date: Option<Option<NaiveDate>>,
}

/// Distinguish a missing field (outer None) from an explicit null
/// (Some(None))
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// PATCH /api/admin/customers/:id
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MembershipRequest>,
) -> ApiResult<Json<Value>> {
    let update = customers::MembershipUpdate {
        membership_type: req.membership_type,
        membership_status: req.membership_status,
        renewal_date: req.renewal_date,
    };
    let customer = customers::update_membership(&state.db, id, &update).await?;
    Ok(Json(json!({ "customer": customer })))
}

#[derive(Debug, Deserialize)]
pub struct CreditAdjustment {
    /// Signed delta; positive grants, negative revokes
    pub amount: i64,
    pub notes: Option<String>,
}

/// POST /api/admin/customers/:id/credits
///
/// Admin adjustments may push a balance negative; the ledger records the
/// acting admin.
pub async fn adjust_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreditAdjustment>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.begin().await.map_err(barre_common::Error::from)?;
    let record = ledger::apply_credit_delta(
        &mut tx,
        id,
        req.amount,
        TransactionType::AdminAdjustment,
        req.notes,
        Some(auth.user_guid),
    )
    .await?;
    tx.commit().await.map_err(barre_common::Error::from)?;

    let customer = customers::load_customer(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    Ok(Json(json!({ "customer": customer, "transaction": record })))
}

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<stats::StudioStats>> {
    let stats = stats::studio_stats(&state.db).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    /// classes (default), streak, or attendance
    pub r#type: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/admin/leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Value>> {
    let kind = stats::LeaderboardKind::parse(query.r#type.as_deref())?;
    let entries = stats::leaderboard(&state.db, kind, query.limit.unwrap_or(10)).await?;
    Ok(Json(json!({ "leaderboard": entries })))
}

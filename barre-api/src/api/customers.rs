//! Customer self-service endpoints

use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::api::auth::AuthUser;
use crate::db::{attendance, customers, ledger, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/customers/me
///
/// The customer's profile, membership, recent ledger, and milestones in
/// one payload.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let user = users::load_user(&state.db, auth.user_guid)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let customer = customers::require_customer_by_user(&state.db, auth.user_guid).await?;
    let transactions = ledger::list_transactions(&state.db, customer.guid, 20).await?;
    let checkpoints = attendance::list_checkpoints(&state.db, customer.guid).await?;

    Ok(Json(json!({
        "user": user,
        "customer": customer,
        "recentTransactions": transactions,
        "checkpoints": checkpoints,
    })))
}

/// PATCH /api/customers/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(update): Json<users::ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let user = users::update_profile(&state.db, auth.user_guid, &update).await?;
    Ok(Json(json!({ "user": user })))
}

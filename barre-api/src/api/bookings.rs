//! Booking endpoints

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use barre_common::db::models::{Booking, Role};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db::{bookings, customers, notifications};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// upcoming (default), past, or all
    pub status: Option<String>,
}

/// GET /api/bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let customer = customers::require_customer_by_user(&state.db, auth.user_guid).await?;
    let scope = bookings::BookingScope::parse(query.status.as_deref())?;
    let bookings = bookings::list_bookings(&state.db, customer.guid, scope).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub class_instance_guid: Uuid,
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<Json<Booking>> {
    let customer = customers::require_customer_by_user(&state.db, auth.user_guid).await?;
    let booking =
        bookings::create_booking(&state.db, customer.guid, req.class_instance_guid).await?;

    // Feed entry is best-effort; the booking already committed
    if let Err(err) = notifications::create_notification(
        &state.db,
        auth.user_guid,
        "BOOKING",
        "Booking confirmed",
        &format!("{} credit(s) used", booking.credits_used),
        None,
    )
    .await
    {
        warn!("Failed to record booking notification: {}", err);
    }

    Ok(Json(booking))
}

/// DELETE /api/bookings/:id
///
/// Customers cancel their own bookings; admins may cancel any.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Booking>> {
    let acting_customer = if auth.role == Role::Admin {
        None
    } else {
        Some(
            customers::require_customer_by_user(&state.db, auth.user_guid)
                .await?
                .guid,
        )
    };

    let booking = bookings::cancel_booking(&state.db, id, acting_customer).await?;
    Ok(Json(booking))
}

//! AI class recommendations

use axum::{extract::State, Extension, Json};
use sqlx::Row;

use crate::api::auth::AuthUser;
use crate::db::customers;
use crate::error::ApiResult;
use crate::services::ai_client::{RecommendationInput, RecommendationSet};
use crate::AppState;

/// GET /api/ai/recommendations
///
/// Always answers 200: the AI client falls back to rule-based suggestions
/// when the model is unconfigured or unreachable.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<RecommendationSet>> {
    let customer = customers::require_customer_by_user(&state.db, auth.user_guid).await?;

    let recent_rows = sqlx::query(
        "SELECT DISTINCT c.name FROM attendance a
         JOIN class_instances i ON i.guid = a.class_instance_guid
         JOIN classes c ON c.guid = i.class_guid
         WHERE a.customer_guid = ?
         ORDER BY a.attended_at DESC LIMIT 5",
    )
    .bind(customer.guid.to_string())
    .fetch_all(&state.db)
    .await
    .map_err(barre_common::Error::from)?;

    let available_rows = sqlx::query(
        "SELECT DISTINCT c.name FROM classes c
         JOIN class_instances i ON i.class_guid = c.guid
         WHERE c.is_active = 1 AND i.status = 'scheduled'
           AND i.scheduled_start_time > ?
         ORDER BY c.name",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .fetch_all(&state.db)
    .await
    .map_err(barre_common::Error::from)?;

    let user = crate::db::users::load_user(&state.db, auth.user_guid).await?;

    let input = RecommendationInput {
        first_name: user.map(|u| u.first_name).unwrap_or_default(),
        total_classes_attended: customer.total_classes_attended,
        credits_remaining: customer.credits_remaining,
        recent_class_names: recent_rows.iter().map(|row| row.get("name")).collect(),
        available_class_names: available_rows.iter().map(|row| row.get("name")).collect(),
    };

    let set = state.ai.generate_recommendations(&input).await;
    Ok(Json(set))
}

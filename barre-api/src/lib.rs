//! barre-api library - HTTP service for the Barre booking platform

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod db;
pub mod error;
pub mod services;

use services::ai_client::AiClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Hours before issued session tokens expire
    pub session_ttl_hours: i64,
    /// AI text-generation client (fallbacks when unconfigured)
    pub ai: AiClient,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, session_ttl_hours: i64, ai: AiClient) -> Self {
        Self {
            db,
            session_ttl_hours,
            ai,
        }
    }
}

/// Build application router
///
/// Three layers: public routes (health, signup, login), bearer-token
/// protected routes, and /api/admin routes which additionally require the
/// ADMIN role. Class mutation endpoints live on shared paths and check the
/// role in-handler.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/auth/signup", post(api::auth::signup))
        .route("/api/auth/login", post(api::auth::login));

    let protected = Router::new()
        .route(
            "/api/customers/me",
            get(api::customers::get_me).patch(api::customers::update_me),
        )
        .route(
            "/api/classes",
            get(api::classes::list_classes).post(api::classes::create_class),
        )
        .route(
            "/api/classes/:id",
            get(api::classes::get_class)
                .patch(api::classes::update_class)
                .delete(api::classes::deactivate_class),
        )
        .route("/api/class-instances", get(api::instances::list_instances))
        .route(
            "/api/class-instances/generate",
            post(api::instances::generate_instances),
        )
        .route(
            "/api/bookings",
            get(api::bookings::list_bookings).post(api::bookings::create_booking),
        )
        .route("/api/bookings/:id", delete(api::bookings::cancel_booking))
        .route("/api/attendance", post(api::attendance::mark_attendance))
        .route(
            "/api/notifications",
            get(api::notifications::list_notifications)
                .patch(api::notifications::mark_notifications_read),
        )
        .route(
            "/api/ai/recommendations",
            get(api::recommendations::get_recommendations),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    let admin = Router::new()
        .route("/api/admin/customers", get(api::admin::list_customers))
        .route(
            "/api/admin/customers/:id",
            get(api::admin::get_customer).patch(api::admin::update_customer),
        )
        .route(
            "/api/admin/customers/:id/credits",
            post(api::admin::adjust_credits),
        )
        .route("/api/admin/stats", get(api::admin::get_stats))
        .route("/api/admin/leaderboard", get(api::admin::get_leaderboard))
        .route(
            "/api/admin/progress-reports",
            get(api::reports::list_reports).post(api::reports::create_report),
        )
        .route("/api/admin/progress-reports/:id", get(api::reports::get_report))
        .layer(middleware::from_fn(api::auth::require_admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

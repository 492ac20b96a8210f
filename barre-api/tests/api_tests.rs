//! End-to-end API tests over an in-memory database

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use barre_api::services::ai_client::AiClient;
use barre_api::{build_router, AppState};
use barre_common::db::init::create_all_tables;
use barre_common::db::models::Role;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    pool: SqlitePool,
}

async fn spawn_app() -> TestApp {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    create_all_tables(&pool).await.unwrap();

    let state = AppState::new(pool.clone(), 168, AiClient::new(None, 1));
    TestApp {
        router: build_router(state),
        pool,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Sign up a customer through the public endpoint, returning
    /// (token, customer_guid)
    async fn signup_customer(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "password123",
                    "firstName": "Test",
                    "lastName": "Dancer",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let customer_guid: String = sqlx::query_scalar(
            "SELECT c.guid FROM customers c JOIN users u ON u.guid = c.user_guid
             WHERE u.email = ?",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        (token, customer_guid)
    }

    /// Provision a staff account directly (no public endpoint for these)
    async fn staff_token(&self, role: Role) -> String {
        let user = barre_api::db::users::create_user(
            &self.pool,
            &format!("{}@staff.example", uuid::Uuid::new_v4()),
            "password123",
            "Studio",
            "Staff",
            role,
        )
        .await
        .unwrap();
        barre_api::db::users::create_session(&self.pool, user.guid, 168)
            .await
            .unwrap()
    }

    async fn grant_credits(&self, admin_token: &str, customer_guid: &str, amount: i64) {
        let (status, _) = self
            .request(
                "POST",
                &format!("/api/admin/customers/{}/credits", customer_guid),
                Some(admin_token),
                Some(json!({ "amount": amount })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Create a daily class and generate instances, returning the guid of
    /// the first strictly-future instance
    async fn bookable_instance(&self, admin_token: &str, capacity: i64, price: i64) -> String {
        let (status, _) = self
            .request(
                "POST",
                "/api/classes",
                Some(admin_token),
                Some(json!({
                    "name": "Evening Barre",
                    "instructorName": "Anna",
                    "durationMinutes": 60,
                    "maxCapacity": capacity,
                    "priceCredits": price,
                    "recurrencePattern": {"pattern": "daily", "timezone": "UTC"},
                    "startTime": "09:00",
                    "endTime": "10:00",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = self
            .request(
                "POST",
                "/api/class-instances/generate",
                Some(admin_token),
                Some(json!({ "weeks": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .request(
                "GET",
                "/api/class-instances?availableOnly=true",
                Some(admin_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let instances = body["instances"].as_array().unwrap();
        assert!(!instances.is_empty());
        instances[0]["guid"].as_str().unwrap().to_string()
    }

    async fn balance(&self, customer_guid: &str) -> i64 {
        sqlx::query_scalar("SELECT credits_remaining FROM customers WHERE guid = ?")
            .bind(customer_guid)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "barre-api");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = spawn_app().await;
    let (status, body) = app.request("GET", "/api/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = app
        .request("GET", "/api/bookings", Some("bogus-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_then_login_and_profile() {
    let app = spawn_app().await;
    let (token, _) = app.signup_customer("clara@example.com").await;

    let (status, body) = app
        .request("GET", "/api/customers/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "clara@example.com");
    assert_eq!(body["customer"]["credits_remaining"], 0);
    // Password material never leaves the server
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "clara@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "clara@example.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let app = spawn_app().await;
    let (token, _) = app.signup_customer("clara@example.com").await;

    let (status, body) = app
        .request("GET", "/api/admin/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    // Class creation is admin-only too, on a shared path
    let (status, _) = app
        .request(
            "POST",
            "/api/classes",
            Some(&token),
            Some(json!({
                "name": "X", "instructorName": "Y", "durationMinutes": 60,
                "maxCapacity": 5, "priceCredits": 1,
                "recurrencePattern": {"pattern": "daily", "timezone": "UTC"},
                "startTime": "09:00", "endTime": "10:00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_book_then_cancel_restores_balance() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (token, customer_guid) = app.signup_customer("clara@example.com").await;

    app.grant_credits(&admin, &customer_guid, 5).await;
    let instance = app.bookable_instance(&admin, 10, 2).await;

    let (status, booking) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(app.balance(&customer_guid).await, 3);

    let (status, cancelled) = app
        .request(
            "DELETE",
            &format!("/api/bookings/{}", booking["guid"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(app.balance(&customer_guid).await, 5);

    // Three ledger rows total: grant, debit, refund
    let (_, me) = app
        .request("GET", "/api/customers/me", Some(&token), None)
        .await;
    let transactions = me["recentTransactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0]["transaction_type"], "REFUND");
    assert_eq!(transactions[1]["transaction_type"], "CLASS_BOOKING");
    assert_eq!(transactions[2]["transaction_type"], "ADMIN_ADJUSTMENT");
}

#[tokio::test]
async fn test_booking_error_codes() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (token, customer_guid) = app.signup_customer("clara@example.com").await;
    let instance = app.bookable_instance(&admin, 1, 2).await;

    // Broke customer
    let (status, body) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INSUFFICIENT_CREDITS");
    assert_eq!(app.balance(&customer_guid).await, 0);

    // Funded now; capacity 1 fills with another customer first
    app.grant_credits(&admin, &customer_guid, 5).await;
    let (other_token, other_guid) = app.signup_customer("rival@example.com").await;
    app.grant_credits(&admin, &other_guid, 5).await;
    let (status, _) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&other_token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "CAPACITY_EXCEEDED");

    // Duplicate booking by the rival
    let (status, body) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&other_token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "ALREADY_BOOKED");

    // Paused membership beats every other check
    sqlx::query("UPDATE customers SET membership_status = 'PAUSED' WHERE guid = ?")
        .bind(&customer_guid)
        .execute(&app.pool)
        .await
        .unwrap();
    let (status, body) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "MEMBERSHIP_INACTIVE");
}

#[tokio::test]
async fn test_attendance_flow_awards_first_checkpoint() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (token, customer_guid) = app.signup_customer("clara@example.com").await;
    app.grant_credits(&admin, &customer_guid, 5).await;
    let instance = app.bookable_instance(&admin, 10, 1).await;

    let (_, booking) = app
        .request(
            "POST",
            "/api/bookings",
            Some(&token),
            Some(json!({ "classInstanceGuid": instance })),
        )
        .await;
    let booking_guid = booking["guid"].as_str().unwrap().to_string();

    // Customers cannot mark attendance
    let (status, _) = app
        .request(
            "POST",
            "/api/attendance",
            Some(&token),
            Some(json!({ "bookingGuid": booking_guid })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Class has not started yet
    let (status, body) = app
        .request(
            "POST",
            "/api/attendance",
            Some(&admin),
            Some(json!({ "bookingGuid": booking_guid })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "CLASS_NOT_STARTED");

    // Backdate the instance so check-in is allowed
    sqlx::query("UPDATE class_instances SET scheduled_start_time = ? WHERE guid = ?")
        .bind((chrono::Utc::now() - chrono::Duration::minutes(30)).to_rfc3339())
        .bind(&instance)
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, outcome) = app
        .request(
            "POST",
            "/api/attendance",
            Some(&admin),
            Some(json!({ "bookingGuid": booking_guid, "checkInMethod": "QR_CODE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["total_classes_attended"], 1);
    assert_eq!(outcome["checkpoint"]["checkpoint_type"], "FIRST_CLASS");

    // Second marking is rejected
    let (status, body) = app
        .request(
            "POST",
            "/api/attendance",
            Some(&admin),
            Some(json!({ "bookingGuid": booking_guid })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "ALREADY_MARKED");

    // Milestone notification reached the customer's feed
    let (_, feed) = app
        .request("GET", "/api/notifications", Some(&token), None)
        .await;
    let titles: Vec<&str> = feed["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"Milestone reached!"));
}

#[tokio::test]
async fn test_generation_is_idempotent_over_http() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    app.bookable_instance(&admin, 10, 1).await;

    let (status, second) = app
        .request(
            "POST",
            "/api/class-instances/generate",
            Some(&admin),
            Some(json!({ "weeks": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], 0);
    assert_eq!(second["skipped"], 8);
}

#[tokio::test]
async fn test_admin_stats_and_leaderboard() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (_, a) = app.signup_customer("a@example.com").await;
    let (_, b) = app.signup_customer("b@example.com").await;

    sqlx::query("UPDATE customers SET total_classes_attended = 7 WHERE guid = ?")
        .bind(&a)
        .execute(&app.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE customers SET total_classes_attended = 2 WHERE guid = ?")
        .bind(&b)
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, stats) = app.request("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_customers"], 2);
    assert_eq!(stats["active_memberships"], 2);
    assert_eq!(stats["attendance_rate"], 0.0);
    assert!(stats["recent_bookings"].as_array().unwrap().is_empty());
    assert!(stats["instances_this_week"].is_i64());

    let (status, board) = app
        .request("GET", "/api/admin/leaderboard?type=classes", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = board["leaderboard"].as_array().unwrap();
    assert_eq!(entries[0]["customer_guid"], a.as_str());
    assert_eq!(entries[0]["score"], 7);
    assert_eq!(entries[1]["customer_guid"], b.as_str());
}

#[tokio::test]
async fn test_admin_adjustment_can_go_negative() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (_, customer_guid) = app.signup_customer("clara@example.com").await;

    let (status, body) = app
        .request(
            "POST",
            &format!("/api/admin/customers/{}/credits", customer_guid),
            Some(&admin),
            Some(json!({ "amount": -3, "notes": "chargeback" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["balance_after"], -3);
    // The refreshed customer rides along with the transaction record
    assert_eq!(body["customer"]["credits_remaining"], -3);
    assert_eq!(body["customer"]["guid"], customer_guid.as_str());
    assert_eq!(app.balance(&customer_guid).await, -3);

    // Zero-amount adjustments are rejected
    let (status, body) = app
        .request(
            "POST",
            &format!("/api/admin/customers/{}/credits", customer_guid),
            Some(&admin),
            Some(json!({ "amount": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn test_progress_report_with_fallback_ai() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (_, customer_guid) = app.signup_customer("clara@example.com").await;

    let (status, report) = app
        .request(
            "POST",
            "/api/admin/progress-reports",
            Some(&admin),
            Some(json!({
                "customerGuid": customer_guid,
                "reportType": "PROGRESS",
                "title": "First month",
                "content": "Great turnout work.",
                "goals": ["improve balance"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["title"], "First month");
    // No API key configured: the report succeeds without analysis
    assert!(report["ai_analysis"].is_null());

    let (status, listed) = app
        .request(
            "GET",
            &format!("/api/admin/progress-reports?customerGuid={}", customer_guid),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["reports"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_recommendations_always_answer() {
    let app = spawn_app().await;
    let admin = app.staff_token(Role::Admin).await;
    let (token, _) = app.signup_customer("clara@example.com").await;
    app.bookable_instance(&admin, 10, 1).await;

    let (status, body) = app
        .request("GET", "/api/ai/recommendations", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ai_generated"], false);
    assert!(!body["recommendations"].as_array().unwrap().is_empty());
}

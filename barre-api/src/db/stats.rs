//! Studio-wide statistics and customer leaderboard

use barre_common::db::models::BookingStatus;
use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Rows shown in the dashboard's recent-activity feed
const RECENT_BOOKINGS_LIMIT: i64 = 5;

/// Aggregate dashboard figures for the admin back office
#[derive(Debug, Clone, Serialize)]
pub struct StudioStats {
    pub total_customers: i64,
    pub active_memberships: i64,
    /// Bookings in CONFIRMED or ATTENDED status
    pub total_bookings: i64,
    pub total_attendances: i64,
    /// Attended bookings over all CONFIRMED + ATTENDED bookings, 0.0 when
    /// nothing has been booked yet
    pub attendance_rate: f64,
    /// Instances scheduled in the current week (Sunday through Saturday)
    pub instances_this_week: i64,
    /// Sum of all customers' current credit balances
    pub credits_outstanding: i64,
    /// Newest bookings first
    pub recent_bookings: Vec<RecentBooking>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentBooking {
    pub booking_guid: Uuid,
    pub customer_name: String,
    pub class_name: String,
    pub booked_at: DateTime<Utc>,
    pub status: BookingStatus,
}

pub async fn studio_stats(pool: &SqlitePool) -> Result<StudioStats> {
    let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(pool)
        .await?;

    let active_memberships: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE membership_status = 'ACTIVE'")
            .fetch_one(pool)
            .await?;

    let total_bookings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status IN ('CONFIRMED', 'ATTENDED')")
            .fetch_one(pool)
            .await?;

    let attended_bookings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = 'ATTENDED'")
            .fetch_one(pool)
            .await?;

    let total_attendances: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance")
        .fetch_one(pool)
        .await?;

    let attendance_rate = if total_bookings > 0 {
        attended_bookings as f64 / total_bookings as f64
    } else {
        0.0
    };

    let today = Utc::now().date_naive();
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let week_start_utc = week_start.and_time(NaiveTime::MIN).and_utc();
    let instances_this_week: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM class_instances
         WHERE scheduled_start_time >= ? AND scheduled_start_time < ?",
    )
    .bind(week_start_utc.to_rfc3339())
    .bind((week_start_utc + Duration::days(7)).to_rfc3339())
    .fetch_one(pool)
    .await?;

    let credits_outstanding: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(credits_remaining), 0) FROM customers")
            .fetch_one(pool)
            .await?;

    let recent_bookings = recent_bookings(pool).await?;

    Ok(StudioStats {
        total_customers,
        active_memberships,
        total_bookings,
        total_attendances,
        attendance_rate,
        instances_this_week,
        credits_outstanding,
        recent_bookings,
    })
}

async fn recent_bookings(pool: &SqlitePool) -> Result<Vec<RecentBooking>> {
    let rows = sqlx::query(
        "SELECT b.guid, b.booked_at, b.status,
                u.first_name, u.last_name, cl.name AS class_name
         FROM bookings b
         JOIN customers c ON c.guid = b.customer_guid
         JOIN users u ON u.guid = c.user_guid
         JOIN class_instances i ON i.guid = b.class_instance_guid
         JOIN classes cl ON cl.guid = i.class_guid
         ORDER BY b.booked_at DESC, b.guid DESC
         LIMIT ?",
    )
    .bind(RECENT_BOOKINGS_LIMIT)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid: String = row.get("guid");
            let booked_at: String = row.get("booked_at");
            let status: String = row.get("status");
            let first_name: String = row.get("first_name");
            let last_name: String = row.get("last_name");
            Ok(RecentBooking {
                booking_guid: parse_uuid(&guid)?,
                customer_name: format!("{} {}", first_name, last_name),
                class_name: row.get("class_name"),
                booked_at: parse_timestamp(&booked_at)?,
                status: status.parse()?,
            })
        })
        .collect()
}

/// One customer's attended share of their CONFIRMED + ATTENDED bookings,
/// 0.0 when they have none.
pub async fn customer_attendance_rate(pool: &SqlitePool, customer_guid: Uuid) -> Result<f64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS booked,
                COALESCE(SUM(CASE WHEN status = 'ATTENDED' THEN 1 ELSE 0 END), 0) AS attended
         FROM bookings
         WHERE customer_guid = ? AND status IN ('CONFIRMED', 'ATTENDED')",
    )
    .bind(customer_guid.to_string())
    .fetch_one(pool)
    .await?;

    let booked: i64 = row.get("booked");
    let attended: i64 = row.get("attended");
    if booked > 0 {
        Ok(attended as f64 / booked as f64)
    } else {
        Ok(0.0)
    }
}

/// Leaderboard ranking metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardKind {
    /// Lifetime attended classes
    Classes,
    /// Consecutive weekly attendance streak
    Streak,
    /// Attended share of CONFIRMED + ATTENDED bookings, as a whole
    /// percentage
    Attendance,
}

impl LeaderboardKind {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("classes") => Ok(LeaderboardKind::Classes),
            Some("streak") => Ok(LeaderboardKind::Streak),
            Some("attendance") => Ok(LeaderboardKind::Attendance),
            Some(other) => Err(Error::InvalidInput(format!(
                "Unknown leaderboard type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub customer_guid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub score: i64,
}

/// Top customers by the chosen metric.
///
/// Ties break on customer guid so the ordering is stable across requests.
pub async fn leaderboard(
    pool: &SqlitePool,
    kind: LeaderboardKind,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>> {
    let limit = limit.clamp(1, 100);

    let rows = match kind {
        LeaderboardKind::Classes => {
            sqlx::query(
                "SELECT c.guid, u.first_name, u.last_name,
                        c.total_classes_attended AS score
                 FROM customers c JOIN users u ON u.guid = c.user_guid
                 ORDER BY score DESC, c.guid
                 LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        LeaderboardKind::Streak => {
            sqlx::query(
                "SELECT c.guid, u.first_name, u.last_name,
                        c.consecutive_weeks_streak AS score
                 FROM customers c JOIN users u ON u.guid = c.user_guid
                 ORDER BY score DESC, c.guid
                 LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        LeaderboardKind::Attendance => {
            sqlx::query(
                "SELECT guid, first_name, last_name,
                        CASE WHEN booked > 0
                             THEN (100 * attended) / booked
                             ELSE 0 END AS score
                 FROM (SELECT c.guid AS guid, u.first_name, u.last_name,
                              (SELECT COUNT(*) FROM bookings b
                               WHERE b.customer_guid = c.guid
                                 AND b.status = 'ATTENDED') AS attended,
                              (SELECT COUNT(*) FROM bookings b
                               WHERE b.customer_guid = c.guid
                                 AND b.status IN ('CONFIRMED', 'ATTENDED')) AS booked
                       FROM customers c JOIN users u ON u.guid = c.user_guid)
                 ORDER BY score DESC, guid
                 LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let guid: String = row.get("guid");
            Ok(LeaderboardEntry {
                rank: index as i64 + 1,
                customer_guid: parse_uuid(&guid)?,
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                score: row.get("score"),
            })
        })
        .collect()
}

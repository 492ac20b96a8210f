//! Class instance generation and listing
//!
//! The generator expands each active class's recurrence pattern into dated
//! rows over a forward window. Generation is idempotent: the
//! UNIQUE(class_guid, scheduled_date) constraint plus INSERT OR IGNORE means
//! re-running over an overlapping window never duplicates or rewrites
//! existing instances (and so never disturbs their bookings).

use barre_common::db::models::{Class, ClassInstance, InstanceStatus};
use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::recurrence::{local_to_utc, parse_hhmm};
use barre_common::{Error, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

/// Default forward generation window, in days
pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// Outcome of one generation run
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationSummary {
    /// Instances newly inserted by this run
    pub created: u64,
    /// Qualifying dates that already had an instance
    pub skipped: u64,
}

/// Expand recurrence patterns over `[today, today + window_days]`, both
/// ends inclusive.
///
/// `class_guid` of None covers every active class; Some targets one class
/// (which must exist, but may be inactive when targeted directly).
pub async fn generate_instances(
    pool: &SqlitePool,
    class_guid: Option<Uuid>,
    window_days: i64,
) -> Result<GenerationSummary> {
    if !(1..=366).contains(&window_days) {
        return Err(Error::InvalidInput(
            "Generation window must be between 1 and 366 days".to_string(),
        ));
    }
    let today = Utc::now().date_naive();
    generate_instances_between(pool, class_guid, today, today + Duration::days(window_days)).await
}

/// Expand recurrence patterns over an explicit inclusive date range.
pub async fn generate_instances_between(
    pool: &SqlitePool,
    class_guid: Option<Uuid>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<GenerationSummary> {
    let span = (end - start).num_days();
    if !(0..=366).contains(&span) {
        return Err(Error::InvalidInput(
            "Generation range must run forward and cover at most a year".to_string(),
        ));
    }

    let classes = match class_guid {
        Some(guid) => {
            let class = crate::db::classes::load_class(pool, guid)
                .await?
                .ok_or_else(|| Error::NotFound("Class not found".to_string()))?;
            vec![class]
        }
        None => crate::db::classes::list_active_classes(pool).await?,
    };

    let mut summary = GenerationSummary {
        created: 0,
        skipped: 0,
    };

    for class in &classes {
        let class_summary = generate_for_class(pool, class, start, end).await?;
        summary.created += class_summary.created;
        summary.skipped += class_summary.skipped;
    }

    info!(
        "Instance generation: {} created, {} already present across {} classes",
        summary.created,
        summary.skipped,
        classes.len()
    );
    Ok(summary)
}

async fn generate_for_class(
    pool: &SqlitePool,
    class: &Class,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<GenerationSummary> {
    let tz = class.recurrence_pattern.tz()?;
    let start_time = parse_hhmm(&class.start_time)?;
    let end_time = parse_hhmm(&class.end_time)?;

    let mut summary = GenerationSummary {
        created: 0,
        skipped: 0,
    };

    for offset in 0..=(end - start).num_days() {
        let date = start + Duration::days(offset);
        if !class.recurrence_pattern.day_qualifies(date) {
            continue;
        }

        let Some(starts_at) = local_to_utc(date, start_time, tz) else {
            warn!(
                "Skipping {} for class {}: local start time falls in a DST gap",
                date, class.guid
            );
            continue;
        };
        let mut ends_at = match local_to_utc(date, end_time, tz) {
            Some(ends_at) => ends_at,
            None => starts_at + Duration::minutes(class.duration_minutes),
        };
        // Classes ending past local midnight wrap to the next day
        if ends_at <= starts_at {
            ends_at += Duration::days(1);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO class_instances
                 (guid, class_guid, scheduled_date, scheduled_start_time,
                  scheduled_end_time, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(class.guid.to_string())
        .bind(date.to_string())
        .bind(starts_at.to_rfc3339())
        .bind(ends_at.to_rfc3339())
        .bind(InstanceStatus::Scheduled.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            summary.created += 1;
        } else {
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

/// Convenience wrapper over [`generate_instances`] with a horizon in weeks
pub async fn generate_weekly_instances(
    pool: &SqlitePool,
    class_guid: Option<Uuid>,
    weeks: i64,
) -> Result<GenerationSummary> {
    // Overflowed horizons fall through to the window validation
    let window_days = weeks.checked_mul(7).unwrap_or(0);
    generate_instances(pool, class_guid, window_days).await
}

/// Instance listing filters
#[derive(Debug, Default)]
pub struct InstanceFilter {
    pub class_guid: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Only scheduled instances with spots remaining that start in the future
    pub available_only: bool,
}

/// Instance joined with its class and live booking count
#[derive(Debug, Clone, Serialize)]
pub struct InstanceWithClass {
    #[serde(flatten)]
    pub instance: ClassInstance,
    pub class_name: String,
    pub instructor_name: String,
    pub price_credits: i64,
    pub max_capacity: i64,
    pub spots_remaining: i64,
}

/// List instances for the schedule view, soonest first.
///
/// `spots_remaining` counts CONFIRMED and ATTENDED bookings against the
/// class capacity; cancelled bookings free their spot.
pub async fn list_instances(
    pool: &SqlitePool,
    filter: &InstanceFilter,
) -> Result<Vec<InstanceWithClass>> {
    let mut sql = String::from(
        "SELECT i.guid, i.class_guid, i.scheduled_date, i.scheduled_start_time,
                i.scheduled_end_time, i.status,
                c.name AS class_name, c.instructor_name, c.price_credits, c.max_capacity,
                (SELECT COUNT(*) FROM bookings b
                 WHERE b.class_instance_guid = i.guid
                   AND b.status IN ('CONFIRMED', 'ATTENDED')) AS booked_count
         FROM class_instances i
         JOIN classes c ON c.guid = i.class_guid
         WHERE 1 = 1",
    );

    if filter.class_guid.is_some() {
        sql.push_str(" AND i.class_guid = ?");
    }
    if filter.from.is_some() {
        sql.push_str(" AND i.scheduled_date >= ?");
    }
    if filter.to.is_some() {
        sql.push_str(" AND i.scheduled_date <= ?");
    }
    if filter.available_only {
        sql.push_str(" AND i.status = 'scheduled' AND i.scheduled_start_time > ?");
    }
    sql.push_str(" ORDER BY i.scheduled_start_time");

    let mut query = sqlx::query(&sql);
    if let Some(class_guid) = filter.class_guid {
        query = query.bind(class_guid.to_string());
    }
    if let Some(from) = filter.from {
        query = query.bind(from.to_string());
    }
    if let Some(to) = filter.to {
        query = query.bind(to.to_string());
    }
    if filter.available_only {
        query = query.bind(Utc::now().to_rfc3339());
    }

    let rows = query.fetch_all(pool).await?;

    let mut instances = Vec::with_capacity(rows.len());
    for row in &rows {
        let max_capacity: i64 = row.get("max_capacity");
        let booked_count: i64 = row.get("booked_count");
        let entry = InstanceWithClass {
            instance: row_to_instance(row)?,
            class_name: row.get("class_name"),
            instructor_name: row.get("instructor_name"),
            price_credits: row.get("price_credits"),
            max_capacity,
            spots_remaining: (max_capacity - booked_count).max(0),
        };
        if filter.available_only && entry.spots_remaining == 0 {
            continue;
        }
        instances.push(entry);
    }

    Ok(instances)
}

/// Load an instance together with its class, on the caller's connection so
/// booking checks read inside their transaction.
pub async fn load_instance_with_class(
    conn: &mut SqliteConnection,
    guid: Uuid,
) -> Result<Option<(ClassInstance, Class)>> {
    let row = sqlx::query(
        "SELECT i.guid, i.class_guid, i.scheduled_date, i.scheduled_start_time,
                i.scheduled_end_time, i.status,
                c.guid AS c_guid, c.name, c.description, c.instructor_name,
                c.duration_minutes, c.max_capacity, c.price_credits,
                c.recurrence_pattern, c.start_time, c.end_time, c.is_active, c.created_at
         FROM class_instances i
         JOIN classes c ON c.guid = i.class_guid
         WHERE i.guid = ?",
    )
    .bind(guid.to_string())
    .fetch_optional(conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let instance = row_to_instance(&row)?;
    let c_guid: String = row.get("c_guid");
    let pattern_json: String = row.get("recurrence_pattern");
    let created_at: String = row.get("created_at");
    let class = Class {
        guid: parse_uuid(&c_guid)?,
        name: row.get("name"),
        description: row.get("description"),
        instructor_name: row.get("instructor_name"),
        duration_minutes: row.get("duration_minutes"),
        max_capacity: row.get("max_capacity"),
        price_credits: row.get("price_credits"),
        recurrence_pattern: serde_json::from_str(&pattern_json)
            .map_err(|e| Error::Internal(format!("Invalid stored recurrence pattern: {}", e)))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&created_at)?,
    };

    Ok(Some((instance, class)))
}

/// Count bookings occupying spots on an instance, inside the caller's
/// transaction.
pub async fn count_active_bookings(conn: &mut SqliteConnection, instance_guid: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings
         WHERE class_instance_guid = ? AND status IN ('CONFIRMED', 'ATTENDED')",
    )
    .bind(instance_guid.to_string())
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub(crate) fn row_to_instance(row: &sqlx::sqlite::SqliteRow) -> Result<ClassInstance> {
    let guid: String = row.get("guid");
    let class_guid: String = row.get("class_guid");
    let scheduled_date: String = row.get("scheduled_date");
    let scheduled_start_time: String = row.get("scheduled_start_time");
    let scheduled_end_time: String = row.get("scheduled_end_time");
    let status: String = row.get("status");

    Ok(ClassInstance {
        guid: parse_uuid(&guid)?,
        class_guid: parse_uuid(&class_guid)?,
        scheduled_date: scheduled_date
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid scheduled_date: {}", e)))?,
        scheduled_start_time: parse_timestamp(&scheduled_start_time)?,
        scheduled_end_time: parse_timestamp(&scheduled_end_time)?,
        status: status.parse()?,
    })
}

#[cfg(test)]
pub(crate) async fn tests_insert_instance(
    pool: &SqlitePool,
    class_guid: Uuid,
    starts_at: chrono::DateTime<Utc>,
) -> Uuid {
    let guid = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO class_instances
             (guid, class_guid, scheduled_date, scheduled_start_time, scheduled_end_time, status)
         VALUES (?, ?, ?, ?, ?, 'scheduled')",
    )
    .bind(guid.to_string())
    .bind(class_guid.to_string())
    .bind(starts_at.date_naive().to_string())
    .bind(starts_at.to_rfc3339())
    .bind((starts_at + Duration::hours(1)).to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
    guid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::classes::{create_class, tests_weekly_class};
    use barre_common::db::init::create_all_tables;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_all_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let pool = test_pool().await;
        // All seven weekdays so the count is window-size invariant
        create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();

        // 14-day window covers 15 dates, both ends inclusive
        let first = generate_instances(&pool, None, 14).await.unwrap();
        assert_eq!(first.created, 15);
        assert_eq!(first.skipped, 0);

        let second = generate_instances(&pool, None, 14).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 15);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM class_instances")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 15);
    }

    #[tokio::test]
    async fn test_overlapping_windows_extend_without_duplicates() {
        let pool = test_pool().await;
        create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();

        generate_instances(&pool, None, 7).await.unwrap();
        let extended = generate_instances(&pool, None, 14).await.unwrap();
        assert_eq!(extended.created, 7);
        assert_eq!(extended.skipped, 8);
    }

    #[tokio::test]
    async fn test_weekly_pattern_only_generates_matching_days() {
        let pool = test_pool().await;
        // One weekday out of seven; a 13-day window spans 14 dates, so the
        // chosen weekday appears exactly twice regardless of today
        create_class(&pool, tests_weekly_class(vec![3], 10, 1))
            .await
            .unwrap();

        let summary = generate_instances(&pool, None, 13).await.unwrap();
        assert_eq!(summary.created, 2);
    }

    #[tokio::test]
    async fn test_inactive_class_not_generated() {
        let pool = test_pool().await;
        let class = create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();
        crate::db::classes::deactivate_class(&pool, class.guid)
            .await
            .unwrap();

        let summary = generate_instances(&pool, None, 14).await.unwrap();
        assert_eq!(summary.created, 0);
    }

    #[tokio::test]
    async fn test_listing_reports_capacity() {
        let pool = test_pool().await;
        let class = create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 8, 1))
            .await
            .unwrap();
        generate_instances(&pool, None, 3).await.unwrap();

        let listed = list_instances(
            &pool,
            &InstanceFilter {
                class_guid: Some(class.guid),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(listed.len(), 4);
        assert!(listed.iter().all(|i| i.spots_remaining == 8));
        assert!(listed
            .windows(2)
            .all(|w| w[0].instance.scheduled_start_time <= w[1].instance.scheduled_start_time));
    }

    #[tokio::test]
    async fn test_targeted_generation_covers_one_class() {
        let pool = test_pool().await;
        let wanted = create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();
        create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();

        let summary = generate_weekly_instances(&pool, Some(wanted.guid), 1)
            .await
            .unwrap();
        assert_eq!(summary.created, 8);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM class_instances WHERE class_guid = ?")
                .bind(wanted.guid.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 8);
    }

    #[tokio::test]
    async fn test_weekly_horizon_includes_end_date() {
        let pool = test_pool().await;
        create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();

        // One week runs today through today + 7 inclusive: 8 daily instances
        let summary = generate_weekly_instances(&pool, None, 1).await.unwrap();
        assert_eq!(summary.created, 8);
    }

    #[tokio::test]
    async fn test_explicit_date_range() {
        let pool = test_pool().await;
        create_class(&pool, tests_weekly_class(vec![0, 1, 2, 3, 4, 5, 6], 10, 1))
            .await
            .unwrap();

        let start = Utc::now().date_naive() + Duration::days(30);
        let summary = generate_instances_between(&pool, None, start, start + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(summary.created, 3);

        // Same-day range still covers that one date
        let single = generate_instances_between(&pool, None, start, start).await.unwrap();
        assert_eq!(single.created, 0);
        assert_eq!(single.skipped, 1);

        assert!(
            generate_instances_between(&pool, None, start, start - Duration::days(1))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_targeted_generation_unknown_class() {
        let pool = test_pool().await;
        assert!(matches!(
            generate_instances(&pool, Some(Uuid::new_v4()), 7).await,
            Err(barre_common::Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_window_rejected() {
        let pool = test_pool().await;
        assert!(generate_instances(&pool, None, 0).await.is_err());
        assert!(generate_instances(&pool, None, 1000).await.is_err());
        assert!(generate_weekly_instances(&pool, None, i64::MAX)
            .await
            .is_err());
    }
}

//! Attendance marking and milestone checkpoints
//!
//! Marking attendance flips the booking to ATTENDED, records the check-in,
//! bumps the customer's lifetime counter, and awards a milestone checkpoint
//! when the new counter lands exactly on a threshold. All of it happens in
//! one transaction.

use barre_common::db::models::{
    Attendance, BookingStatus, CheckInMethod, Checkpoint, CheckpointType,
};
use barre_common::db::parse_timestamp;
use barre_common::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifetime-count thresholds, awarded on exact equality so a checkpoint is
/// hit at most once even if the counter is later adjusted
const CHECKPOINT_THRESHOLDS: &[(i64, CheckpointType)] = &[
    (1, CheckpointType::FirstClass),
    (3, CheckpointType::ThirdClass),
    (10, CheckpointType::TenthClass),
];

/// Result of marking attendance
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceOutcome {
    pub attendance: Attendance,
    /// Milestone awarded by this attendance, if the new lifetime count hit
    /// a threshold
    pub checkpoint: Option<Checkpoint>,
    pub total_classes_attended: i64,
}

/// Mark a booking attended.
///
/// The class must have started; each booking can be marked at most once.
pub async fn mark_attended(
    pool: &SqlitePool,
    booking_guid: Uuid,
    check_in_method: CheckInMethod,
    notes: Option<String>,
) -> Result<AttendanceOutcome> {
    let mut tx = pool.begin().await?;

    let Some(booking) = crate::db::bookings::load_booking_for_update(&mut tx, booking_guid).await?
    else {
        return Err(Error::NotFound("Booking not found".to_string()));
    };

    if booking.status == BookingStatus::Attended {
        return Err(Error::AlreadyMarked);
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(Error::InvalidInput(
            "Cannot mark attendance on a cancelled booking".to_string(),
        ));
    }

    let starts_at: String = sqlx::query_scalar(
        "SELECT scheduled_start_time FROM class_instances WHERE guid = ?",
    )
    .bind(booking.class_instance_guid.to_string())
    .fetch_one(&mut *tx)
    .await?;
    if parse_timestamp(&starts_at)? > Utc::now() {
        return Err(Error::ClassNotStarted);
    }

    let attendance = Attendance {
        guid: Uuid::new_v4(),
        booking_guid,
        customer_guid: booking.customer_guid,
        class_instance_guid: booking.class_instance_guid,
        check_in_method,
        notes,
        attended_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO attendance
             (guid, booking_guid, customer_guid, class_instance_guid,
              check_in_method, notes, attended_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(attendance.guid.to_string())
    .bind(booking_guid.to_string())
    .bind(booking.customer_guid.to_string())
    .bind(booking.class_instance_guid.to_string())
    .bind(check_in_method.as_str())
    .bind(&attendance.notes)
    .bind(attendance.attended_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE bookings SET status = 'ATTENDED' WHERE guid = ?")
        .bind(booking_guid.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE customers SET total_classes_attended = total_classes_attended + 1
         WHERE guid = ?",
    )
    .bind(booking.customer_guid.to_string())
    .execute(&mut *tx)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT total_classes_attended FROM customers WHERE guid = ?")
            .bind(booking.customer_guid.to_string())
            .fetch_one(&mut *tx)
            .await?;

    let checkpoint = award_checkpoint(&mut tx, booking.customer_guid, total).await?;

    tx.commit().await?;

    info!(
        "Customer {} attended instance {} (lifetime {})",
        booking.customer_guid, booking.class_instance_guid, total
    );
    Ok(AttendanceOutcome {
        attendance,
        checkpoint,
        total_classes_attended: total,
    })
}

/// Award the checkpoint whose threshold the counter just reached, if any.
/// The UNIQUE(customer_guid, checkpoint_type) constraint backstops the
/// once-per-type rule.
async fn award_checkpoint(
    conn: &mut SqliteConnection,
    customer_guid: Uuid,
    total: i64,
) -> Result<Option<Checkpoint>> {
    let Some((_, checkpoint_type)) = CHECKPOINT_THRESHOLDS
        .iter()
        .find(|(threshold, _)| *threshold == total)
    else {
        return Ok(None);
    };

    let checkpoint = Checkpoint {
        guid: Uuid::new_v4(),
        customer_guid,
        checkpoint_type: *checkpoint_type,
        class_count_at_achievement: total,
        achieved_at: Utc::now(),
    };

    let result = sqlx::query(
        "INSERT OR IGNORE INTO checkpoints
             (guid, customer_guid, checkpoint_type, class_count_at_achievement, achieved_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(checkpoint.guid.to_string())
    .bind(customer_guid.to_string())
    .bind(checkpoint.checkpoint_type.as_str())
    .bind(checkpoint.class_count_at_achievement)
    .bind(checkpoint.achieved_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    // Best-effort: a failed feed entry never costs the customer the
    // checkpoint or the attendance itself
    if let Err(err) = notify_milestone(conn, customer_guid, *checkpoint_type).await {
        warn!(
            "Failed to record milestone notification for customer {}: {}",
            customer_guid, err
        );
    }

    Ok(Some(checkpoint))
}

async fn notify_milestone(
    conn: &mut SqliteConnection,
    customer_guid: Uuid,
    checkpoint_type: CheckpointType,
) -> Result<()> {
    let user_guid = customer_user_guid(conn, customer_guid).await?;
    crate::db::notifications::create_notification_on(
        conn,
        user_guid,
        "MILESTONE",
        "Milestone reached!",
        &milestone_message(checkpoint_type),
        None,
    )
    .await?;
    Ok(())
}

fn milestone_message(checkpoint_type: CheckpointType) -> String {
    match checkpoint_type {
        CheckpointType::FirstClass => "You attended your first class. Welcome to the studio!",
        CheckpointType::ThirdClass => "Three classes down. You're building a habit!",
        CheckpointType::TenthClass => "Ten classes attended. You're a regular now!",
    }
    .to_string()
}

async fn customer_user_guid(conn: &mut SqliteConnection, customer_guid: Uuid) -> Result<Uuid> {
    let user_guid: String = sqlx::query_scalar("SELECT user_guid FROM customers WHERE guid = ?")
        .bind(customer_guid.to_string())
        .fetch_one(conn)
        .await?;
    barre_common::db::parse_uuid(&user_guid)
}

/// A customer's earned checkpoints, oldest first
pub async fn list_checkpoints(pool: &SqlitePool, customer_guid: Uuid) -> Result<Vec<Checkpoint>> {
    use sqlx::Row;

    let rows = sqlx::query(
        "SELECT guid, customer_guid, checkpoint_type, class_count_at_achievement, achieved_at
         FROM checkpoints WHERE customer_guid = ? ORDER BY achieved_at",
    )
    .bind(customer_guid.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let guid: String = row.get("guid");
            let customer_guid: String = row.get("customer_guid");
            let checkpoint_type: String = row.get("checkpoint_type");
            let achieved_at: String = row.get("achieved_at");
            Ok(Checkpoint {
                guid: barre_common::db::parse_uuid(&guid)?,
                customer_guid: barre_common::db::parse_uuid(&customer_guid)?,
                checkpoint_type: checkpoint_type.parse()?,
                class_count_at_achievement: row.get("class_count_at_achievement"),
                achieved_at: parse_timestamp(&achieved_at)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bookings::create_booking;
    use crate::db::classes::{create_class, tests_weekly_class};
    use crate::db::customers::tests_insert_customer;
    use crate::db::instances::tests_insert_instance;
    use barre_common::db::init::create_all_tables;
    use chrono::Duration;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_all_tables(&pool).await.unwrap();
        pool
    }

    /// Book a future instance, then backdate it so attendance is allowed
    async fn attended_booking_setup(pool: &SqlitePool, customer: Uuid) -> Uuid {
        let class = create_class(pool, tests_weekly_class(vec![1], 20, 1))
            .await
            .unwrap();
        let instance =
            tests_insert_instance(pool, class.guid, Utc::now() + Duration::hours(1)).await;
        let booking = create_booking(pool, customer, instance).await.unwrap();

        sqlx::query("UPDATE class_instances SET scheduled_start_time = ? WHERE guid = ?")
            .bind((Utc::now() - Duration::minutes(10)).to_rfc3339())
            .bind(instance.to_string())
            .execute(pool)
            .await
            .unwrap();

        booking.guid
    }

    #[tokio::test]
    async fn test_attendance_increments_lifetime_count() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let booking = attended_booking_setup(&pool, customer).await;

        let outcome = mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap();
        assert_eq!(outcome.total_classes_attended, 1);
        assert_eq!(outcome.attendance.customer_guid, customer);
    }

    #[tokio::test]
    async fn test_double_marking_rejected() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let booking = attended_booking_setup(&pool, customer).await;

        mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap();
        let err = mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyMarked));

        let count: i64 =
            sqlx::query_scalar("SELECT total_classes_attended FROM customers WHERE guid = ?")
                .bind(customer.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_cancelled_booking_rejected() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let booking = attended_booking_setup(&pool, customer).await;

        sqlx::query("UPDATE bookings SET status = 'CANCELLED' WHERE guid = ?")
            .bind(booking.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let err = mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_future_class_rejected() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let class = create_class(&pool, tests_weekly_class(vec![1], 20, 1))
            .await
            .unwrap();
        let instance =
            tests_insert_instance(&pool, class.guid, Utc::now() + Duration::hours(2)).await;
        let booking = create_booking(&pool, customer, instance).await.unwrap();

        let err = mark_attended(&pool, booking.guid, CheckInMethod::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClassNotStarted));
    }

    #[tokio::test]
    async fn test_first_class_checkpoint_awarded() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let booking = attended_booking_setup(&pool, customer).await;

        let outcome = mark_attended(&pool, booking, CheckInMethod::Automatic, None)
            .await
            .unwrap();
        let checkpoint = outcome.checkpoint.unwrap();
        assert_eq!(checkpoint.checkpoint_type, CheckpointType::FirstClass);
        assert_eq!(checkpoint.class_count_at_achievement, 1);

        // A milestone notification lands on the customer's user feed
        let notifications: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE notification_type = 'MILESTONE'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(notifications, 1);
    }

    #[tokio::test]
    async fn test_checkpoints_only_at_exact_thresholds() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 20).await;

        let mut awarded = Vec::new();
        for _ in 0..11 {
            let booking = attended_booking_setup(&pool, customer).await;
            let outcome = mark_attended(&pool, booking, CheckInMethod::Manual, None)
                .await
                .unwrap();
            if let Some(checkpoint) = outcome.checkpoint {
                awarded.push((outcome.total_classes_attended, checkpoint.checkpoint_type));
            }
        }

        assert_eq!(
            awarded,
            vec![
                (1, CheckpointType::FirstClass),
                (3, CheckpointType::ThirdClass),
                (10, CheckpointType::TenthClass),
            ]
        );
        assert_eq!(list_checkpoints(&pool, customer).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_checkpoint_survives_notification_failure() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 10).await;
        let booking = attended_booking_setup(&pool, customer).await;

        sqlx::query("DROP TABLE notifications")
            .execute(&pool)
            .await
            .unwrap();

        let outcome = mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap();
        assert_eq!(outcome.total_classes_attended, 1);
        assert_eq!(
            outcome.checkpoint.unwrap().checkpoint_type,
            CheckpointType::FirstClass
        );
    }

    #[tokio::test]
    async fn test_adjusted_counter_skips_missed_threshold() {
        let pool = test_pool().await;
        let customer = tests_insert_customer(&pool, 20).await;

        // Counter jumps past 3: thresholds are exact-match only
        sqlx::query("UPDATE customers SET total_classes_attended = 4 WHERE guid = ?")
            .bind(customer.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let booking = attended_booking_setup(&pool, customer).await;
        let outcome = mark_attended(&pool, booking, CheckInMethod::Manual, None)
            .await
            .unwrap();
        assert_eq!(outcome.total_classes_attended, 5);
        assert!(outcome.checkpoint.is_none());
    }
}

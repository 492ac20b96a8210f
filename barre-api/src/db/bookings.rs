//! Booking lifecycle: create (debit) and cancel (refund)
//!
//! Both operations run all of their checks and writes inside a single
//! transaction, so the capacity count, the balance check, the booking row,
//! and the ledger entry commit or roll back together.

use barre_common::db::models::{
    Booking, BookingStatus, Customer, MembershipStatus, TransactionType,
};
use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::{instances, ledger};

/// Book a customer onto a class instance, debiting the class price.
///
/// Check order: membership, instance existence, start time, capacity,
/// duplicate booking, balance. The first failing check wins.
pub async fn create_booking(
    pool: &SqlitePool,
    customer_guid: Uuid,
    instance_guid: Uuid,
) -> Result<Booking> {
    let mut tx = pool.begin().await?;

    let customer = load_customer_for_update(&mut tx, customer_guid).await?;
    if customer.membership_status != MembershipStatus::Active {
        return Err(Error::MembershipInactive);
    }

    let Some((instance, class)) =
        instances::load_instance_with_class(&mut tx, instance_guid).await?
    else {
        return Err(Error::NotFound("Class instance not found".to_string()));
    };

    let now = Utc::now();
    if instance.scheduled_start_time <= now {
        return Err(Error::PastClass);
    }

    let booked = instances::count_active_bookings(&mut tx, instance_guid).await?;
    if booked >= class.max_capacity {
        return Err(Error::CapacityExceeded);
    }

    let duplicate: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings
         WHERE customer_guid = ? AND class_instance_guid = ?
           AND status IN ('CONFIRMED', 'ATTENDED')",
    )
    .bind(customer_guid.to_string())
    .bind(instance_guid.to_string())
    .fetch_one(&mut *tx)
    .await?;
    if duplicate > 0 {
        return Err(Error::AlreadyBooked);
    }

    if customer.credits_remaining < class.price_credits {
        return Err(Error::InsufficientCredits);
    }

    let booking = Booking {
        guid: Uuid::new_v4(),
        customer_guid,
        class_instance_guid: instance_guid,
        status: BookingStatus::Confirmed,
        credits_used: class.price_credits,
        booked_at: now,
        cancelled_at: None,
    };

    sqlx::query(
        "INSERT INTO bookings
             (guid, customer_guid, class_instance_guid, status, credits_used, booked_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(booking.guid.to_string())
    .bind(customer_guid.to_string())
    .bind(instance_guid.to_string())
    .bind(booking.status.as_str())
    .bind(booking.credits_used)
    .bind(booking.booked_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    if class.price_credits > 0 {
        ledger::apply_credit_delta(
            &mut tx,
            customer_guid,
            -class.price_credits,
            TransactionType::ClassBooking,
            Some(format!("Booked {} on {}", class.name, instance.scheduled_date)),
            None,
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        "Customer {} booked instance {} ({} credits)",
        customer_guid, instance_guid, class.price_credits
    );
    Ok(booking)
}

/// Cancel a confirmed booking and refund its credits.
///
/// `acting_customer` is None for an admin cancelling on a customer's
/// behalf; customers may only cancel their own bookings, and only before
/// the class starts.
pub async fn cancel_booking(
    pool: &SqlitePool,
    booking_guid: Uuid,
    acting_customer: Option<Uuid>,
) -> Result<Booking> {
    let mut tx = pool.begin().await?;

    let Some(mut booking) = load_booking_for_update(&mut tx, booking_guid).await? else {
        return Err(Error::NotFound("Booking not found".to_string()));
    };

    if let Some(customer_guid) = acting_customer {
        if booking.customer_guid != customer_guid {
            return Err(Error::Forbidden);
        }
    }

    if booking.status != BookingStatus::Confirmed {
        return Err(Error::InvalidInput(
            "Only confirmed bookings can be cancelled".to_string(),
        ));
    }

    let starts_at: String = sqlx::query_scalar(
        "SELECT scheduled_start_time FROM class_instances WHERE guid = ?",
    )
    .bind(booking.class_instance_guid.to_string())
    .fetch_one(&mut *tx)
    .await?;
    if parse_timestamp(&starts_at)? < Utc::now() {
        return Err(Error::AlreadyStarted);
    }

    let now = Utc::now();
    sqlx::query("UPDATE bookings SET status = 'CANCELLED', cancelled_at = ? WHERE guid = ?")
        .bind(now.to_rfc3339())
        .bind(booking_guid.to_string())
        .execute(&mut *tx)
        .await?;

    if booking.credits_used > 0 {
        ledger::apply_credit_delta(
            &mut tx,
            booking.customer_guid,
            booking.credits_used,
            TransactionType::Refund,
            Some(format!("Refund for cancelled booking {}", booking.guid)),
            None,
        )
        .await?;
    }

    tx.commit().await?;

    booking.status = BookingStatus::Cancelled;
    booking.cancelled_at = Some(now);

    info!(
        "Booking {} cancelled, {} credits refunded",
        booking_guid, booking.credits_used
    );
    Ok(booking)
}

/// Time scope for a customer's booking list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingScope {
    Upcoming,
    Past,
    All,
}

impl BookingScope {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("upcoming") => Ok(BookingScope::Upcoming),
            Some("past") => Ok(BookingScope::Past),
            Some("all") => Ok(BookingScope::All),
            Some(other) => Err(Error::InvalidInput(format!(
                "Unknown booking scope: {}",
                other
            ))),
        }
    }
}

/// Booking joined with its class and schedule, for the customer's list view
#[derive(Debug, Clone, Serialize)]
pub struct BookingWithClass {
    #[serde(flatten)]
    pub booking: Booking,
    pub class_name: String,
    pub instructor_name: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
}

/// List a customer's bookings. Upcoming sorts soonest first, past most
/// recent first.
pub async fn list_bookings(
    pool: &SqlitePool,
    customer_guid: Uuid,
    scope: BookingScope,
) -> Result<Vec<BookingWithClass>> {
    let mut sql = String::from(
        "SELECT b.guid, b.customer_guid, b.class_instance_guid, b.status,
                b.credits_used, b.booked_at, b.cancelled_at,
                c.name AS class_name, c.instructor_name,
                i.scheduled_start_time, i.scheduled_end_time
         FROM bookings b
         JOIN class_instances i ON i.guid = b.class_instance_guid
         JOIN classes c ON c.guid = i.class_guid
         WHERE b.customer_guid = ?",
    );
    match scope {
        BookingScope::Upcoming => {
            sql.push_str(
                " AND b.status = 'CONFIRMED' AND i.scheduled_start_time > ?
                  ORDER BY i.scheduled_start_time",
            );
        }
        BookingScope::Past => {
            sql.push_str(
                " AND i.scheduled_start_time <= ?
                  ORDER BY i.scheduled_start_time DESC",
            );
        }
        BookingScope::All => {
            sql.push_str(" ORDER BY i.scheduled_start_time DESC");
        }
    }

    let mut query = sqlx::query(&sql).bind(customer_guid.to_string());
    if scope != BookingScope::All {
        query = query.bind(Utc::now().to_rfc3339());
    }

    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let scheduled_start_time: String = row.get("scheduled_start_time");
            let scheduled_end_time: String = row.get("scheduled_end_time");
            Ok(BookingWithClass {
                booking: row_to_booking(row)?,
                class_name: row.get("class_name"),
                instructor_name: row.get("instructor_name"),
                scheduled_start_time: parse_timestamp(&scheduled_start_time)?,
                scheduled_end_time: parse_timestamp(&scheduled_end_time)?,
            })
        })
        .collect()
}

async fn load_customer_for_update(
    conn: &mut SqliteConnection,
    customer_guid: Uuid,
) -> Result<Customer> {
    let row = sqlx::query(
        "SELECT guid, user_guid, membership_type, membership_status, credits_remaining,
                total_classes_attended, consecutive_weeks_streak, renewal_date, created_at
         FROM customers WHERE guid = ?",
    )
    .bind(customer_guid.to_string())
    .fetch_optional(conn)
    .await?;

    match row.as_ref() {
        Some(row) => crate::db::customers::row_to_customer(row),
        None => Err(Error::NotFound("Customer not found".to_string())),
    }
}

pub(crate) async fn load_booking_for_update(
    conn: &mut SqliteConnection,
    booking_guid: Uuid,
) -> Result<Option<Booking>> {
    let row = sqlx::query(
        "SELECT guid, customer_guid, class_instance_guid, status, credits_used,
                booked_at, cancelled_at
         FROM bookings WHERE guid = ?",
    )
    .bind(booking_guid.to_string())
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(row_to_booking).transpose()
}

pub(crate) fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking> {
    let guid: String = row.get("guid");
    let customer_guid: String = row.get("customer_guid");
    let class_instance_guid: String = row.get("class_instance_guid");
    let status: String = row.get("status");
    let booked_at: String = row.get("booked_at");
    let cancelled_at: Option<String> = row.get("cancelled_at");

    Ok(Booking {
        guid: parse_uuid(&guid)?,
        customer_guid: parse_uuid(&customer_guid)?,
        class_instance_guid: parse_uuid(&class_instance_guid)?,
        status: status.parse()?,
        credits_used: row.get("credits_used"),
        booked_at: parse_timestamp(&booked_at)?,
        cancelled_at: cancelled_at.map(|t| parse_timestamp(&t)).transpose()?,
    })
}

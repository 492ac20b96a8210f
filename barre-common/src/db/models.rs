//! Database models and status enums
//!
//! Enums are stored as their SCREAMING_SNAKE_CASE wire form in TEXT columns
//! (class instance status is lowercase, matching its scheduled/cancelled/
//! completed lifecycle values). `as_str`/`FromStr` round-trip the stored
//! form; serde uses the same spelling in API bodies.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::RecurrencePattern;

/// Declare a TEXT-backed enum with as_str / FromStr over fixed spellings
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stored wire form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Internal(format!(
                        "Invalid {} value: {}", stringify!($name), other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// User account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
    Teacher,
}

text_enum!(Role {
    Customer => "CUSTOMER",
    Admin => "ADMIN",
    Teacher => "TEACHER",
});

/// Customer membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Paused,
    Cancelled,
}

text_enum!(MembershipStatus {
    Active => "ACTIVE",
    Paused => "PAUSED",
    Cancelled => "CANCELLED",
});

/// Booking lifecycle status: CONFIRMED -> ATTENDED or CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Attended,
    Cancelled,
}

text_enum!(BookingStatus {
    Confirmed => "CONFIRMED",
    Attended => "ATTENDED",
    Cancelled => "CANCELLED",
});

/// Class instance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Scheduled,
    Cancelled,
    Completed,
}

text_enum!(InstanceStatus {
    Scheduled => "scheduled",
    Cancelled => "cancelled",
    Completed => "completed",
});

/// How a customer was checked in to a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInMethod {
    Automatic,
    Manual,
    QrCode,
}

text_enum!(CheckInMethod {
    Automatic => "AUTOMATIC",
    Manual => "MANUAL",
    QrCode => "QR_CODE",
});

/// Milestone type, one per (customer, type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointType {
    FirstClass,
    ThirdClass,
    TenthClass,
}

text_enum!(CheckpointType {
    FirstClass => "FIRST_CLASS",
    ThirdClass => "THIRD_CLASS",
    TenthClass => "TENTH_CLASS",
});

/// Credit transaction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    ClassBooking,
    Refund,
    AdminAdjustment,
}

text_enum!(TransactionType {
    ClassBooking => "CLASS_BOOKING",
    Refund => "REFUND",
    AdminAdjustment => "ADMIN_ADJUSTMENT",
});

/// Progress report category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Progress,
    GoalSetting,
}

text_enum!(ReportType {
    Progress => "PROGRESS",
    GoalSetting => "GOAL_SETTING",
});

/// User account row
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub guid: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Customer row; balance and counters are mutated only through the ledger
/// and attendance operations
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub guid: Uuid,
    pub user_guid: Uuid,
    pub membership_type: String,
    pub membership_status: MembershipStatus,
    pub credits_remaining: i64,
    pub total_classes_attended: i64,
    pub consecutive_weeks_streak: i64,
    pub renewal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Immutable append-only credit ledger entry.
///
/// `balance_after == balance_before + amount`, and `balance_before` equals
/// the `balance_after` of the customer's previous transaction.
#[derive(Debug, Clone, Serialize)]
pub struct CreditTransaction {
    pub guid: Uuid,
    pub customer_guid: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub notes: Option<String>,
    pub acting_admin_guid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Static class template; instances derive from its recurrence pattern
#[derive(Debug, Clone, Serialize)]
pub struct Class {
    pub guid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub instructor_name: String,
    pub duration_minutes: i64,
    pub max_capacity: i64,
    pub price_credits: i64,
    pub recurrence_pattern: RecurrencePattern,
    /// Local start time, "HH:MM"
    pub start_time: String,
    /// Local end time, "HH:MM"
    pub end_time: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One concrete, dated occurrence of a Class
#[derive(Debug, Clone, Serialize)]
pub struct ClassInstance {
    pub guid: Uuid,
    pub class_guid: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub status: InstanceStatus,
}

/// Reservation of one customer on one class instance
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub guid: Uuid,
    pub customer_guid: Uuid,
    pub class_instance_guid: Uuid,
    pub status: BookingStatus,
    pub credits_used: i64,
    pub booked_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Check-in record, at most one per booking
#[derive(Debug, Clone, Serialize)]
pub struct Attendance {
    pub guid: Uuid,
    pub booking_guid: Uuid,
    pub customer_guid: Uuid,
    pub class_instance_guid: Uuid,
    pub check_in_method: CheckInMethod,
    pub notes: Option<String>,
    pub attended_at: DateTime<Utc>,
}

/// One-time milestone, awarded when the lifetime attended count exactly
/// reaches the threshold
#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    pub guid: Uuid,
    pub customer_guid: Uuid,
    pub checkpoint_type: CheckpointType,
    pub class_count_at_achievement: i64,
    pub achieved_at: DateTime<Utc>,
}

/// Per-user notification feed row
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub guid: Uuid,
    pub user_guid: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Teacher-authored progress or goal-setting report.
///
/// `ai_analysis` is attached best-effort after creation; a missing value
/// means the AI step failed or was disabled, never that the report failed.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub guid: Uuid,
    pub customer_guid: Uuid,
    pub teacher_user_guid: Uuid,
    pub report_type: ReportType,
    pub title: String,
    pub content: String,
    pub goals: serde_json::Value,
    pub ai_analysis: Option<serde_json::Value>,
    pub sent_at: DateTime<Utc>,
}

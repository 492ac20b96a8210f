//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and brings the schema up
//! idempotently. Table creation uses `CREATE TABLE IF NOT EXISTS` so
//! startup is safe against an already-initialized database, and tests can
//! run the same schema against an in-memory pool via [`create_all_tables`].

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_all_tables(&pool).await?;

    Ok(pool)
}

/// Create the full schema (idempotent). Also used by test setups against
/// in-memory pools.
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_customers_table(pool).await?;
    create_classes_table(pool).await?;
    create_class_instances_table(pool).await?;
    create_bookings_table(pool).await?;
    create_attendance_table(pool).await?;
    create_checkpoints_table(pool).await?;
    create_credit_transactions_table(pool).await?;
    create_notifications_table(pool).await?;
    create_progress_reports_table(pool).await?;
    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL DEFAULT 'CUSTOMER',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_guid TEXT NOT NULL REFERENCES users(guid),
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            guid TEXT PRIMARY KEY,
            user_guid TEXT NOT NULL UNIQUE REFERENCES users(guid),
            membership_type TEXT NOT NULL DEFAULT 'MONTHLY',
            membership_status TEXT NOT NULL DEFAULT 'ACTIVE',
            credits_remaining INTEGER NOT NULL DEFAULT 0,
            total_classes_attended INTEGER NOT NULL DEFAULT 0,
            consecutive_weeks_streak INTEGER NOT NULL DEFAULT 0,
            renewal_date TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            instructor_name TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            max_capacity INTEGER NOT NULL,
            price_credits INTEGER NOT NULL DEFAULT 1,
            recurrence_pattern TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_class_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS class_instances (
            guid TEXT PRIMARY KEY,
            class_guid TEXT NOT NULL REFERENCES classes(guid),
            scheduled_date TEXT NOT NULL,
            scheduled_start_time TEXT NOT NULL,
            scheduled_end_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            UNIQUE(class_guid, scheduled_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_class_instances_start
         ON class_instances(scheduled_start_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_bookings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            guid TEXT PRIMARY KEY,
            customer_guid TEXT NOT NULL REFERENCES customers(guid),
            class_instance_guid TEXT NOT NULL REFERENCES class_instances(guid),
            status TEXT NOT NULL DEFAULT 'CONFIRMED',
            credits_used INTEGER NOT NULL,
            booked_at TEXT NOT NULL,
            cancelled_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bookings_instance_status
         ON bookings(class_instance_guid, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bookings_customer
         ON bookings(customer_guid)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_attendance_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            guid TEXT PRIMARY KEY,
            booking_guid TEXT NOT NULL UNIQUE REFERENCES bookings(guid),
            customer_guid TEXT NOT NULL REFERENCES customers(guid),
            class_instance_guid TEXT NOT NULL REFERENCES class_instances(guid),
            check_in_method TEXT NOT NULL,
            notes TEXT,
            attended_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_checkpoints_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            guid TEXT PRIMARY KEY,
            customer_guid TEXT NOT NULL REFERENCES customers(guid),
            checkpoint_type TEXT NOT NULL,
            class_count_at_achievement INTEGER NOT NULL,
            achieved_at TEXT NOT NULL,
            UNIQUE(customer_guid, checkpoint_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_credit_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_transactions (
            guid TEXT PRIMARY KEY,
            customer_guid TEXT NOT NULL REFERENCES customers(guid),
            transaction_type TEXT NOT NULL,
            amount INTEGER NOT NULL,
            balance_before INTEGER NOT NULL,
            balance_after INTEGER NOT NULL,
            notes TEXT,
            acting_admin_guid TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_credit_transactions_customer
         ON credit_transactions(customer_guid, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            guid TEXT PRIMARY KEY,
            user_guid TEXT NOT NULL REFERENCES users(guid),
            notification_type TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            action_url TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_progress_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_reports (
            guid TEXT PRIMARY KEY,
            customer_guid TEXT NOT NULL REFERENCES customers(guid),
            teacher_user_guid TEXT NOT NULL REFERENCES users(guid),
            report_type TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            goals TEXT NOT NULL DEFAULT '[]',
            ai_analysis TEXT,
            sent_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

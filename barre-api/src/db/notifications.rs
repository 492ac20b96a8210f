//! Per-user notification feed

use barre_common::db::models::Notification;
use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Feed page size
const FEED_LIMIT: i64 = 50;

/// Insert a notification on the caller's connection, so callers inside a
/// transaction keep the insert atomic with their own writes.
pub async fn create_notification_on(
    conn: &mut SqliteConnection,
    user_guid: Uuid,
    notification_type: &str,
    title: &str,
    message: &str,
    action_url: Option<&str>,
) -> Result<Notification> {
    let notification = Notification {
        guid: Uuid::new_v4(),
        user_guid,
        notification_type: notification_type.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        action_url: action_url.map(str::to_string),
        is_read: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO notifications
             (guid, user_guid, notification_type, title, message, action_url, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(notification.guid.to_string())
    .bind(user_guid.to_string())
    .bind(&notification.notification_type)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.action_url)
    .bind(notification.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(notification)
}

pub async fn create_notification(
    pool: &SqlitePool,
    user_guid: Uuid,
    notification_type: &str,
    title: &str,
    message: &str,
    action_url: Option<&str>,
) -> Result<Notification> {
    let mut conn = pool.acquire().await?;
    create_notification_on(&mut conn, user_guid, notification_type, title, message, action_url)
        .await
}

/// Feed page plus unread badge count
#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// Latest notifications for a user, newest first; `unread_only` drops
/// already-read entries from the page (the count is always unread)
pub async fn list_notifications(
    pool: &SqlitePool,
    user_guid: Uuid,
    unread_only: bool,
) -> Result<NotificationFeed> {
    let mut sql = String::from(
        "SELECT guid, user_guid, notification_type, title, message, action_url, is_read, created_at
         FROM notifications WHERE user_guid = ?",
    );
    if unread_only {
        sql.push_str(" AND is_read = 0");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");

    let rows = sqlx::query(&sql)
        .bind(user_guid.to_string())
        .bind(FEED_LIMIT)
        .fetch_all(pool)
        .await?;

    let notifications: Vec<Notification> =
        rows.iter().map(row_to_notification).collect::<Result<_>>()?;

    let unread_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_guid = ? AND is_read = 0",
    )
    .bind(user_guid.to_string())
    .fetch_one(pool)
    .await?;

    Ok(NotificationFeed {
        notifications,
        unread_count,
    })
}

/// Mark the given notifications read; `None` marks the whole feed.
/// Returns the number of rows flipped.
pub async fn mark_read(
    pool: &SqlitePool,
    user_guid: Uuid,
    guids: Option<&[Uuid]>,
) -> Result<u64> {
    let affected = match guids {
        None => {
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_guid = ? AND is_read = 0")
                .bind(user_guid.to_string())
                .execute(pool)
                .await?
                .rows_affected()
        }
        Some(guids) if guids.is_empty() => 0,
        Some(guids) => {
            let placeholders = vec!["?"; guids.len()].join(", ");
            let sql = format!(
                "UPDATE notifications SET is_read = 1
                 WHERE user_guid = ? AND is_read = 0 AND guid IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(user_guid.to_string());
            for guid in guids {
                query = query.bind(guid.to_string());
            }
            query.execute(pool).await?.rows_affected()
        }
    };

    Ok(affected)
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let guid: String = row.get("guid");
    let user_guid: String = row.get("user_guid");
    let created_at: String = row.get("created_at");

    Ok(Notification {
        guid: parse_uuid(&guid)?,
        user_guid: parse_uuid(&user_guid)?,
        notification_type: row.get("notification_type"),
        title: row.get("title"),
        message: row.get("message"),
        action_url: row.get("action_url"),
        is_read: row.get("is_read"),
        created_at: parse_timestamp(&created_at)?,
    })
}

//! Class template CRUD
//!
//! Classes are templates; dated occurrences live in `class_instances` and
//! are produced by the generator in [`crate::db::instances`]. Deleting a
//! class deactivates it so existing instances and bookings stay intact.

use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::db::models::Class;
use barre_common::recurrence::{parse_hhmm, RecurrencePattern};
use barre_common::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub description: Option<String>,
    pub instructor_name: String,
    pub duration_minutes: i64,
    pub max_capacity: i64,
    pub price_credits: i64,
    pub recurrence_pattern: RecurrencePattern,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructor_name: Option<String>,
    pub duration_minutes: Option<i64>,
    pub max_capacity: Option<i64>,
    pub price_credits: Option<i64>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_times(start_time: &str, end_time: &str) -> Result<()> {
    parse_hhmm(start_time)?;
    parse_hhmm(end_time)?;
    Ok(())
}

pub async fn create_class(pool: &SqlitePool, new: NewClass) -> Result<Class> {
    if new.name.trim().is_empty() {
        return Err(Error::InvalidInput("Class name is required".to_string()));
    }
    if new.max_capacity < 1 {
        return Err(Error::InvalidInput(
            "Capacity must be at least 1".to_string(),
        ));
    }
    if new.price_credits < 0 {
        return Err(Error::InvalidInput(
            "Credit price cannot be negative".to_string(),
        ));
    }
    new.recurrence_pattern.validate()?;
    validate_times(&new.start_time, &new.end_time)?;

    let class = Class {
        guid: Uuid::new_v4(),
        name: new.name,
        description: new.description,
        instructor_name: new.instructor_name,
        duration_minutes: new.duration_minutes,
        max_capacity: new.max_capacity,
        price_credits: new.price_credits,
        recurrence_pattern: new.recurrence_pattern,
        start_time: new.start_time,
        end_time: new.end_time,
        is_active: true,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO classes
            (guid, name, description, instructor_name, duration_minutes, max_capacity,
             price_credits, recurrence_pattern, start_time, end_time, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(class.guid.to_string())
    .bind(&class.name)
    .bind(&class.description)
    .bind(&class.instructor_name)
    .bind(class.duration_minutes)
    .bind(class.max_capacity)
    .bind(class.price_credits)
    .bind(serde_json::to_string(&class.recurrence_pattern).map_err(|e| {
        Error::Internal(format!("Failed to serialize recurrence pattern: {}", e))
    })?)
    .bind(&class.start_time)
    .bind(&class.end_time)
    .bind(class.is_active)
    .bind(class.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(class)
}

pub async fn load_class(pool: &SqlitePool, guid: Uuid) -> Result<Option<Class>> {
    let row = sqlx::query(&select_sql("WHERE guid = ?"))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_class).transpose()
}

/// List classes, active only unless `include_inactive`
pub async fn list_classes(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<Class>> {
    let sql = if include_inactive {
        select_sql("ORDER BY name")
    } else {
        select_sql("WHERE is_active = 1 ORDER BY name")
    };

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(row_to_class).collect()
}

/// All classes the instance generator should consider
pub async fn list_active_classes(pool: &SqlitePool) -> Result<Vec<Class>> {
    list_classes(pool, false).await
}

pub async fn update_class(pool: &SqlitePool, guid: Uuid, update: ClassUpdate) -> Result<Class> {
    let existing = load_class(pool, guid)
        .await?
        .ok_or_else(|| Error::NotFound("Class not found".to_string()))?;

    let recurrence_pattern = update
        .recurrence_pattern
        .unwrap_or(existing.recurrence_pattern);
    recurrence_pattern.validate()?;

    let start_time = update.start_time.unwrap_or(existing.start_time);
    let end_time = update.end_time.unwrap_or(existing.end_time);
    validate_times(&start_time, &end_time)?;

    let max_capacity = update.max_capacity.unwrap_or(existing.max_capacity);
    if max_capacity < 1 {
        return Err(Error::InvalidInput(
            "Capacity must be at least 1".to_string(),
        ));
    }

    let class = Class {
        guid,
        name: update.name.unwrap_or(existing.name),
        description: update.description.or(existing.description),
        instructor_name: update.instructor_name.unwrap_or(existing.instructor_name),
        duration_minutes: update.duration_minutes.unwrap_or(existing.duration_minutes),
        max_capacity,
        price_credits: update.price_credits.unwrap_or(existing.price_credits),
        recurrence_pattern,
        start_time,
        end_time,
        is_active: update.is_active.unwrap_or(existing.is_active),
        created_at: existing.created_at,
    };

    sqlx::query(
        r#"
        UPDATE classes
        SET name = ?, description = ?, instructor_name = ?, duration_minutes = ?,
            max_capacity = ?, price_credits = ?, recurrence_pattern = ?,
            start_time = ?, end_time = ?, is_active = ?
        WHERE guid = ?
        "#,
    )
    .bind(&class.name)
    .bind(&class.description)
    .bind(&class.instructor_name)
    .bind(class.duration_minutes)
    .bind(class.max_capacity)
    .bind(class.price_credits)
    .bind(serde_json::to_string(&class.recurrence_pattern).map_err(|e| {
        Error::Internal(format!("Failed to serialize recurrence pattern: {}", e))
    })?)
    .bind(&class.start_time)
    .bind(&class.end_time)
    .bind(class.is_active)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(class)
}

/// Soft delete: the class stops appearing in listings and the generator,
/// but its instances and bookings remain queryable.
pub async fn deactivate_class(pool: &SqlitePool, guid: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE classes SET is_active = 0 WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Class not found".to_string()));
    }
    Ok(())
}

fn select_sql(suffix: &str) -> String {
    format!(
        "SELECT guid, name, description, instructor_name, duration_minutes, max_capacity,
                price_credits, recurrence_pattern, start_time, end_time, is_active, created_at
         FROM classes {}",
        suffix
    )
}

pub(crate) fn row_to_class(row: &sqlx::sqlite::SqliteRow) -> Result<Class> {
    let guid: String = row.get("guid");
    let pattern_json: String = row.get("recurrence_pattern");
    let created_at: String = row.get("created_at");

    Ok(Class {
        guid: parse_uuid(&guid)?,
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
    })
}

#[cfg(test)]
pub(crate) fn tests_weekly_class(days: Vec<u8>, capacity: i64, price: i64) -> NewClass {
    use barre_common::recurrence::RecurrenceKind;

    NewClass {
        name: "Beginner Barre".to_string(),
        description: None,
        instructor_name: "Anna".to_string(),
        duration_minutes: 60,
        max_capacity: capacity,
        price_credits: price,
        recurrence_pattern: RecurrencePattern {
            pattern: RecurrenceKind::Weekly,
            days_of_week: Some(days),
            timezone: "America/New_York".to_string(),
        },
        start_time: "09:00".to_string(),
        end_time: "10:00".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barre_common::db::init::create_all_tables;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_all_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_reload_class() {
        let pool = test_pool().await;
        let created = create_class(&pool, tests_weekly_class(vec![1, 3], 10, 2))
            .await
            .unwrap();

        let loaded = load_class(&pool, created.guid).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Beginner Barre");
        assert_eq!(loaded.max_capacity, 10);
        assert_eq!(
            loaded.recurrence_pattern.days_of_week,
            Some(vec![1, 3])
        );
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_invalid_capacity_rejected() {
        let pool = test_pool().await;
        let err = create_class(&pool, tests_weekly_class(vec![1], 0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_deactivated_class_dropped_from_active_list() {
        let pool = test_pool().await;
        let class = create_class(&pool, tests_weekly_class(vec![1], 10, 1))
            .await
            .unwrap();

        assert_eq!(list_active_classes(&pool).await.unwrap().len(), 1);
        deactivate_class(&pool, class.guid).await.unwrap();
        assert!(list_active_classes(&pool).await.unwrap().is_empty());
        // Still loadable directly
        assert!(load_class(&pool, class.guid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let pool = test_pool().await;
        let class = create_class(&pool, tests_weekly_class(vec![2], 10, 1))
            .await
            .unwrap();

        let updated = update_class(
            &pool,
            class.guid,
            ClassUpdate {
                max_capacity: Some(15),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.max_capacity, 15);
        assert_eq!(updated.name, class.name);
        assert_eq!(updated.start_time, "09:00");
    }
}

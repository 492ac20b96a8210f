//! Teacher progress reports

use barre_common::db::models::{ProgressReport, ReportType};
use barre_common::db::{parse_timestamp, parse_uuid};
use barre_common::{Error, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct NewReport {
    pub customer_guid: Uuid,
    pub teacher_user_guid: Uuid,
    pub report_type: ReportType,
    pub title: String,
    pub content: String,
    pub goals: serde_json::Value,
}

pub async fn create_report(pool: &SqlitePool, new: NewReport) -> Result<ProgressReport> {
    if new.title.trim().is_empty() {
        return Err(Error::InvalidInput("Report title is required".to_string()));
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE guid = ?")
        .bind(new.customer_guid.to_string())
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(Error::NotFound("Customer not found".to_string()));
    }

    let report = ProgressReport {
        guid: Uuid::new_v4(),
        customer_guid: new.customer_guid,
        teacher_user_guid: new.teacher_user_guid,
        report_type: new.report_type,
        title: new.title,
        content: new.content,
        goals: new.goals,
        ai_analysis: None,
        sent_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO progress_reports
             (guid, customer_guid, teacher_user_guid, report_type, title, content, goals, sent_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(report.guid.to_string())
    .bind(report.customer_guid.to_string())
    .bind(report.teacher_user_guid.to_string())
    .bind(report.report_type.as_str())
    .bind(&report.title)
    .bind(&report.content)
    .bind(report.goals.to_string())
    .bind(report.sent_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(report)
}

/// Attach the AI analysis produced after creation. Best-effort callers
/// ignore a failure here.
pub async fn attach_ai_analysis(
    pool: &SqlitePool,
    report_guid: Uuid,
    analysis: &serde_json::Value,
) -> Result<()> {
    sqlx::query("UPDATE progress_reports SET ai_analysis = ? WHERE guid = ?")
        .bind(analysis.to_string())
        .bind(report_guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn load_report(pool: &SqlitePool, guid: Uuid) -> Result<Option<ProgressReport>> {
    let row = sqlx::query(
        "SELECT guid, customer_guid, teacher_user_guid, report_type, title, content,
                goals, ai_analysis, sent_at
         FROM progress_reports WHERE guid = ?",
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_report).transpose()
}

/// Reports, newest first, optionally scoped to one customer
pub async fn list_reports(
    pool: &SqlitePool,
    customer_guid: Option<Uuid>,
) -> Result<Vec<ProgressReport>> {
    let mut sql = String::from(
        "SELECT guid, customer_guid, teacher_user_guid, report_type, title, content,
                goals, ai_analysis, sent_at
         FROM progress_reports",
    );
    if customer_guid.is_some() {
        sql.push_str(" WHERE customer_guid = ?");
    }
    sql.push_str(" ORDER BY sent_at DESC");

    let mut query = sqlx::query(&sql);
    if let Some(customer_guid) = customer_guid {
        query = query.bind(customer_guid.to_string());
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_report).collect()
}

fn row_to_report(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressReport> {
    let guid: String = row.get("guid");
    let customer_guid: String = row.get("customer_guid");
    let teacher_user_guid: String = row.get("teacher_user_guid");
    let report_type: String = row.get("report_type");
    let goals: String = row.get("goals");
    let ai_analysis: Option<String> = row.get("ai_analysis");
    let sent_at: String = row.get("sent_at");

    Ok(ProgressReport {
        guid: parse_uuid(&guid)?,
        customer_guid: parse_uuid(&customer_guid)?,
        teacher_user_guid: parse_uuid(&teacher_user_guid)?,
        report_type: report_type.parse()?,
        title: row.get("title"),
        content: row.get("content"),
        goals: serde_json::from_str(&goals)
            .map_err(|e| Error::Internal(format!("Invalid stored goals: {}", e)))?,
        ai_analysis: ai_analysis
            .map(|a| {
                serde_json::from_str(&a)
                    .map_err(|e| Error::Internal(format!("Invalid stored ai_analysis: {}", e)))
            })
            .transpose()?,
        sent_at: parse_timestamp(&sent_at)?,
    })
}

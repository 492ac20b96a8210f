//! Customer database operations

use barre_common::db::{
    models::{Customer, MembershipStatus},
    parse_timestamp, parse_uuid,
};
use barre_common::{Error, Result};
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Create a customer record for a newly signed-up user
pub async fn create_customer(conn: &mut SqliteConnection, user_guid: Uuid) -> Result<Customer> {
    let customer = Customer {
        guid: Uuid::new_v4(),
        user_guid,
        membership_type: "MONTHLY".to_string(),
        membership_status: MembershipStatus::Active,
        credits_remaining: 0,
        total_classes_attended: 0,
        consecutive_weeks_streak: 0,
        renewal_date: None,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO customers
            (guid, user_guid, membership_type, membership_status, credits_remaining,
             total_classes_attended, consecutive_weeks_streak, renewal_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer.guid.to_string())
    .bind(customer.user_guid.to_string())
    .bind(&customer.membership_type)
    .bind(customer.membership_status.as_str())
    .bind(customer.credits_remaining)
    .bind(customer.total_classes_attended)
    .bind(customer.consecutive_weeks_streak)
    .bind(customer.renewal_date.map(|d| d.to_string()))
    .bind(customer.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(customer)
}

/// Load customer by primary key
pub async fn load_customer(pool: &SqlitePool, guid: Uuid) -> Result<Option<Customer>> {
    let row = sqlx::query(SELECT_CUSTOMER_SQL)
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_customer).transpose()
}

/// Load the customer record belonging to a user account
pub async fn load_customer_by_user(pool: &SqlitePool, user_guid: Uuid) -> Result<Option<Customer>> {
    let row = sqlx::query(
        "SELECT guid, user_guid, membership_type, membership_status, credits_remaining,
                total_classes_attended, consecutive_weeks_streak, renewal_date, created_at
         FROM customers WHERE user_guid = ?",
    )
    .bind(user_guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_customer).transpose()
}

/// Like [`load_customer_by_user`] but a missing record is an error
pub async fn require_customer_by_user(pool: &SqlitePool, user_guid: Uuid) -> Result<Customer> {
    load_customer_by_user(pool, user_guid)
        .await?
        .ok_or_else(|| Error::NotFound("Customer not found".to_string()))
}

/// Admin list filter
#[derive(Debug, Default)]
pub struct CustomerFilter {
    /// Restrict to one membership status
    pub status: Option<MembershipStatus>,
    /// Case-insensitive substring match on name or email
    pub search: Option<String>,
}

/// Customer joined with its user account fields, for admin listings
#[derive(Debug, Clone, serde::Serialize)]
pub struct CustomerWithUser {
    #[serde(flatten)]
    pub customer: Customer,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// List customers for the admin back office, newest first
pub async fn list_customers(
    pool: &SqlitePool,
    filter: &CustomerFilter,
) -> Result<Vec<CustomerWithUser>> {
    let mut sql = String::from(
        "SELECT c.guid, c.user_guid, c.membership_type, c.membership_status,
                c.credits_remaining, c.total_classes_attended, c.consecutive_weeks_streak,
                c.renewal_date, c.created_at,
                u.email, u.first_name, u.last_name, u.phone
         FROM customers c
         JOIN users u ON u.guid = c.user_guid
         WHERE 1 = 1",
    );

    if filter.status.is_some() {
        sql.push_str(" AND c.membership_status = ?");
    }
    if filter.search.is_some() {
        sql.push_str(
            " AND (u.first_name LIKE ? COLLATE NOCASE
               OR u.last_name LIKE ? COLLATE NOCASE
               OR u.email LIKE ? COLLATE NOCASE)",
        );
    }
    sql.push_str(" ORDER BY c.created_at DESC");

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        let like = format!("%{}%", search);
        query = query.bind(like.clone()).bind(like.clone()).bind(like);
    }

    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(CustomerWithUser {
                customer: row_to_customer(row)?,
                email: row.get("email"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                phone: row.get("phone"),
            })
        })
        .collect()
}

/// Admin-editable membership fields; None leaves a field unchanged
#[derive(Debug, Default)]
pub struct MembershipUpdate {
    pub membership_type: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    pub renewal_date: Option<Option<NaiveDate>>,
}

/// Apply an admin membership update, returning the refreshed record
pub async fn update_membership(
    pool: &SqlitePool,
    guid: Uuid,
    update: &MembershipUpdate,
) -> Result<Customer> {
    let existing = load_customer(pool, guid)
        .await?
        .ok_or_else(|| Error::NotFound("Customer not found".to_string()))?;

    let membership_type = update
        .membership_type
        .clone()
        .unwrap_or(existing.membership_type);
    let membership_status = update.membership_status.unwrap_or(existing.membership_status);
    let renewal_date = match &update.renewal_date {
        Some(value) => *value,
        None => existing.renewal_date,
    };

    sqlx::query(
        "UPDATE customers
         SET membership_type = ?, membership_status = ?, renewal_date = ?
         WHERE guid = ?",
    )
    .bind(&membership_type)
    .bind(membership_status.as_str())
    .bind(renewal_date.map(|d| d.to_string()))
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    load_customer(pool, guid)
        .await?
        .ok_or_else(|| Error::Internal("Customer vanished during update".to_string()))
}

const SELECT_CUSTOMER_SQL: &str =
    "SELECT guid, user_guid, membership_type, membership_status, credits_remaining,
            total_classes_attended, consecutive_weeks_streak, renewal_date, created_at
     FROM customers WHERE guid = ?";

pub(crate) fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
    let guid: String = row.get("guid");
    let user_guid: String = row.get("user_guid");
    let membership_status: String = row.get("membership_status");
    let renewal_date: Option<String> = row.get("renewal_date");
    let created_at: String = row.get("created_at");

    Ok(Customer {
        guid: parse_uuid(&guid)?,
        user_guid: parse_uuid(&user_guid)?,
        membership_type: row.get("membership_type"),
        membership_status: membership_status.parse()?,
        credits_remaining: row.get("credits_remaining"),
        total_classes_attended: row.get("total_classes_attended"),
        consecutive_weeks_streak: row.get("consecutive_weeks_streak"),
        renewal_date: renewal_date
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|e| Error::Internal(format!("Invalid renewal_date: {}", e)))
            })
            .transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
pub(crate) async fn tests_insert_customer(pool: &SqlitePool, credits: i64) -> Uuid {
    use crate::db::users;

    let user = users::create_user(
        pool,
        &format!("{}@example.com", Uuid::new_v4()),
        "password123",
        "Test",
        "Customer",
        barre_common::db::models::Role::Customer,
    )
    .await
    .unwrap();

    let customer = load_customer_by_user(pool, user.guid).await.unwrap().unwrap();

    if credits != 0 {
        sqlx::query("UPDATE customers SET credits_remaining = ? WHERE guid = ?")
            .bind(credits)
            .bind(customer.guid.to_string())
            .execute(pool)
            .await
            .unwrap();
    }

    customer.guid
}

//! Credit ledger primitives
//!
//! Every balance mutation goes through [`apply_credit_delta`]: it updates
//! `customers.credits_remaining` and appends one immutable
//! `credit_transactions` row in the caller's transaction, so the two always
//! commit or roll back together.
//!
//! Sufficiency policy is caller-owned: debit flows that must not go
//! negative check the balance before calling; admin adjustments may push
//! the balance negative if the caller permits it.

use barre_common::db::{models::CreditTransaction, models::TransactionType, parse_timestamp, parse_uuid};
use barre_common::{Error, Result};
use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Apply a signed credit delta to a customer inside the caller's
/// transaction.
///
/// `amount` must be non-zero: positive credits, negative debits. Reads the
/// balance, writes `balance + amount` back, and appends the transaction
/// record with before/after snapshots. Returns the appended record.
///
/// # Errors
///
/// `InvalidInput` for a zero amount, `NotFound` if the customer does not
/// exist, `Database` on SQL failure. On any error nothing is applied
/// (the caller's transaction has not been committed).
pub async fn apply_credit_delta(
    conn: &mut SqliteConnection,
    customer_guid: Uuid,
    amount: i64,
    transaction_type: TransactionType,
    notes: Option<String>,
    acting_admin_guid: Option<Uuid>,
) -> Result<CreditTransaction> {
    if amount == 0 {
        return Err(Error::InvalidInput(
            "Credit delta amount must be non-zero".to_string(),
        ));
    }

    let balance_before: i64 =
        sqlx::query_scalar("SELECT credits_remaining FROM customers WHERE guid = ?")
            .bind(customer_guid.to_string())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Customer {}", customer_guid)))?;

    let balance_after = balance_before + amount;
    let now = Utc::now();
    let guid = Uuid::new_v4();

    sqlx::query("UPDATE customers SET credits_remaining = ? WHERE guid = ?")
        .bind(balance_after)
        .bind(customer_guid.to_string())
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO credit_transactions
            (guid, customer_guid, transaction_type, amount,
             balance_before, balance_after, notes, acting_admin_guid, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(customer_guid.to_string())
    .bind(transaction_type.as_str())
    .bind(amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(&notes)
    .bind(acting_admin_guid.map(|g| g.to_string()))
    .bind(now.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(CreditTransaction {
        guid,
        customer_guid,
        transaction_type,
        amount,
        balance_before,
        balance_after,
        notes,
        acting_admin_guid,
        created_at: now,
    })
}

/// Load a customer's transactions, newest first
pub async fn list_transactions(
    pool: &SqlitePool,
    customer_guid: Uuid,
    limit: i64,
) -> Result<Vec<CreditTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, customer_guid, transaction_type, amount,
               balance_before, balance_after, notes, acting_admin_guid, created_at
        FROM credit_transactions
        WHERE customer_guid = ?
        ORDER BY created_at DESC, guid DESC
        LIMIT ?
        "#,
    )
    .bind(customer_guid.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_transaction).collect()
}

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<CreditTransaction> {
    let guid: String = row.get("guid");
    let customer_guid: String = row.get("customer_guid");
    let transaction_type: String = row.get("transaction_type");
    let acting_admin_guid: Option<String> = row.get("acting_admin_guid");
    let created_at: String = row.get("created_at");

    Ok(CreditTransaction {
        guid: parse_uuid(&guid)?,
        customer_guid: parse_uuid(&customer_guid)?,
        transaction_type: transaction_type.parse()?,
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        notes: row.get("notes"),
        acting_admin_guid: acting_admin_guid.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

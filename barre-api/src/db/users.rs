//! User accounts and bearer-token sessions

use barre_common::db::{
    models::{Role, User},
    parse_timestamp, parse_uuid,
};
use barre_common::{Error, Result};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Hash a password with a per-user random salt
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Create a user account; customer accounts also get a customer record.
///
/// The two inserts share a transaction so a half-created customer
/// account cannot be observed.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) -> Result<User> {
    if password.len() < 8 {
        return Err(Error::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let existing = sqlx::query("SELECT guid FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(Error::InvalidInput("Email already registered".to_string()));
    }

    let salt = generate_salt();
    let user = User {
        guid: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash_password(password, &salt),
        password_salt: salt,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone: None,
        role,
        created_at: Utc::now(),
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO users
            (guid, email, password_hash, password_salt, first_name, last_name, phone, role, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.guid.to_string())
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.password_salt)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.role.as_str())
    .bind(user.created_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    if role == Role::Customer {
        crate::db::customers::create_customer(&mut *tx, user.guid).await?;
    }

    tx.commit().await?;

    Ok(user)
}

/// Look up a user by email, verifying the supplied password.
///
/// Returns None for both unknown email and wrong password so callers
/// cannot distinguish the two.
pub async fn verify_credentials(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, email, password_hash, password_salt, first_name, last_name,
                phone, role, created_at
         FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let user = row_to_user(&row)?;

    if hash_password(password, &user.password_salt) == user.password_hash {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Load a user by primary key
pub async fn load_user(pool: &SqlitePool, guid: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, email, password_hash, password_salt, first_name, last_name,
                phone, role, created_at
         FROM users WHERE guid = ?",
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

/// Customer-editable profile fields
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Update a user's own profile fields
pub async fn update_profile(pool: &SqlitePool, guid: Uuid, update: &ProfileUpdate) -> Result<User> {
    let existing = load_user(pool, guid)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

    let first_name = update.first_name.clone().unwrap_or(existing.first_name);
    let last_name = update.last_name.clone().unwrap_or(existing.last_name);
    let phone = update.phone.clone().or(existing.phone);

    sqlx::query("UPDATE users SET first_name = ?, last_name = ?, phone = ? WHERE guid = ?")
        .bind(&first_name)
        .bind(&last_name)
        .bind(&phone)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    load_user(pool, guid)
        .await?
        .ok_or_else(|| Error::Internal("User vanished during update".to_string()))
}

/// Create a session for a logged-in user, returning the bearer token
pub async fn create_session(pool: &SqlitePool, user_guid: Uuid, ttl_hours: i64) -> Result<String> {
    let token = generate_token();
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);

    sqlx::query(
        "INSERT INTO sessions (token, user_guid, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token)
    .bind(user_guid.to_string())
    .bind(now.to_rfc3339())
    .bind(expires_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a bearer token to its user, rejecting expired sessions
pub async fn authenticate_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT user_guid, expires_at FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let expires_at: String = row.get("expires_at");
    if parse_timestamp(&expires_at)? < Utc::now() {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;
        return Ok(None);
    }

    let user_guid: String = row.get("user_guid");
    load_user(pool, parse_uuid(&user_guid)?).await
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let guid: String = row.get("guid");
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");

    Ok(User {
        guid: parse_uuid(&guid)?,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: role.parse()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

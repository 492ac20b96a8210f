//! Database access: initialization, schema, row models

pub mod init;
pub mod models;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parse a TEXT column holding a UUID
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Parse a TEXT column holding an RFC3339 timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

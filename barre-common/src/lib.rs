//! # Barre Common Library
//!
//! Shared code for the Barre class-booking platform:
//! - Error type used across crates
//! - Database initialization, schema, and row models
//! - Recurrence pattern types and expansion math
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod recurrence;

pub use error::{Error, Result};
pub use recurrence::RecurrencePattern;

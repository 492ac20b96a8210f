//! Common error types for Barre

use thiserror::Error;

/// Common result type for Barre operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across Barre crates.
///
/// The booking-rule variants carry no payload: each names one business rule
/// and is mapped to a specific HTTP status and message at the API boundary.
/// Nothing is mutated when any of them is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Requester does not own or may not act on the resource
    #[error("Forbidden")]
    Forbidden,

    /// Customer's membership is not ACTIVE
    #[error("Membership is not active")]
    MembershipInactive,

    /// Class instance has already started (booking path)
    #[error("Cannot book past classes")]
    PastClass,

    /// Class instance is at maximum capacity
    #[error("Class is fully booked")]
    CapacityExceeded,

    /// Customer already holds an active booking on this instance
    #[error("Already booked for this class")]
    AlreadyBooked,

    /// Customer balance is below the class price
    #[error("Insufficient credits")]
    InsufficientCredits,

    /// Class instance has already started (cancellation path)
    #[error("Cannot cancel a class that has already started")]
    AlreadyStarted,

    /// Attendance has already been recorded for this booking
    #[error("Attendance already marked")]
    AlreadyMarked,

    /// Class instance has not started yet (attendance path)
    #[error("Cannot mark attendance before class starts")]
    ClassNotStarted,
}

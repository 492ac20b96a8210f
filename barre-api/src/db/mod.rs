//! Transactional database operations
//!
//! Free async functions over the shared pool, one module per entity.
//! Compound writes (booking + ledger, attendance + counters + checkpoints)
//! each run inside a single SQLite transaction; SQLite allows one writer at
//! a time, so the in-transaction rule checks are serialized with the insert
//! they guard.

pub mod attendance;
pub mod bookings;
pub mod classes;
pub mod customers;
pub mod instances;
pub mod ledger;
pub mod notifications;
pub mod reports;
pub mod stats;
pub mod users;

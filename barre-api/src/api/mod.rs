//! HTTP API handlers

pub mod admin;
pub mod attendance;
pub mod auth;
pub mod bookings;
pub mod classes;
pub mod customers;
pub mod health;
pub mod instances;
pub mod notifications;
pub mod recommendations;
pub mod reports;

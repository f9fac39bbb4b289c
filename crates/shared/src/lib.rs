//! Shared types, errors, and configuration for Chargebook.
//!
//! This crate provides common types used across all other crates:
//! - Money and currency codes with decimal precision
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management, including the ledger and matching tuning knobs

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

//! Database layer with `SeaORM` entities and the PostgreSQL store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`DbStore`], the PostgreSQL implementation of the core storage traits
//! - Database migrations

mod convert;
pub mod entities;
pub mod migration;
mod store;

pub use migration::Migrator;
pub use store::DbStore;

use std::time::Duration;

use chargebook_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}

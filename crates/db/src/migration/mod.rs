//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration. Each one is applied at most
//! once, in the order listed here; applied migrations are recorded in the
//! `seaql_migrations` table and skipped on later runs.

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_charges;
mod m20250101_000002_ledger;
mod m20250101_000003_settings;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_charges::Migration),
            Box::new(m20250101_000002_ledger::Migration),
            Box::new(m20250101_000003_settings::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_strictly_ordered() {
        let names: Vec<String> = Migrator::migrations().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names.len(), 3);
        for pair in names.windows(2) {
            assert!(pair[0] < pair[1], "{} must sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_migration_names_are_timestamp_prefixed() {
        for migration in Migrator::migrations() {
            let name = migration.name().to_string();
            let (stamp, rest) = name.split_at(1 + 8 + 1 + 6);
            assert!(stamp.starts_with('m'), "{name}");
            assert!(stamp[1..9].chars().all(|c| c.is_ascii_digit()), "{name}");
            assert!(stamp[10..].chars().all(|c| c.is_ascii_digit()), "{name}");
            assert!(rest.starts_with('_'), "{name}");
        }
    }
}

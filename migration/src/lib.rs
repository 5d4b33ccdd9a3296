//! Database migrations for the integrations service.
//!
//! Creates the integrations, activity_logs and documents tables.

pub use sea_orm_migration::prelude::*;

mod m2025_02_01_000001_create_integrations;
mod m2025_02_01_000002_create_activity_logs;
mod m2025_02_01_000003_create_documents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_02_01_000001_create_integrations::Migration),
            Box::new(m2025_02_01_000002_create_activity_logs::Migration),
            Box::new(m2025_02_01_000003_create_documents::Migration),
        ]
    }
}

pub use sea_orm_migration::prelude::*;

pub mod m20250301_000001_create_catalog_tables;
pub mod m20250301_000002_create_project_tables;
pub mod m20250315_000003_unique_instance_per_template;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_catalog_tables::Migration),
            Box::new(m20250301_000002_create_project_tables::Migration),
            Box::new(m20250315_000003_unique_instance_per_template::Migration),
        ]
    }
}

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use super::migrations::Migrator;
use crate::errors::SchemaError;

/// Checked once at startup. Services assume the schema is current and never
/// probe for tables or columns themselves.
pub async fn ensure_schema_current(
    db: &DatabaseConnection,
    auto_migrate: bool,
) -> Result<(), SchemaError> {
    let pending = pending_migrations(db).await?;
    if pending.is_empty() {
        info!("Database schema is current");
        return Ok(());
    }

    if !auto_migrate {
        warn!(pending = ?pending, "Database schema is behind; refusing to start");
        return Err(SchemaError::Pending(pending));
    }

    info!(count = pending.len(), "Applying pending migrations");
    Migrator::up(db, None).await?;
    Ok(())
}

pub async fn pending_migrations(db: &DatabaseConnection) -> Result<Vec<String>, SchemaError> {
    let pending = Migrator::get_pending_migrations(db)
        .await?
        .iter()
        .map(|migration| migration.name().to_string())
        .collect();
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn fresh_database_is_rejected_without_auto_migrate() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let err = ensure_schema_current(&db, false).await.unwrap_err();
        match err {
            SchemaError::Pending(names) => assert_eq!(names.len(), Migrator::migrations().len()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn auto_migrate_brings_schema_current() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        ensure_schema_current(&db, true).await.unwrap();
        assert!(pending_migrations(&db).await.unwrap().is_empty());
        ensure_schema_current(&db, false).await.unwrap();
    }
}

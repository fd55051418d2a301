//! Metadata store migrations for the DBHub server

pub use sea_orm_migration::prelude::*;

mod migration;
pub use migration::Migrator;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};

    #[tokio::test]
    async fn test_migrations_apply_and_revert_on_sqlite() -> anyhow::Result<()> {
        let db = Database::connect("sqlite::memory:").await?;

        Migrator::up(&db, None).await?;

        let row = db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT count(*) AS n FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('users', 'sessions', 'databases', 'database_versions')"
                    .to_owned(),
            ))
            .await?
            .expect("count row");
        let n: i64 = row.try_get("", "n")?;
        assert_eq!(n, 4);

        Migrator::down(&db, None).await?;
        Ok(())
    }
}

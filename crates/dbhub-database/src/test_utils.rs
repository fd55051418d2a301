//! Test utilities for metadata store tests
//!
//! Builds an in-memory SQLite metadata store with the real migrations
//! applied, so services can be exercised without an external server.

use std::sync::Arc;

use crate::connection::{establish_connection, ConnectionError, DbConnection, PoolOptions};

/// A migrated, throwaway metadata store
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    pub async fn new() -> Result<Self, ConnectionError> {
        // A single connection keeps every query on the same in-memory database
        let pool = PoolOptions {
            max_connections: 1,
            min_connections: 1,
            ..PoolOptions::default()
        };
        let db = establish_connection("sqlite::memory:", &pool).await?;
        Ok(Self { db })
    }

    pub fn connection_arc(&self) -> Arc<DbConnection> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() -> anyhow::Result<()> {
        let test_db = TestDatabase::new().await?;

        let row = test_db
            .db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT count(*) AS n FROM database_versions".to_owned(),
            ))
            .await?
            .expect("count row");
        let n: i64 = row.try_get("", "n")?;
        assert_eq!(n, 0);
        Ok(())
    }
}

//! Database connection management

use std::sync::Arc;
use std::time::Duration;

use dbhub_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use thiserror::Error;
use tracing::{debug, info};

pub type DbConnection = DatabaseConnection;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to metadata store: {0}")]
    Connect(sea_orm::DbErr),

    #[error("Failed to run migrations: {0}")]
    Migrate(sea_orm::DbErr),
}

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 100,
            min_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Connect to the metadata store and bring its schema up to date.
pub async fn establish_connection(
    database_url: &str,
    pool: &PoolOptions,
) -> Result<Arc<DbConnection>, ConnectionError> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .connect_timeout(pool.connect_timeout)
        .sqlx_logging(false);

    debug!("Connecting to metadata store");
    let db = Database::connect(opt)
        .await
        .map_err(ConnectionError::Connect)?;

    Migrator::up(&db, None)
        .await
        .map_err(ConnectionError::Migrate)?;
    info!("Metadata store migrations applied");

    Ok(Arc::new(db))
}

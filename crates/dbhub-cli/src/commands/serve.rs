use std::sync::Arc;

use axum::{routing::get, Json, Router};
use clap::Args;
use dbhub_cache::{CacheBackend, MemoryCache, RedisCache, ResultCache};
use dbhub_config::ServerConfig;
use dbhub_database::{establish_connection, DbConnection, PoolOptions};
use dbhub_databases::{
    configure_routes, DatabaseApiDoc, DatabaseAppState, DatabaseViewService, IdentityProvider,
    MetadataStore, SeaOrmMetadataStore, SessionIdentityProvider, UploadService,
};
use dbhub_storage::{MemoryObjectStore, ObjectStore, S3ObjectStore, S3Settings};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:8080", env = "DBHUB_ADDRESS")]
    pub address: String,

    /// Metadata store connection URL
    #[arg(long, env = "DBHUB_DATABASE_URL")]
    pub database_url: String,

    /// Redis URL for the result cache; in-memory when unset
    #[arg(long, env = "DBHUB_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO server
    #[arg(long, env = "DBHUB_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, default_value = "us-east-1", env = "DBHUB_S3_REGION")]
    pub s3_region: String,

    #[arg(long, env = "DBHUB_S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "DBHUB_S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// Lifetime of rendered results, in seconds
    #[arg(long, env = "DBHUB_CACHE_TTL")]
    pub cache_ttl: Option<u64>,

    /// Lifetime of resolved object locations, in seconds
    #[arg(long, env = "DBHUB_LOCATION_CACHE_TTL")]
    pub location_cache_ttl: Option<u64>,

    /// Most rows a CSV export returns
    #[arg(long, env = "DBHUB_CSV_MAX_ROWS")]
    pub csv_max_rows: Option<u32>,

    /// Keep database files in memory when no S3 credentials are given,
    /// even with a persistent metadata store
    #[arg(long, env = "DBHUB_DEV")]
    pub dev: bool,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.server_config();
        config.validate()?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(serve(config))
    }

    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.address.clone(), self.database_url.clone());
        config.redis_url = self.redis_url.clone();
        config.s3_endpoint = self.s3_endpoint.clone();
        config.s3_region = self.s3_region.clone();
        config.s3_access_key = self.s3_access_key.clone();
        config.s3_secret_key = self.s3_secret_key.clone();
        if let Some(ttl) = self.cache_ttl {
            config.cache_ttl_secs = ttl;
        }
        if let Some(ttl) = self.location_cache_ttl {
            config.location_cache_ttl_secs = ttl;
        }
        if let Some(rows) = self.csv_max_rows {
            config.limits.csv_max_rows = rows;
        }
        config.dev_mode = self.dev;
        config
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    debug!("Initializing metadata store connection...");
    let db = establish_connection(&config.database_url, &PoolOptions::default()).await?;

    let cache = connect_cache(&config).await?;
    let store = connect_store(&config).await?;
    let state = build_state(db, store, cache, &config);
    let app = build_application(state);

    let listener = TcpListener::bind(&config.address).await?;
    info!("DBHub server listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("DBHub server exited");
    Ok(())
}

async fn connect_cache(config: &ServerConfig) -> anyhow::Result<Arc<dyn CacheBackend>> {
    match config.redis_url.as_deref() {
        Some(url) => Ok(Arc::new(RedisCache::connect(url).await?)),
        None => {
            warn!("No Redis URL configured; using the in-memory result cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

async fn connect_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    if !config.has_object_store() {
        if !config.allows_volatile_objects() {
            anyhow::bail!(
                "No S3 credentials configured for a persistent metadata store; \
                 stored versions would point at files lost on restart"
            );
        }
        warn!("No S3 credentials configured; database files are kept in memory");
        return Ok(Arc::new(MemoryObjectStore::new()));
    }

    let settings = S3Settings {
        region: config.s3_region.clone(),
        endpoint: config.s3_endpoint.clone(),
        access_key: config.s3_access_key.clone().unwrap_or_default(),
        secret_key: config.s3_secret_key.clone().unwrap_or_default(),
    };
    Ok(Arc::new(S3ObjectStore::connect(&settings).await?))
}

fn build_state(
    db: Arc<DbConnection>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheBackend>,
    config: &ServerConfig,
) -> Arc<DatabaseAppState> {
    let metadata: Arc<dyn MetadataStore> = Arc::new(SeaOrmMetadataStore::new(db.clone()));
    let identity: Arc<dyn IdentityProvider> = Arc::new(SessionIdentityProvider::new(db));

    Arc::new(DatabaseAppState {
        view_service: Arc::new(DatabaseViewService::new(
            metadata.clone(),
            store.clone(),
            ResultCache::new(cache),
            config,
        )),
        upload_service: Arc::new(UploadService::new(metadata, store)),
        identity,
    })
}

fn build_application(state: Arc<DatabaseAppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(DatabaseApiDoc::openapi()) }),
        )
        .merge(configure_routes().with_state(state))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

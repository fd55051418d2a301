use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Rendered results live for two days
pub const DEFAULT_CACHE_TTL_SECS: u64 = 172_800;
/// Resolved locations are short-lived so new uploads show up quickly
pub const DEFAULT_LOCATION_CACHE_TTL_SECS: u64 = 120;
pub const DEFAULT_CSV_MAX_ROWS: u32 = 1_000_000;

#[derive(Error, Debug)]
pub enum ConfigServiceError {
    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },
}

/// Row ceilings applied to every read
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReadLimits {
    /// Rows shown to anonymous viewers
    pub anonymous_rows: u32,
    /// Lower bound of the per-user preference
    pub pref_min_rows: u32,
    /// Upper bound of the per-user preference
    pub pref_max_rows: u32,
    /// Used when a signed-in user has no stored preference
    pub pref_default_rows: u32,
    pub vis_page_rows: u32,
    pub vis_data_rows: u32,
    pub csv_max_rows: u32,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            anonymous_rows: 10,
            pref_min_rows: 1,
            pref_max_rows: 500,
            pref_default_rows: 10,
            vis_page_rows: 1000,
            vis_data_rows: 2500,
            csv_max_rows: DEFAULT_CSV_MAX_ROWS,
        }
    }
}

impl ReadLimits {
    /// Clamp a stored user preference into the allowed range
    pub fn clamp_pref(&self, stored: Option<i32>) -> u32 {
        match stored {
            Some(rows) if rows > 0 => {
                (rows as u32).clamp(self.pref_min_rows, self.pref_max_rows)
            }
            Some(_) => self.pref_min_rows,
            None => self.pref_default_rows,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    // Required fields
    pub address: String,
    pub database_url: String,

    // External services; the in-memory fallbacks are for local use
    pub redis_url: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_access_key: Option<String>,
    #[serde(skip_serializing, default)]
    pub s3_secret_key: Option<String>,

    // Caching
    pub cache_ttl_secs: u64,
    pub location_cache_ttl_secs: u64,

    pub limits: ReadLimits,

    /// Permits the in-memory object store next to a persistent metadata store
    #[serde(default)]
    pub dev_mode: bool,
}

impl ServerConfig {
    /// Create a new configuration with defaults for everything optional
    pub fn new(address: String, database_url: String) -> Self {
        ServerConfig {
            address,
            database_url,
            redis_url: None,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            location_cache_ttl_secs: DEFAULT_LOCATION_CACHE_TTL_SECS,
            limits: ReadLimits::default(),
            dev_mode: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigServiceError> {
        if self.address.trim().is_empty() {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "address must not be empty".to_string(),
            });
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "database_url must not be empty".to_string(),
            });
        }
        if self.cache_ttl_secs == 0 || self.location_cache_ttl_secs == 0 {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "cache TTLs must be at least one second".to_string(),
            });
        }
        if self.limits.csv_max_rows == 0 {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "csv_max_rows must be at least 1".to_string(),
            });
        }
        if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "S3 access key and secret key must be given together".to_string(),
            });
        }
        if !self.has_object_store() && !self.allows_volatile_objects() {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "no object store configured; set S3 credentials, or use --dev to keep \
                          database files in memory"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// S3 is used only when credentials are present
    pub fn has_object_store(&self) -> bool {
        let configured = self.s3_access_key.is_some() && self.s3_secret_key.is_some();
        if !configured && self.s3_endpoint.is_some() {
            warn!("S3 endpoint set without credentials; ignoring it");
        }
        configured
    }

    /// Files may live in memory only when the versions pointing at them
    /// vanish with the process too, or in dev mode
    pub fn allows_volatile_objects(&self) -> bool {
        self.dev_mode || self.metadata_in_memory()
    }

    fn metadata_in_memory(&self) -> bool {
        let url = self.database_url.as_str();
        url.starts_with("sqlite::memory:") || url.contains("mode=memory")
    }

    pub fn get_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn get_location_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.location_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new("0.0.0.0:8080".into(), "sqlite::memory:".into());
        assert!(config.validate().is_ok());
        assert_eq!(config.get_cache_ttl(), Duration::from_secs(172_800));
        assert_eq!(config.get_location_cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.limits.anonymous_rows, 10);
        assert_eq!(config.limits.vis_data_rows, 2500);
        assert!(!config.has_object_store());
    }

    #[test]
    fn test_pref_is_clamped() {
        let limits = ReadLimits::default();
        assert_eq!(limits.clamp_pref(None), 10);
        assert_eq!(limits.clamp_pref(Some(0)), 1);
        assert_eq!(limits.clamp_pref(Some(-5)), 1);
        assert_eq!(limits.clamp_pref(Some(250)), 250);
        assert_eq!(limits.clamp_pref(Some(10_000)), 500);
    }

    #[test]
    fn test_half_configured_credentials_are_rejected() {
        let mut config = ServerConfig::new("0.0.0.0:8080".into(), "sqlite::memory:".into());
        config.s3_access_key = Some("minio".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let mut config = ServerConfig::new("0.0.0.0:8080".into(), "sqlite::memory:".into());
        config.location_cache_ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigServiceError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_persistent_metadata_requires_object_store() {
        let mut config = ServerConfig::new(
            "0.0.0.0:8080".into(),
            "sqlite:///var/lib/dbhub/meta.db?mode=rwc".into(),
        );
        assert!(!config.allows_volatile_objects());
        assert!(matches!(
            config.validate(),
            Err(ConfigServiceError::InvalidConfiguration { .. })
        ));

        config.dev_mode = true;
        assert!(config.validate().is_ok());

        config.dev_mode = false;
        config.s3_access_key = Some("minio".into());
        config.s3_secret_key = Some("minio123".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_in_memory_metadata_allows_memory_objects() {
        for url in ["sqlite::memory:", "sqlite://meta.db?mode=memory&cache=shared"] {
            let config = ServerConfig::new("0.0.0.0:8080".into(), url.into());
            assert!(config.allows_volatile_objects(), "{}", url);
            assert!(config.validate().is_ok(), "{}", url);
        }
    }

    #[test]
    fn test_serialized_form_omits_secret() {
        let mut config = ServerConfig::new("0.0.0.0:8080".into(), "sqlite::memory:".into());
        config.s3_secret_key = Some("hunter2".into());
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["limits"]["csv_max_rows"], 1_000_000);
        assert!(json.get("s3_secret_key").is_none());
    }
}

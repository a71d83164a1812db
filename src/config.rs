use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::progress::RetryConfig;

/// Main configuration structure for module-progress
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleProgressConfig {
    /// Where the module catalog is read from
    pub catalog: CatalogConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Projection cache settings
    pub cache: CacheConfig,
    /// Local retry policy for transient store failures
    pub retry: RetryConfig,
    /// Database settings (optional; in-memory store when absent)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the TOML catalog file
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve projections from a per-user cache
    pub enabled: bool,
    /// Maximum number of cached user projections
    pub max_capacity: u64,
    /// Time-to-live for a cached projection
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u64,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "modules.toml".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 10_000,
            ttl_seconds: 300, // 5 minutes
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".module-progress/progress.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            auto_migrate: true,
        }
    }
}

impl Default for ModuleProgressConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            observability: ObservabilityConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            database: Some(DatabaseConfig::default()),
        }
    }
}

impl ModuleProgressConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (module-progress.toml)
    /// 3. Environment variables (prefixed with MODULE_PROGRESS, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("module-progress.toml").exists() {
            builder = builder.add_source(File::with_name("module-progress"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MODULE_PROGRESS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let module_progress_config: ModuleProgressConfig = config.try_deserialize()?;

        Ok(module_progress_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ModuleProgressConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = ModuleProgressConfig::load_env_file();
        ModuleProgressConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ModuleProgressConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModuleProgressConfig::default();
        assert_eq!(config.catalog.path, "modules.toml");
        assert!(config.cache.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.database.unwrap().auto_migrate);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: ModuleProgressConfig = toml::from_str(
            r#"
            [catalog]
            path = "courses/modules.toml"

            [database]
            path = "/tmp/progress.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.path, "courses/modules.toml");
        assert_eq!(config.observability.log_level, "info");
        let database = config.database.unwrap();
        assert_eq!(database.path, "/tmp/progress.db");
        assert_eq!(database.max_connections, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("module-progress.toml");

        let mut config = ModuleProgressConfig::default();
        config.cache.enabled = false;
        config.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let reloaded: ModuleProgressConfig = toml::from_str(&content).unwrap();
        assert!(!reloaded.cache.enabled);
    }
}

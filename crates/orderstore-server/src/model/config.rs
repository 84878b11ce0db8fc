//! Configuration management for the orderstore server
//!
//! Settings come from `conf/application.yml`, then `ORDERSTORE_*` environment
//! variables, then command line overrides.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment};
use orderstore_persistence::{
    ContainerRef, CosmosClientConfig, PersistenceError, PoolConfig, StorageBackend,
};

use super::constants::{
    CONFIG_FILE, COSMOS_ACCOUNT, COSMOS_CONNECT_TIMEOUT_MS, COSMOS_CONTAINER_NAME,
    COSMOS_DATABASE_NAME, COSMOS_KEY, COSMOS_REQUEST_TIMEOUT_MS, DB_POOL_CONNECTION_TIMEOUT,
    DB_POOL_IDLE_TIMEOUT, DB_POOL_INITIALIZATION_FAIL_TIMEOUT, DB_POOL_MAX_LIFETIME,
    DB_POOL_MAX_SIZE, DB_POOL_MIN_SIZE, DB_POOL_SQLX_LOGGING, DB_URL,
    DEFAULT_COSMOS_CONTAINER_NAME, DEFAULT_COSMOS_DATABASE_NAME, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
    ENV_PREFIX, ENV_SEPARATOR, IN_MEMORY_DB_URL, LOGS_CONSOLE, LOGS_FILE, LOGS_LEVEL, LOGS_PATH,
    LOGS_ROTATION, SEED_ENABLED, SHUTDOWN_TIMEOUT_SECS, USE_COSMOS, USE_IN_MEMORY_DB,
};
use crate::startup::{LogRotation, LoggingConfig};

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "orderstore-server")]
struct Cli {
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long = "use-cosmos")]
    use_cosmos: Option<bool>,
    #[arg(long = "use-in-memory-db")]
    use_in_memory_db: Option<bool>,
    #[arg(short = 'c', long = "config", default_value = CONFIG_FILE)]
    config_file: String,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration for the running process
    pub fn new() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    /// Load configuration with an explicit argument list
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_cli(Cli::try_parse_from(args)?)
    }

    fn from_cli(args: Cli) -> anyhow::Result<Self> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(&args.config_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        if let Some(v) = args.database_url {
            config_builder = config_builder.set_override(DB_URL, v)?;
        }
        if let Some(v) = args.use_cosmos {
            config_builder = config_builder.set_override(USE_COSMOS, v)?;
        }
        if let Some(v) = args.use_in_memory_db {
            config_builder = config_builder.set_override(USE_IN_MEMORY_DB, v)?;
        }

        let app_config = config_builder.build().map_err(|e| {
            anyhow::anyhow!("Failed to build configuration - check {}: {}", args.config_file, e)
        })?;

        Ok(Configuration { config: app_config })
    }

    // ========================================================================
    // Backend Selection
    // ========================================================================

    pub fn use_cosmos(&self) -> bool {
        self.config.get_bool(USE_COSMOS).unwrap_or(false)
    }

    pub fn use_in_memory_db(&self) -> bool {
        self.config.get_bool(USE_IN_MEMORY_DB).unwrap_or(false)
    }

    /// Backend selected by the two switches; both set is a configuration error
    pub fn storage_backend(&self) -> Result<StorageBackend, PersistenceError> {
        match (self.use_cosmos(), self.use_in_memory_db()) {
            (true, true) => Err(PersistenceError::configuration(format!(
                "'{}' and '{}' are mutually exclusive",
                USE_COSMOS, USE_IN_MEMORY_DB
            ))),
            (true, false) => Ok(StorageBackend::Document),
            (false, true) => Ok(StorageBackend::InMemoryRelational),
            (false, false) => Ok(StorageBackend::Relational),
        }
    }

    // ========================================================================
    // Relational Database
    // ========================================================================

    /// Connection string for the selected relational backend
    pub fn database_url(&self, backend: StorageBackend) -> Result<String, PersistenceError> {
        if backend == StorageBackend::InMemoryRelational {
            return Ok(IN_MEMORY_DB_URL.to_string());
        }
        self.config
            .get_string(DB_URL)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                PersistenceError::configuration(format!(
                    "No valid connection string found, set '{}', --db-url or DATABASE_URL",
                    DB_URL
                ))
            })
    }

    pub fn pool_config(&self, backend: StorageBackend) -> PoolConfig {
        let base = if backend == StorageBackend::InMemoryRelational {
            PoolConfig::in_memory()
        } else {
            PoolConfig {
                max_connections: self.config.get_int(DB_POOL_MAX_SIZE).unwrap_or(100) as u32,
                min_connections: self.config.get_int(DB_POOL_MIN_SIZE).unwrap_or(1) as u32,
                idle_timeout: Some(Duration::from_secs(
                    self.config.get_int(DB_POOL_IDLE_TIMEOUT).unwrap_or(10) as u64,
                )),
                max_lifetime: Some(Duration::from_secs(
                    self.config.get_int(DB_POOL_MAX_LIFETIME).unwrap_or(1800) as u64,
                )),
                ..Default::default()
            }
        };

        PoolConfig {
            connect_timeout: Duration::from_secs(
                self.config.get_int(DB_POOL_CONNECTION_TIMEOUT).unwrap_or(30) as u64,
            ),
            acquire_timeout: Duration::from_secs(
                self.config
                    .get_int(DB_POOL_INITIALIZATION_FAIL_TIMEOUT)
                    .unwrap_or(8) as u64,
            ),
            sqlx_logging: self.config.get_bool(DB_POOL_SQLX_LOGGING).unwrap_or(false),
            ..base
        }
    }

    // ========================================================================
    // Document Store
    // ========================================================================

    pub fn cosmos_client_config(&self) -> Result<CosmosClientConfig, PersistenceError> {
        let account = self.config.get_string(COSMOS_ACCOUNT).map_err(|_| {
            PersistenceError::configuration(format!("'{}' is not configured", COSMOS_ACCOUNT))
        })?;
        let key = self.config.get_string(COSMOS_KEY).map_err(|_| {
            PersistenceError::configuration(format!("'{}' is not configured", COSMOS_KEY))
        })?;

        let defaults = CosmosClientConfig::default();
        Ok(CosmosClientConfig::new(&account, &key).with_timeouts(
            self.config
                .get_int(COSMOS_CONNECT_TIMEOUT_MS)
                .map(|v| v as u64)
                .unwrap_or(defaults.connect_timeout_ms),
            self.config
                .get_int(COSMOS_REQUEST_TIMEOUT_MS)
                .map(|v| v as u64)
                .unwrap_or(defaults.request_timeout_ms),
        ))
    }

    pub fn cosmos_container(&self) -> ContainerRef {
        ContainerRef::new(
            self.config
                .get_string(COSMOS_DATABASE_NAME)
                .unwrap_or(DEFAULT_COSMOS_DATABASE_NAME.to_string()),
            self.config
                .get_string(COSMOS_CONTAINER_NAME)
                .unwrap_or(DEFAULT_COSMOS_CONTAINER_NAME.to_string()),
        )
    }

    // ========================================================================
    // Startup
    // ========================================================================

    pub fn seed_enabled(&self) -> bool {
        self.config.get_bool(SEED_ENABLED).unwrap_or(false)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(SHUTDOWN_TIMEOUT_SECS)
                .map(|v| v as u64)
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        )
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOGS_PATH).ok(),
            self.config.get_bool(LOGS_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOGS_FILE).unwrap_or(true),
            self.config
                .get_string(LOGS_LEVEL)
                .unwrap_or("info".to_string()),
            self.config
                .get_string(LOGS_ROTATION)
                .map(|name| LogRotation::from_name(&name))
                .unwrap_or(LogRotation::Daily),
        )
    }
}

//! Configuration keys and defaults for the orderstore server

pub const CONFIG_FILE: &str = "conf/application.yml";
pub const ENV_PREFIX: &str = "ORDERSTORE";
pub const ENV_SEPARATOR: &str = "__";

// Backend selection
pub const USE_COSMOS: &str = "usecosmos";
pub const USE_IN_MEMORY_DB: &str = "useinmemorydb";

// Relational database
pub const DB_URL: &str = "db.url";
pub const DB_POOL_MAX_SIZE: &str = "db.pool.config.maximumPoolSize";
pub const DB_POOL_MIN_SIZE: &str = "db.pool.config.minimumPoolSize";
pub const DB_POOL_CONNECTION_TIMEOUT: &str = "db.pool.config.connectionTimeout";
pub const DB_POOL_INITIALIZATION_FAIL_TIMEOUT: &str = "db.pool.config.initializationFailTimeout";
pub const DB_POOL_IDLE_TIMEOUT: &str = "db.pool.config.idleTimeout";
pub const DB_POOL_MAX_LIFETIME: &str = "db.pool.config.maxLifetime";
pub const DB_POOL_SQLX_LOGGING: &str = "db.pool.config.sqlxLogging";

pub const IN_MEMORY_DB_URL: &str = "sqlite::memory:";

// Document store
pub const COSMOS_ACCOUNT: &str = "cosmosdb.account";
pub const COSMOS_KEY: &str = "cosmosdb.key";
pub const COSMOS_DATABASE_NAME: &str = "cosmosdb.databasename";
pub const COSMOS_CONTAINER_NAME: &str = "cosmosdb.containername";
pub const COSMOS_CONNECT_TIMEOUT_MS: &str = "cosmosdb.connecttimeoutms";
pub const COSMOS_REQUEST_TIMEOUT_MS: &str = "cosmosdb.requesttimeoutms";

pub const DEFAULT_COSMOS_DATABASE_NAME: &str = "OrderDb";
pub const DEFAULT_COSMOS_CONTAINER_NAME: &str = "Orders";

// Startup
pub const SEED_ENABLED: &str = "seed.enabled";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "server.shutdownTimeoutSecs";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// Logging
pub const LOGS_PATH: &str = "logs.path";
pub const LOGS_CONSOLE: &str = "logs.console";
pub const LOGS_FILE: &str = "logs.file";
pub const LOGS_LEVEL: &str = "logs.level";
pub const LOGS_ROTATION: &str = "logs.rotation";

//! Well-known names used when locating and overriding configuration

pub const CONFIG_DIR_NAME: &str = "shardex";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_WORKER_POOL_SIZE: &str = "SHARDEX_WORKER_POOL_SIZE";
pub const ENV_MAX_CONNECTIONS_PER_DATA_SOURCE: &str = "SHARDEX_MAX_CONNECTIONS_PER_DATA_SOURCE";
pub const ENV_STRICT_MODE: &str = "SHARDEX_STRICT_MODE";
pub const ENV_TIMEOUT_MS: &str = "SHARDEX_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "SHARDEX_LOG_LEVEL";

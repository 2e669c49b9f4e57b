use std::path::PathBuf;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub expansion: ExpansionConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per collection.
    pub collection_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory holding one sub-directory per cached collection.
    pub root: PathBuf,
    /// How long a caller waits for another caller's in-flight population
    /// before parsing the object itself.
    pub population_timeout_ms: u64,
}

impl CacheConfig {
    /// ## Summary
    /// Returns the population wait bound as a `Duration`.
    #[must_use]
    pub const fn population_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.population_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    /// Upper bound on rule candidates generated for one object in one query.
    pub max_candidates: usize,
    /// IANA zone used for floating date-times and all-day dates.
    pub reference_timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Number of objects processed concurrently within one query.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Log every item cache decision at debug level.
    pub cache_actions: bool,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional `config.toml`.
    /// Environment variables take precedence over file values.
    ///
    /// Environment keys use the `CALDERA_` prefix and `__` between nested
    /// keys, e.g. `CALDERA_CACHE__POPULATION_TIMEOUT_MS=250`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it, or
    /// validating the resulting values fails.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("storage.collection_root", "collections")?
            .set_default("cache.enabled", true)?
            .set_default("cache.root", ".caldera-cache")?
            .set_default("cache.population_timeout_ms", 5000)?
            .set_default("expansion.max_candidates", 100_000)?
            .set_default("expansion.reference_timezone", "UTC")?
            .set_default("query.concurrency", 8)?
            .set_default("logging.level", "info")?
            .set_default("logging.cache_actions", false)?
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            // Env
            .add_source(
                config::Environment::with_prefix("CALDERA")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake)
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks the values that would otherwise fail deep inside a query.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` naming the first invalid key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.query.concurrency == 0 {
            return Err(CoreError::ConfigError(
                "query.concurrency must be at least 1".to_string(),
            ));
        }
        if self.expansion.max_candidates == 0 {
            return Err(CoreError::ConfigError(
                "expansion.max_candidates must be at least 1".to_string(),
            ));
        }
        if self.expansion.reference_timezone.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "expansion.reference_timezone must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

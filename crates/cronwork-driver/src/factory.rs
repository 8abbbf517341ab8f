//! Name-keyed driver construction for configuration-driven call sites.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::cache::CacheDriver;
use crate::kv::FileCache;
use crate::null::NullDriver;
use crate::redis::RedisDriver;
use crate::{DriverError, Result, ScheduleDriver};

/// Connection details for the named drivers. Only the fields the selected
/// driver needs have to be populated.
#[derive(Debug, Default, Clone)]
pub struct DriverConfig {
    /// `redis://` connection string for the `redis` driver.
    pub redis_url: Option<String>,
    /// Backing file for the `cache` driver. Absent means in-memory only.
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct DriverFactory;

impl DriverFactory {
    /// Build a driver by its configured name: `cache`, `redis` or `null`.
    pub async fn make(name: &str, config: &DriverConfig) -> Result<Arc<dyn ScheduleDriver>> {
        let driver: Arc<dyn ScheduleDriver> = match name {
            "cache" => match &config.cache_file {
                Some(path) => Arc::new(CacheDriver::new(Arc::new(FileCache::open(path)?))),
                None => Arc::new(CacheDriver::in_memory()),
            },
            "redis" => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    DriverError::Configuration(
                        "redis driver selected but no redis url configured".to_string(),
                    )
                })?;
                Arc::new(RedisDriver::connect(url).await?)
            }
            "null" => Arc::new(NullDriver::new()),
            other => {
                return Err(DriverError::Configuration(format!(
                    "unknown schedule driver: {other}"
                )));
            }
        };
        info!(driver = name, "schedule driver ready");
        Ok(driver)
    }
}

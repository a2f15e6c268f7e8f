// Daemon configuration
//
// Defaults overlaid with FRAMEFORGE_* environment variables, e.g.
// FRAMEFORGE_POOL_SIZE=8 or FRAMEFORGE_GENERATOR_URL=http://gpu:8080/generate

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use frameforge_core::application::worker::constants::{
    DEFAULT_FALLBACK_URL, DEFAULT_POOL_SIZE, DEFAULT_RESTART_BACKOFF_MS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
};
use frameforge_core::application::{ExecutorConfig, PoolConfig, RetryPolicy};
use frameforge_core::port::UploadTarget;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.frameforge/dispatch.db";
const DEFAULT_QUEUE: &str = "image_generation";
const DEFAULT_STORAGE_FOLDER: &str = "frameforge/images";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub db_path: String,
    pub queue_name: String,
    pub pool_size: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub restart_backoff_ms: u64,
    pub generator_url: String,
    pub storage_url: String,
    pub storage_folder: String,
    #[serde(default)]
    pub storage_transformation: Option<String>,
    pub fallback_url: String,
    pub http_timeout_secs: u64,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("queue_name", DEFAULT_QUEUE)?
            .set_default("pool_size", DEFAULT_POOL_SIZE as i64)?
            .set_default("retry_max_attempts", DEFAULT_RETRY_MAX_ATTEMPTS as i64)?
            .set_default("retry_base_delay_ms", DEFAULT_RETRY_BASE_DELAY_MS as i64)?
            .set_default("restart_backoff_ms", DEFAULT_RESTART_BACKOFF_MS as i64)?
            .set_default("generator_url", "http://127.0.0.1:7860/generate")?
            .set_default("storage_url", "http://127.0.0.1:7861/upload")?
            .set_default("storage_folder", DEFAULT_STORAGE_FOLDER)?
            .set_default("fallback_url", DEFAULT_FALLBACK_URL)?
            .set_default("http_timeout_secs", 120_i64)?
            .add_source(Environment::with_prefix("FRAMEFORGE").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let mut config: DaemonConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.db_path = expand_db_path(&config.db_path);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            bail!("FRAMEFORGE_POOL_SIZE must be at least 1");
        }
        if self.queue_name.trim().is_empty() {
            bail!("FRAMEFORGE_QUEUE_NAME must not be empty");
        }
        if self.http_timeout_secs == 0 {
            bail!("FRAMEFORGE_HTTP_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            size: self.pool_size,
            restart_backoff: Duration::from_millis(self.restart_backoff_ms),
            executor: ExecutorConfig {
                retry: RetryPolicy::new(
                    self.retry_max_attempts,
                    Duration::from_millis(self.retry_base_delay_ms),
                ),
                upload_target: UploadTarget {
                    folder: self.storage_folder.clone(),
                    transformation: self.storage_transformation.clone(),
                },
                fallback_url: self.fallback_url.clone(),
            },
        }
    }
}

/// `~` is expanded; `sqlite:` URLs and `:memory:` pass through
fn expand_db_path(raw: &str) -> String {
    if raw.starts_with("sqlite:") || raw == ":memory:" {
        raw.to_string()
    } else {
        shellexpand::tilde(raw).into_owned()
    }
}

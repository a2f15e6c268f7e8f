//! Logging setup
//!
//! - `RUST_LOG` overrides the filter (default `frameforge=info`)
//! - `FRAMEFORGE_LOG_FORMAT=json` switches to structured JSON output
//! - `FRAMEFORGE_LOG_DIR` adds a daily rolling file next to stdout
//!
//! ```text
//! FRAMEFORGE_LOG_FORMAT=json FRAMEFORGE_LOG_DIR=/var/log/frameforge \
//!     ./frameforge-dispatch
//! ```

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "frameforge=info";
const LOG_FILE_PREFIX: &str = "frameforge-dispatch.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer; keep it alive until exit.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let json = std::env::var("FRAMEFORGE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let stdout_layer = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().pretty().boxed()
    };

    let (file_layer, guard) = match std::env::var("FRAMEFORGE_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

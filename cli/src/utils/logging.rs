use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Installs the global subscriber.
///
/// Console output goes to stderr so stdout stays machine-readable. When
/// `log_dir` is set, a daily-rolling file is written there as well and the
/// returned guard must be held until exit to flush it.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        // Fallback to UTC if the local offset cannot be determined
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("authzctl")
                .filename_suffix("log")
                .build(dir)
                .context("Failed to create log file appender")?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer)
                .with_target(false),
        )
        .init();

    if let Some(dir) = log_dir {
        tracing::info!("Log files are being written to: {}", dir.display());
    }

    Ok(guard)
}

//! Log setup: stdout always, plus an append-only file when `[log] file` is set.

use std::path::Path;

use anyhow::{Context, Result};
use herald_core::config::LogConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Keeps the file writer flushing; hold it until exit.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

pub fn init(verbose: bool, log: &LogConfig) -> Result<TelemetryGuard> {
    let directives = if verbose {
        "herald=debug,herald_scheduler=debug,herald_channels=debug,herald_ledger=debug"
    } else {
        "herald=info,herald_scheduler=info,herald_channels=info,herald_ledger=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let (file_layer, guard) = match log.resolved_file() {
        Some(path) => {
            let (writer, guard) = file_writer(&path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    if let Some(path) = log.resolved_file() {
        tracing::info!("📝 Logging to {}", path.display());
    }
    Ok(TelemetryGuard { _file: guard })
}

/// Non-blocking appender writing to exactly `path`, parent directories created.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("log file '{}' has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_writer_creates_directory_and_file() {
        let dir = std::env::temp_dir().join(format!("herald-log-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("notifications.log");

        let (mut writer, guard) = file_writer(&path).unwrap();
        writer.write_all(b"order 1001 confirmed\n").unwrap();
        drop(guard);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("order 1001 confirmed"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_writer_needs_a_file_name() {
        assert!(file_writer(Path::new("/")).is_err());
    }
}

//! Tracing subscriber setup for binaries embedding the supervisor.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use xqemu_shared::errors::{XqemuError, XqemuResult};

/// File name prefix of the rolling log; the date is appended per day.
pub const LOG_FILE_PREFIX: &str = "xqemu-manager.log";

/// Install the global subscriber.
///
/// Events go to stderr, filtered by `RUST_LOG` (default `info`). With
/// `log_dir`, they are also written to a daily rolling file there. Keep the
/// returned guard alive for as long as file output is wanted; dropping it
/// flushes the file writer.
pub fn init_logging(log_dir: Option<&Path>) -> XqemuResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| XqemuError::Config(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn test_log_dir_gets_rolling_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init_logging(Some(&log_dir)).unwrap();
        assert!(guard.is_some());
        tracing::info!("logging initialised");
        drop(guard);

        let names: Vec<String> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|name| name.starts_with(LOG_FILE_PREFIX)));

        // A second install is refused, not a panic.
        assert!(matches!(init_logging(None), Err(XqemuError::Config(_))));
    }
}

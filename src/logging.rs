//! Logging configuration using the tracing ecosystem.
//!
//! The library itself only emits `tracing` events. Host applications that do
//! not install their own subscriber can call [`init`] to get:
//! - File-based output under the local data directory
//! - Daily log rotation
//! - Environment-based log level configuration
//!
//! Secrets are never part of any event emitted by this crate.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Default log level if RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "mantis_client=info,warn";

/// Initialize the logging system for the application `app_name`.
///
/// Logs go to `<local data dir>/<app_name>/logs/<app_name>.log`, rotated
/// daily.
///
/// # Log Levels
///
/// Configure via `RUST_LOG` environment variable:
/// - `RUST_LOG=debug` - Verbose output for debugging
/// - `RUST_LOG=mantis_client=debug` - Debug only for the Mantis client,
///   including every remote procedure call
///
/// # Errors
///
/// Returns an error if:
/// - The log directory cannot be determined or created
/// - A global tracing subscriber is already set
///
/// # Example
///
/// ```no_run
/// use mantis_client::logging;
///
/// logging::init("bugtracker").expect("Failed to initialize logging");
/// ```
pub fn init(app_name: &str) -> anyhow::Result<()> {
    let log_dir = get_log_directory(app_name)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &log_dir, format!("{}.log", app_name));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(
        app = app_name,
        version = env!("CARGO_PKG_VERSION"),
        "Mantis client logging initialized"
    );
    tracing::debug!(log_dir = %log_dir.display(), "Log directory");

    Ok(())
}

/// Get the log directory path for `app_name`.
fn get_log_directory(app_name: &str) -> anyhow::Result<PathBuf> {
    if app_name.trim().is_empty() {
        anyhow::bail!("Application name cannot be empty");
    }

    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join(app_name).join("logs"))
}

/// Get the path where logs are stored for `app_name`.
///
/// This is useful for displaying to users where they can find log files.
pub fn log_directory(app_name: &str) -> Option<PathBuf> {
    get_log_directory(app_name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_has_expected_structure() {
        let dir = get_log_directory("bugtracker").unwrap();
        assert!(dir.ends_with("bugtracker/logs"));
    }

    #[test]
    fn test_log_directory_rejects_empty_name() {
        assert!(get_log_directory(" ").is_err());
        assert!(log_directory("").is_none());
    }

    #[test]
    fn test_log_directory_public_function() {
        let dir = log_directory("bugtracker");
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("bugtracker/logs"));
    }
}

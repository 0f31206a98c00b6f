//! Logging bootstrap.
//!
//! Installs the global `tracing` subscriber. Verbosity is controlled via
//! the standard `RUST_LOG` environment variable, defaulting to `info`.
//! When a log directory is given, output goes to a daily-rolling file
//! instead of stderr.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive.
///
/// Must be held for the lifetime of the program when file logging is
/// enabled; dropping it flushes and stops the background writer.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init(log_dir: Option<&Path>) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "downpour.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            LogGuard {
                _file_guard: Some(guard),
            }
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            LogGuard { _file_guard: None }
        }
    }
}

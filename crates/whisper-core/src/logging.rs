//! Tracing setup.
//!
//! Events go to stderr through a non-blocking writer; the filter comes from
//! `WHISPER_LOG` (same syntax as `RUST_LOG`) and defaults to `warn`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "WHISPER_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Flushes buffered log lines when dropped.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber. Returns `None` if one is already set.
pub fn init() -> Option<LoggingGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true),
    );

    if subscriber.try_init().is_err() {
        return None;
    }

    tracing::debug!("tracing initialized");

    Some(LoggingGuard { _guard: guard })
}

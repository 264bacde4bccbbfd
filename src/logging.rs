//! Tracing subscriber setup for the binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "ARCHITECT_LOG";

/// Default directives for a verbosity count.
fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "architect=info,tower_http=warn",
        1 => "architect=debug,tower_http=debug",
        _ => "architect=trace,tower_http=trace",
    }
}

/// Filter from `ARCHITECT_LOG`, then `RUST_LOG`, then the verbosity default.
fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)))
}

/// Installs the global subscriber, writing to stderr so stdout stays clean
/// for JSON artifacts. Calling it twice is harmless.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

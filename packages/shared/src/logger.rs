//! Logging setup utilities for the AlumniBridge binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Library crates whose events are enabled by the default filter.
const WORKSPACE_TARGETS: [&str; 3] = [
    "alumnibridge_shared",
    "alumnibridge_client",
    "alumnibridge_stub_server",
];

/// Build the default filter directive for the workspace crates and the binary.
///
/// Binary names use `-` while tracing targets use `_`, so the binary name is
/// normalized the same way as the crate names.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    WORKSPACE_TARGETS
        .iter()
        .copied()
        .chain(std::iter::once(binary_name))
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "alumnibridge-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use alumnibridge_shared::logger::setup_logger;
///
/// setup_logger("alumnibridge-client", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

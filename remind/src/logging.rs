// Logging setup shared by the CLI and daemon
// Logs go to stderr; RUST_LOG overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Default filter for the daemon: alert fires and lifecycle events
pub const DAEMON_FILTER: &str = "remind=info,remind_lib=info";

/// Default filter for the CLI: only problems, stdout is for command output
pub const CLI_FILTER: &str = "remind=warn,remind_lib=warn";

/// Install the global subscriber; later calls are no-ops
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

//! `tracing` subscriber setup.
//!
//! Logs go to stderr so they never interleave with the managed program's
//! stdout. The filter comes from `HostConfig::log_filter`.

use tracing_subscriber::EnvFilter;

/// Filter used when the configured directive does not parse.
const FALLBACK_FILTER: &str = "warn";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(filter: &str) {
    let filter = match EnvFilter::try_new(filter) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("invalid log filter {:?} ({}), using {:?}", filter, err, FALLBACK_FILTER);
            EnvFilter::new(FALLBACK_FILTER)
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

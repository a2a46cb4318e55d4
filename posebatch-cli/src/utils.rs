//! Common utility functions shared across CLI commands.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "POSEBATCH_LOG";

/// Default filter level from the verbosity flags.
pub fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Build the log filter from `POSEBATCH_LOG`, then `RUST_LOG`, then `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize logging to stderr. Stdout is kept for the run summary.
pub fn init_tracing(quiet: bool, verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level(quiet, verbose)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Convert `--job-timeout-secs`, treating 0 as no timeout.
pub fn job_timeout(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|&s| s > 0).map(Duration::from_secs)
}

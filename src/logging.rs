//! Diagnostic logging to stderr.
//!
//! The filter comes from `TWIG_LOG` when set (any `EnvFilter` directive, e.g.
//! `twig=debug`), otherwise from `log.level` in the config.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter
pub const LOG_ENV: &str = "TWIG_LOG";

/// Install the global subscriber. Safe to call more than once; only the
/// first call has an effect. Never panics, even on a bad filter string.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

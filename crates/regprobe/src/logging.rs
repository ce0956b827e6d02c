//! Stderr logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an explicit log filter.
pub const LOG_ENV: &str = "REGPROBE_LOG";

/// Filter used when [`LOG_ENV`] is unset or empty.
#[must_use]
pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Chooses the filter directive from the environment value and `-v`.
#[must_use]
pub fn filter_directive(env_value: Option<&str>, verbose: bool) -> String {
    env_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| default_directive(verbose).to_string(), str::to_string)
}

/// Installs a `fmt` subscriber writing to stderr.
///
/// An invalid [`LOG_ENV`] value falls back to the default filter. Calling this
/// twice leaves the first subscriber in place.
pub fn init(verbose: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(env_value.as_deref(), verbose);
    let filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

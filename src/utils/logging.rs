//! Logging initialization
//!
//! Log level resolution, first match wins:
//! - `RUST_LOG` (full `EnvFilter` directive syntax)
//! - `UWB_LOG_LEVEL`
//! - `debug` when the configuration enables debug logging, `info` otherwise

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a fallback filter directive
pub const LOG_LEVEL_ENV: &str = "UWB_LOG_LEVEL";

/// Install the global subscriber. Compact single-line output to stderr.
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed or a global
/// subscriber is already installed.
pub fn init(debug_logging: bool) -> anyhow::Result<()> {
    let env_filter = build_filter(debug_logging)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        )
        .try_init()?;

    Ok(())
}

fn build_filter(debug_logging: bool) -> anyhow::Result<EnvFilter> {
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_level(debug_logging).to_string());
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?)
}

fn default_level(debug_logging: bool) -> &'static str {
    if debug_logging {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}

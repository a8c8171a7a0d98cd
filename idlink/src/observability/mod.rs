//! Structured logging
//!
//! Installs a `tracing` subscriber filtered by `RUST_LOG` (or a build-profile
//! default) and formatted as configured. Request spans come from
//! `tower_http::trace::TraceLayer` in the router.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset
#[must_use]
pub const fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,idlink=trace"
    } else {
        "info"
    }
}

/// Initialize the global subscriber
///
/// # Errors
///
/// Returns error if a global subscriber is already installed
///
/// # Example
///
/// ```rust,no_run
/// use idlink::{config::LogFormat, observability};
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init(LogFormat::Json)?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives()));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        assert!(default_directives().parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever test installs first wins; the other call must error, not panic
        let first = init(LogFormat::Json);
        let second = init(LogFormat::Pretty);
        assert!(first.is_err() || second.is_err());
    }
}

//! Diagnostic logging setup
//!
//! Library code logs through `tracing` macros; the binary installs one
//! `tracing-subscriber` formatter writing to stderr. `RUST_LOG` takes
//! precedence over the verbosity chosen on the command line.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Logging options derived from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for this crate's own events
    pub level: Level,
    /// Include the module target in each line
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: Level::INFO, include_target: false }
    }
}

impl LoggingConfig {
    /// `debug` when verbose, `info` otherwise.
    pub fn from_verbosity(verbose: bool) -> Self {
        if verbose {
            Self { level: Level::DEBUG, include_target: true }
        } else {
            Self::default()
        }
    }

    /// Filter directive applied when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        format!("{}={}", env!("CARGO_CRATE_NAME"), self.level)
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = match env::var("RUST_LOG") {
            Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
            _ => EnvFilter::new(config.directive()),
        };

        // try_init: a subscriber installed by an embedding program wins
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(config.include_target))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.include_target);
    }

    #[test]
    fn test_verbose_config() {
        let config = LoggingConfig::from_verbosity(true);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_target);
        assert_eq!(LoggingConfig::from_verbosity(false), LoggingConfig::default());
    }

    #[test]
    fn test_directive() {
        assert_eq!(LoggingConfig::default().directive(), "assetpipe=INFO");
        assert_eq!(LoggingConfig::from_verbosity(true).directive(), "assetpipe=DEBUG");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::from_verbosity(true));
    }
}

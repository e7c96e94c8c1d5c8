//! Logging setup with `tracing` and `tracing-subscriber`.
//!
//! - `error`: validation failures that abort a run
//! - `warn`: reused caches, unassigned variables, skipped histogram blocks
//! - `info`: pipeline stages and every written file
//! - `debug`: per-block details
//!
//! `RUST_LOG` takes precedence over the `-v`/`-q` flags.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub with_ansi: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_ansi: true,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Level from the number of `-v` and `-q` flags, starting at info.
    #[must_use]
    pub fn from_verbosity(verbose: u8, quiet: u8) -> Self {
        let level = match i16::from(verbose) - i16::from(quiet) {
            i16::MIN..=-2 => Level::ERROR,
            -1 => Level::WARN,
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber writing to stderr. Call once at startup.
pub fn init_logging(config: &LogConfig) {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .without_time();

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(layer)
        .init();
}

fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    // other crates stay at warn
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,surveygraph={}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LogConfig::from_verbosity(0, 0).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1, 0).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(3, 0).level, Level::TRACE);
        assert_eq!(LogConfig::from_verbosity(0, 1).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(0, 5).level, Level::ERROR);
        assert_eq!(LogConfig::from_verbosity(2, 1).level, Level::DEBUG);
    }

    #[test]
    fn test_with_ansi() {
        assert!(!LogConfig::default().with_ansi(false).with_ansi);
    }
}

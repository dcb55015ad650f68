//! Logging setup for rollcall.
//!
//! At normal verbosity the only info lines are the repository's load and save
//! summaries. `RUST_LOG` replaces the per-verbosity defaults entirely.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings, plus sheet load and save summaries.
    #[default]
    Normal,
    /// Debug detail, except the per-run statistics chatter.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Filter directives applied when `RUST_LOG` is unset.
    #[must_use]
    pub fn directives(self) -> &'static str {
        match self {
            Self::Quiet => "rollcall=error",
            Self::Normal => "rollcall=warn,rollcall::repository=info",
            Self::Verbose => "rollcall=debug,rollcall::stats=info",
            Self::Trace => "rollcall=trace",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Initialize the logging system.
///
/// Call once at startup; later calls are ignored.
///
/// # Examples
///
/// ```no_run
/// use rollcall::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    // Stdout carries command output; logs go to stderr.
    let _ = tracing_subscriber::registry()
        .with(verbosity.filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= Verbosity::Verbose)
                .without_time(),
        )
        .try_init();
}

/// Initialize logging for tests: warnings from the crate, captured per test.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rollcall=warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_verbosity_keeps_repository_summaries() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
        assert!(Verbosity::Normal
            .directives()
            .contains("rollcall::repository=info"));
    }

    #[test]
    fn test_directives_parse_as_filters() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(
                EnvFilter::try_new(verbosity.directives()).is_ok(),
                "{verbosity:?}"
            );
        }
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Verbose < Verbosity::Trace);
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}

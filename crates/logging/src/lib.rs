#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_logging` centralises the verbosity flag handling and
//! tracing-subscriber setup used by the `svr` and `svrd` binaries, so both
//! front-ends interpret `-v` stacking identically and respect the same
//! `SVR_LOG` environment override.
//!
//! # Examples
//!
//! ```
//! use svr_logging::Verbosity;
//!
//! assert_eq!(Verbosity::from_occurrences(0), Verbosity::Normal);
//! assert_eq!(Verbosity::from_occurrences(2), Verbosity::Debug);
//! assert_eq!(Verbosity::Debug.directive(), "debug");
//! ```

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the command-line verbosity.
pub const ENV_FILTER_VAR: &str = "SVR_LOG";

/// Logging verbosity selected by stacked `-v` flags.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Verbosity {
    /// Warnings and errors plus lifecycle info events.
    #[default]
    Normal,
    /// Adds per-operation info events (`-v`).
    Verbose,
    /// Adds debug events such as parse diagnostics (`-vv`).
    Debug,
    /// Everything, including per-frame traces (`-vvv` and beyond).
    Trace,
}

impl Verbosity {
    /// Maps a stacked flag count to a verbosity level.
    #[must_use]
    pub const fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Returns the default filter directive for this level.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Normal => "info",
            Self::Verbose => "info,svr_broker=debug,svr_client=debug",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Installs the global tracing subscriber for a binary.
///
/// The `SVR_LOG` environment variable takes precedence over the
/// command-line level. Calling this twice is a no-op: the second install
/// attempt is discarded, which keeps tests that share a process happy.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(ENV_FILTER_VAR)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_mapping_saturates() {
        assert_eq!(Verbosity::from_occurrences(0), Verbosity::Normal);
        assert_eq!(Verbosity::from_occurrences(1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_occurrences(2), Verbosity::Debug);
        assert_eq!(Verbosity::from_occurrences(3), Verbosity::Trace);
        assert_eq!(Verbosity::from_occurrences(200), Verbosity::Trace);
    }

    #[test]
    fn levels_order_by_chattiness() {
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
        assert!(Verbosity::Debug < Verbosity::Trace);
    }

    #[test]
    fn init_is_idempotent() {
        init(Verbosity::Normal);
        init(Verbosity::Trace);
    }
}

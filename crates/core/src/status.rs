//! Centralized status code definitions shared by the client and broker.
//!
//! Every control request is answered with a response whose first component is
//! one of these codes rendered as a decimal string. [`Status::Success`] is
//! zero; all failures are nonzero. Nothing in the workspace retries on a
//! failed status - codes are surfaced to the caller unchanged.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Status codes returned by router operations.
///
/// The numbering is part of the wire contract and must not be reordered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum Status {
    /// Operation completed (code 0).
    Success = 0,

    /// An option string was syntactically invalid (code 1).
    ///
    /// The offending byte offset travels in the structured parse error, not
    /// in this code.
    ParseError = 1,

    /// An encoding name is not registered (code 2).
    NoSuchEncoding = 2,

    /// The operation requires a state the entity has not reached (code 3),
    /// e.g. sending a frame through a source with no negotiated encoding.
    InvalidState = 3,

    /// An argument violates an invariant (code 4), e.g. frame dimensions
    /// that differ from the locked frame properties.
    InvalidArgument = 4,

    /// Transport failure: connection lost or a malformed response (code 5).
    CommFailure = 5,

    /// The broker refused to open a source under a name already in use
    /// (code 6).
    NameClash = 6,

    /// The broker was asked to operate on an unknown source or stream
    /// (code 7).
    NoSuchSource = 7,

    /// The source backing a stream was closed; the stream is orphaned and
    /// will deliver no further frames (code 8).
    SourceClosed = 8,
}

impl Status {
    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Reconstructs a status from its wire code.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::ParseError),
            2 => Some(Self::NoSuchEncoding),
            3 => Some(Self::InvalidState),
            4 => Some(Self::InvalidArgument),
            5 => Some(Self::CommFailure),
            6 => Some(Self::NameClash),
            7 => Some(Self::NoSuchSource),
            8 => Some(Self::SourceClosed),
            _ => None,
        }
    }

    /// Reports whether this status denotes success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns a short human-readable description for diagnostics.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ParseError => "option string parse error",
            Self::NoSuchEncoding => "no such encoding",
            Self::InvalidState => "invalid state",
            Self::InvalidArgument => "invalid argument",
            Self::CommFailure => "communication failure",
            Self::NameClash => "source name already in use",
            Self::NoSuchSource => "no such source",
            Self::SourceClosed => "source closed",
        }
    }
}

impl fmt::Display for Status {
    /// Renders the decimal wire form, e.g. `"0"` for success.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error returned when parsing a status code from its wire form fails.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unrecognized status code: {input:?}")]
pub struct ParseStatusError {
    input: String,
}

impl ParseStatusError {
    /// Returns the rejected input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| ParseStatusError {
                input: s.to_string(),
            })
    }
}

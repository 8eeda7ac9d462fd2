//! Error types for the producer API.

use svr_core::{OptionStringError, Status};
use svr_encodings::{CodecError, EncodingError};
use svr_protocol::ResponseError;
use svr_protocol::wire::WireError;
use thiserror::Error;

/// Transport-level failures on the broker connection.
#[derive(Debug, Error)]
pub enum CommError {
    /// The initial TCP connection could not be established.
    #[error("failed to connect to broker at {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying socket error.
        source: std::io::Error,
    },

    /// The connection failed mid-exchange; any pending request is lost and
    /// never retried.
    #[error("broker connection failed: {0}")]
    ConnectionLost(#[from] WireError),

    /// The broker's reply did not follow the status-first response shape.
    #[error("malformed broker response: {0}")]
    MalformedResponse(#[from] ResponseError),
}

impl CommError {
    /// Every transport failure collapses to [`Status::CommFailure`].
    #[must_use]
    pub const fn status(&self) -> Status {
        Status::CommFailure
    }
}

/// Failures of producer-side source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The broker answered with a non-success status.
    #[error("broker rejected {operation}: {status} ({})", .status.description())]
    Rejected {
        /// The request verb that was refused.
        operation: &'static str,
        /// The broker's status code.
        status: Status,
    },

    /// The encoding descriptor was syntactically invalid.
    #[error(transparent)]
    Parse(#[from] OptionStringError),

    /// The descriptor named an encoding that is not registered locally.
    #[error("no such encoding: {name:?}")]
    UnknownEncoding {
        /// The unregistered name.
        name: String,
    },

    /// The operation requires state the source has not reached, e.g.
    /// sending a frame before any encoding was negotiated.
    #[error("source {name:?} has no negotiated encoding")]
    NoEncoding {
        /// Source name.
        name: String,
    },

    /// A frame's geometry differs from the source's locked properties.
    #[error("frame geometry {actual} does not match locked properties {expected}")]
    DimensionMismatch {
        /// The locked frame properties.
        expected: svr_core::FrameProperties,
        /// The offending frame's properties.
        actual: svr_core::FrameProperties,
    },

    /// Building the encoder from the negotiated options failed.
    #[error(transparent)]
    EncoderSetup(#[from] EncodingError),

    /// The encoder rejected a frame.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The underlying connection failed.
    #[error(transparent)]
    Comm(#[from] CommError),
}

impl SourceError {
    /// Collapses the failure onto the wire status taxonomy.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Rejected { status, .. } => *status,
            Self::Parse(_) => Status::ParseError,
            Self::UnknownEncoding { .. } => Status::NoSuchEncoding,
            Self::NoEncoding { .. } => Status::InvalidState,
            Self::DimensionMismatch { .. }
            | Self::EncoderSetup(_)
            | Self::Codec(_) => Status::InvalidArgument,
            Self::Comm(_) => Status::CommFailure,
        }
    }
}

//! Encoder/decoder contracts and the shared output drain buffer.

use std::collections::VecDeque;

use svr_core::{Frame, FrameProperties};
use thiserror::Error;

/// Errors raised by encoders and decoders.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A frame's geometry differs from the geometry the codec was built for.
    #[error("frame geometry {actual} does not match negotiated geometry {expected}")]
    GeometryMismatch {
        /// Geometry the codec was constructed with.
        expected: FrameProperties,
        /// Geometry of the offending frame.
        actual: FrameProperties,
    },

    /// The codec backend rejected a frame.
    #[error("{encoding} encoding failed: {reason}")]
    EncodeFailed {
        /// Encoding name.
        encoding: &'static str,
        /// Backend diagnostic.
        reason: String,
    },

    /// An incoming byte stream violated the encoding's framing.
    #[error("{encoding} bitstream is corrupt: {reason}")]
    CorruptStream {
        /// Encoding name.
        encoding: &'static str,
        /// What was violated.
        reason: String,
    },

    /// An I/O failure inside a codec stage (deflate streams report through
    /// this variant).
    #[error("codec I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Stateful frame-to-bytes transducer.
///
/// Encoders are not reentrant: callers must not invoke [`Encoder::encode`]
/// concurrently for the same instance. The owning entity's lock enforces
/// this throughout the workspace.
pub trait Encoder: Send + std::fmt::Debug {
    /// Consumes one frame, appending its encoded form to the internal
    /// output buffer.
    fn encode(&mut self, frame: &Frame) -> Result<(), CodecError>;

    /// Bytes currently drainable through [`Encoder::read_data`].
    fn data_ready(&self) -> usize;

    /// Copies up to `buf.len()` pending bytes into `buf`, advancing the
    /// internal cursor. Returns the number of bytes copied, which may be
    /// less than [`Encoder::data_ready`].
    fn read_data(&mut self, buf: &mut [u8]) -> usize;
}

/// Stateful bytes-to-frames transducer, tolerant of arbitrary chunking.
pub trait Decoder: Send {
    /// Feeds encoded bytes; partial frames are buffered internally.
    fn decode(&mut self, data: &[u8]) -> Result<(), CodecError>;

    /// Reports whether at least one whole frame is assembled.
    fn frame_ready(&self) -> bool;

    /// Removes and returns the oldest assembled frame.
    fn take_frame(&mut self) -> Option<Frame>;
}

/// FIFO byte buffer backing every encoder's drainable output.
#[derive(Debug, Default)]
pub struct DrainBuffer {
    bytes: VecDeque<u8>,
}

impl DrainBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends encoded bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Reports whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Moves up to `buf.len()` bytes into `buf`, returning the count moved.
    pub fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.bytes.len());
        for slot in buf.iter_mut().take(count) {
            // Pop cannot fail: count is bounded by the queue length.
            *slot = self.bytes.pop_front().unwrap_or_default();
        }
        count
    }
}

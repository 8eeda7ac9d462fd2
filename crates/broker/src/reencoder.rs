//! Per-stream encoding adapters.
//!
//! Every stream attached to a source owns a [`Reencoder`] converting the
//! source's encoded bytes into the stream's negotiated encoding. The
//! variant is a pure function of the (source encoding, stream encoding,
//! options) triple:
//!
//! - identical encodings with compatible options pass bytes through
//!   unchanged;
//! - `ffv1` to `ffv1` re-frames container records without touching the
//!   compressed bodies, preserving the intra/inter structure;
//! - everything else decodes to frames and re-encodes, the costliest path.

use svr_core::{FrameProperties, OptionString, Status};
use svr_encodings::{
    CodecError, Decoder, Encoder, Encoding, EncodingError, ffv1::RecordScanner,
};
use thiserror::Error;

/// Failures while adapting source bytes to a stream encoding.
#[derive(Debug, Error)]
pub enum ReencodeError {
    /// A codec stage failed on the byte stream.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The variant could not be constructed from the negotiated options.
    #[error(transparent)]
    Setup(#[from] EncodingError),
}

impl ReencodeError {
    /// Maps the failure onto the wire status taxonomy.
    #[must_use]
    pub const fn status(&self) -> Status {
        Status::InvalidArgument
    }
}

/// A source-to-stream encoding adapter.
pub enum Reencoder {
    /// Byte pass-through for identical negotiations.
    DirectCopy {
        /// Pending output retrieved by the stream writer.
        output: Vec<u8>,
    },
    /// Container re-framing between `ffv1` negotiations: chunked input
    /// records come out whole, one per delivery, bodies untouched.
    Ffv1 {
        /// Record reassembly state.
        scanner: RecordScanner,
        /// Pending output retrieved by the stream writer.
        output: Vec<u8>,
    },
    /// Full transcode: decode source frames, re-encode for the stream.
    Full {
        /// Decoder for the source's encoding.
        decoder: Box<dyn Decoder>,
        /// Encoder for the stream's encoding.
        encoder: Box<dyn Encoder>,
        /// Pending output retrieved by the stream writer.
        output: Vec<u8>,
    },
}

/// Reports whether every option the stream insists on matches the source.
///
/// Keys the stream leaves unspecified are treated as "don't care", so a
/// stream asking for plain `jpeg` direct-copies from a `jpeg;quality=90`
/// source, while `jpeg;quality=50` forces a transcode.
fn options_compatible(source: &OptionString, stream: &OptionString) -> bool {
    stream
        .options()
        .iter()
        .all(|(key, value)| source.get(key) == Some(value.as_str()))
}

impl Reencoder {
    /// Selects the cheapest variant able to adapt `source` to `stream`.
    pub fn select(
        source_encoding: Encoding,
        source_options: &OptionString,
        source_properties: FrameProperties,
        stream_encoding: Encoding,
        stream_options: &OptionString,
    ) -> Result<Self, ReencodeError> {
        if source_encoding == stream_encoding
            && options_compatible(source_options, stream_options)
        {
            return Ok(Self::DirectCopy { output: Vec::new() });
        }

        if source_encoding == Encoding::Ffv1 && stream_encoding == Encoding::Ffv1 {
            return Ok(Self::Ffv1 {
                scanner: RecordScanner::new(),
                output: Vec::new(),
            });
        }

        Ok(Self::Full {
            decoder: source_encoding.decoder(source_options, source_properties)?,
            encoder: stream_encoding.encoder(stream_options, source_properties)?,
            output: Vec::new(),
        })
    }

    /// Consumes `data`, producing whatever whole output it can; partial
    /// frames are buffered internally. Returns the number of bytes
    /// appended to the output buffer by this call.
    pub fn reencode(&mut self, data: &[u8]) -> Result<usize, ReencodeError> {
        match self {
            Self::DirectCopy { output } => {
                output.extend_from_slice(data);
                Ok(data.len())
            }
            Self::Ffv1 { scanner, output } => {
                let before = output.len();
                scanner.push(data);
                while let Some(record) = scanner.next_record()? {
                    output.extend_from_slice(record.as_bytes());
                }
                Ok(output.len() - before)
            }
            Self::Full {
                decoder,
                encoder,
                output,
            } => {
                let before = output.len();
                decoder.decode(data)?;
                while let Some(frame) = decoder.take_frame() {
                    encoder.encode(&frame)?;
                    let mut chunk = [0u8; 4096];
                    while encoder.data_ready() > 0 {
                        let filled = encoder.read_data(&mut chunk);
                        output.extend_from_slice(&chunk[..filled]);
                    }
                }
                Ok(output.len() - before)
            }
        }
    }

    /// Removes and returns the pending output.
    #[must_use]
    pub fn take_output(&mut self) -> Vec<u8> {
        match self {
            Self::DirectCopy { output }
            | Self::Ffv1 { output, .. }
            | Self::Full { output, .. } => std::mem::take(output),
        }
    }

    /// A short name for logging.
    #[must_use]
    pub const fn variant(&self) -> &'static str {
        match self {
            Self::DirectCopy { .. } => "direct-copy",
            Self::Ffv1 { .. } => "ffv1",
            Self::Full { .. } => "full",
        }
    }
}

impl std::fmt::Debug for Reencoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reencoder")
            .field("variant", &self.variant())
            .finish()
    }
}

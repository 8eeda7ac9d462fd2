//! Producer source handles.
//!
//! A [`Source`] publishes a named frame feed. Its lifecycle is a sequence
//! of broker-acknowledged transitions: open, encoding negotiated, frame
//! properties locked, encoder built, streaming. Local state never changes
//! until the broker acknowledges the corresponding request, so a rejected
//! negotiation leaves the handle exactly as it was.

use std::sync::Arc;

use svr_core::{Frame, FrameProperties, Lockable, OptionString, options::parse_option_string};
use svr_encodings::{Encoder, Encoding};
use svr_protocol::{Message, verbs};
use tracing::{debug, warn};

use crate::comm::Comm;
use crate::error::SourceError;

/// Initial size of the reused payload buffer for outgoing data frames.
pub const PAYLOAD_BUFFER_SIZE: usize = 4096;

/// Encodings attempted, in order, when a source is opened.
pub const DEFAULT_ENCODING_ATTEMPTS: &[&str] = &["jpeg", "raw"];

struct SourceState {
    encoding: Option<Encoding>,
    options: Option<OptionString>,
    encoder: Option<Box<dyn Encoder>>,
    frame_properties: Option<FrameProperties>,
    payload_buffer: Vec<u8>,
    closed: bool,
}

/// A producer-side handle for one named source.
///
/// The handle is `Sync`: all mutable state sits behind a lock, so callers
/// may share it across threads and every operation serializes per source.
pub struct Source {
    name: String,
    comm: Arc<Comm>,
    state: Lockable<SourceState>,
}

impl Source {
    /// Opens a new client source under `name`.
    ///
    /// After the broker acknowledges, the default encodings are attempted
    /// in order ([`DEFAULT_ENCODING_ATTEMPTS`]); if every attempt is
    /// refused the source is left without an encoding and
    /// [`Source::send_frame`] fails until one is negotiated explicitly.
    pub fn open(comm: &Arc<Comm>, name: &str) -> Result<Self, SourceError> {
        let request = Message::request(verbs::SOURCE_OPEN, ["client", name]);
        let (status, _) = comm.request(&request)?;
        if !status.is_success() {
            return Err(SourceError::Rejected {
                operation: verbs::SOURCE_OPEN,
                status,
            });
        }

        let source = Self {
            name: name.to_string(),
            comm: Arc::clone(comm),
            state: Lockable::new(SourceState {
                encoding: None,
                options: None,
                encoder: None,
                frame_properties: None,
                payload_buffer: vec![0; PAYLOAD_BUFFER_SIZE],
                closed: false,
            }),
        };

        for descriptor in DEFAULT_ENCODING_ATTEMPTS {
            if source.set_encoding(descriptor).is_ok() {
                break;
            }
        }

        Ok(source)
    }

    /// The source name, immutable for the lifetime of the handle.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The currently negotiated encoding, if any.
    #[must_use]
    pub fn encoding(&self) -> Option<Encoding> {
        self.state.lock().encoding
    }

    /// A copy of the currently negotiated encoding options, if any.
    #[must_use]
    pub fn encoding_options(&self) -> Option<OptionString> {
        self.state.lock().options.clone()
    }

    /// The locked frame properties, if any.
    #[must_use]
    pub fn frame_properties(&self) -> Option<FrameProperties> {
        self.state.lock().frame_properties
    }

    /// Negotiates a new encoding from its descriptor.
    ///
    /// The descriptor is parsed and resolved locally before the broker is
    /// asked; on any failure the prior encoding and options are left
    /// untouched. An already built encoder is not replaced: the new
    /// negotiation takes effect when the encoder is next constructed.
    pub fn set_encoding(&self, descriptor: &str) -> Result<(), SourceError> {
        let parsed = match parse_option_string(descriptor) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(
                    descriptor,
                    position = err.position(),
                    "encoding descriptor parse error"
                );
                return Err(err.into());
            }
        };

        let encoding =
            Encoding::lookup(parsed.name()).ok_or_else(|| SourceError::UnknownEncoding {
                name: parsed.name().to_string(),
            })?;

        let request =
            Message::request(verbs::SOURCE_SET_ENCODING, [self.name.as_str(), descriptor]);
        let (status, _) = self.comm.request(&request)?;
        if !status.is_success() {
            return Err(SourceError::Rejected {
                operation: verbs::SOURCE_SET_ENCODING,
                status,
            });
        }

        let mut state = self.state.lock();
        state.encoding = Some(encoding);
        state.options = Some(parsed);
        Ok(())
    }

    /// Locks the source's frame properties explicitly.
    ///
    /// Without an explicit call, properties are derived from the first
    /// frame sent. The stored properties are replaced only when the broker
    /// acknowledges.
    pub fn set_frame_properties(&self, properties: FrameProperties) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        self.negotiate_frame_properties(&mut state, properties)
    }

    fn negotiate_frame_properties(
        &self,
        state: &mut SourceState,
        properties: FrameProperties,
    ) -> Result<(), SourceError> {
        let descriptor = properties.descriptor();
        let request = Message::request(
            verbs::SOURCE_SET_FRAME_PROPERTIES,
            [self.name.as_str(), descriptor.as_str()],
        );
        let (status, _) = self.comm.request(&request)?;
        if !status.is_success() {
            return Err(SourceError::Rejected {
                operation: verbs::SOURCE_SET_FRAME_PROPERTIES,
                status,
            });
        }
        state.frame_properties = Some(properties);
        Ok(())
    }

    /// Encodes and sends one frame.
    ///
    /// The first frame locks the source's properties when none were set
    /// explicitly. Frames whose geometry differs from the locked
    /// properties are refused without emitting any data.
    pub fn send_frame(&self, frame: &Frame) -> Result<(), SourceError> {
        let mut state = self.state.lock();

        let Some(encoding) = state.encoding else {
            return Err(SourceError::NoEncoding {
                name: self.name.clone(),
            });
        };

        let properties = match state.frame_properties {
            Some(properties) => properties,
            None => {
                self.negotiate_frame_properties(&mut state, frame.properties())?;
                frame.properties()
            }
        };

        if state.encoder.is_none() {
            let options = state.options.clone().unwrap_or_default();
            state.encoder = Some(encoding.encoder(&options, properties)?);
        }

        if frame.properties() != properties {
            warn!(
                source = %self.name,
                expected = %properties,
                actual = %frame.properties(),
                "frame geometry changed"
            );
            return Err(SourceError::DimensionMismatch {
                expected: properties,
                actual: frame.properties(),
            });
        }

        let SourceState {
            encoder,
            payload_buffer,
            ..
        } = &mut *state;
        let encoder = encoder.as_mut().expect("encoder built above");

        encoder.encode(frame)?;

        while encoder.data_ready() > 0 {
            let filled = encoder.read_data(payload_buffer);
            // The buffer is borrowed only for the duration of the write,
            // so the next drain iteration may safely overwrite it.
            self.comm.send_data(&self.name, &payload_buffer[..filled])?;
        }

        Ok(())
    }

    /// Closes the source, orphaning any streams attached to it on the
    /// broker side.
    pub fn close(self) -> Result<(), SourceError> {
        self.close_inner()
    }

    fn close_inner(&self) -> Result<(), SourceError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.encoder = None;
        }

        let request = Message::request(verbs::SOURCE_CLOSE, [self.name.as_str()]);
        let (status, _) = self.comm.request(&request)?;
        if status.is_success() {
            Ok(())
        } else {
            Err(SourceError::Rejected {
                operation: verbs::SOURCE_CLOSE,
                status,
            })
        }
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        // Best-effort close for abandoned handles; errors have nowhere to go.
        let _ = self.close_inner();
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("name", &self.name).finish()
    }
}

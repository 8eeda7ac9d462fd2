//! # Overview
//!
//! Binary framing for control and data messages.
//!
//! One frame per message:
//!
//! ```text
//! u32  frame length (bytes following this field, big endian)
//! u16  component count N
//! N x  { u16 length, UTF-8 bytes }
//! rest payload (possibly empty)
//! ```
//!
//! A frame whose trailing region is empty carries no payload. Per-connection
//! ordering is inherited from the underlying stream: frames are written
//! whole under the connection lock, so a data frame can never overtake a
//! control frame submitted earlier on the same connection.
//!
//! # Limits
//!
//! Decoding enforces [`MAX_COMPONENTS`], [`MAX_COMPONENT_LEN`], and
//! [`MAX_FRAME_LEN`]; encoding checks the same bounds so a misbehaving
//! caller is caught before bytes hit the socket. Violations poison the
//! connection - the caller must treat them as fatal for that transport.
//!
//! # Payload borrowing
//!
//! [`write_frame`] takes the payload as a borrowed slice and returns only
//! after the final byte reaches the writer. Producers therefore reuse one
//! payload buffer across successive data frames without a copy; the borrow
//! checker rules out overwriting a buffer a frame still references.

use std::io::{Read, Write};

use thiserror::Error;

use crate::Message;

/// Maximum number of components per frame.
pub const MAX_COMPONENTS: usize = 64;

/// Maximum byte length of a single component.
pub const MAX_COMPONENT_LEN: usize = 4096;

/// Maximum byte length of a frame body (everything after the length field).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame declared more components than [`MAX_COMPONENTS`].
    #[error("frame declares {count} components, limit is {MAX_COMPONENTS}")]
    TooManyComponents {
        /// Declared component count.
        count: usize,
    },

    /// A component exceeded [`MAX_COMPONENT_LEN`].
    #[error("component of {len} bytes exceeds limit of {MAX_COMPONENT_LEN}")]
    ComponentTooLong {
        /// Offending component length.
        len: usize,
    },

    /// A frame exceeded [`MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}")]
    FrameTooLarge {
        /// Declared frame length.
        len: usize,
    },

    /// Component lengths overran the declared frame length.
    #[error("frame component lengths are inconsistent with the frame length")]
    Malformed,

    /// A component was not valid UTF-8.
    #[error("frame component is not valid UTF-8")]
    InvalidUtf8,
}

/// Writes one frame built from borrowed components and payload.
///
/// The payload slice is only read for the duration of the call; an empty
/// slice writes a payload-free frame.
pub fn write_frame<W: Write>(
    writer: &mut W,
    components: &[&str],
    payload: &[u8],
) -> Result<(), WireError> {
    if components.len() > MAX_COMPONENTS {
        return Err(WireError::TooManyComponents {
            count: components.len(),
        });
    }

    let mut body_len = 2usize;
    for component in components {
        if component.len() > MAX_COMPONENT_LEN {
            return Err(WireError::ComponentTooLong {
                len: component.len(),
            });
        }
        body_len += 2 + component.len();
    }
    body_len += payload.len();

    if body_len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge { len: body_len });
    }

    writer.write_all(&(body_len as u32).to_be_bytes())?;
    writer.write_all(&(components.len() as u16).to_be_bytes())?;
    for component in components {
        writer.write_all(&(component.len() as u16).to_be_bytes())?;
        writer.write_all(component.as_bytes())?;
    }
    writer.write_all(payload)?;
    Ok(())
}

/// Writes an owned [`Message`] as one frame.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), WireError> {
    let components: Vec<&str> = message.components().iter().map(String::as_str).collect();
    write_frame(writer, &components, message.payload().unwrap_or(&[]))
}

/// Reads one frame, blocking until it is complete.
///
/// End-of-stream before the first length byte or mid-frame surfaces as
/// [`WireError::Io`] with [`std::io::ErrorKind::UnexpectedEof`].
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, WireError> {
    let mut length = [0u8; 4];
    reader.read_exact(&mut length)?;
    let body_len = u32::from_be_bytes(length) as usize;
    if body_len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge { len: body_len });
    }
    if body_len < 2 {
        return Err(WireError::Malformed);
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body)?;

    let count = u16::from_be_bytes([body[0], body[1]]) as usize;
    if count > MAX_COMPONENTS {
        return Err(WireError::TooManyComponents { count });
    }

    let mut offset = 2usize;
    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        if offset + 2 > body.len() {
            return Err(WireError::Malformed);
        }
        let len = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
        offset += 2;
        if len > MAX_COMPONENT_LEN {
            return Err(WireError::ComponentTooLong { len });
        }
        if offset + len > body.len() {
            return Err(WireError::Malformed);
        }
        let component = std::str::from_utf8(&body[offset..offset + len])
            .map_err(|_| WireError::InvalidUtf8)?;
        components.push(component.to_string());
        offset += len;
    }

    let message = Message::from_components(components);
    if offset < body.len() {
        Ok(message.with_payload(body[offset..].to_vec()))
    } else {
        Ok(message)
    }
}

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_encodings` owns the encoding registry and the streaming codecs that
//! turn frames into bytes and back: `raw` (headerless packed pixels),
//! `jpeg` (per-frame JPEG with length framing), and `ffv1` (an intra/inter
//! container with a deflate entropy stage).
//!
//! # Design
//!
//! [`Encoding`] is the registry: a name-addressable set of encodings, each a
//! factory for [`Encoder`] and [`Decoder`] state machines parameterized by
//! an option mapping and locked frame geometry. Encoders buffer their
//! output internally and are drained through the `data_ready`/`read_data`
//! pair so producers can reuse one bounded payload buffer regardless of how
//! much a frame compressed to. Decoders accept arbitrary chunk boundaries
//! and reassemble whole frames.
//!
//! # Invariants
//!
//! - After `encode(frame)` returns, the sum of successive `read_data` calls
//!   until `data_ready() == 0` equals the bytes the call produced.
//! - Codecs never call back into their owners; they are plain state
//!   machines safe to drive under an external lock.
//! - Every encoder's output framing is self-delimiting for the matching
//!   decoder (raw relies on the fixed frame size, jpeg and ffv1 carry
//!   explicit per-frame lengths).
//!
//! # Examples
//!
//! ```
//! use svr_core::{Frame, FrameProperties, options::parse_option_string};
//! use svr_encodings::Encoding;
//!
//! let props = FrameProperties::new(4, 4, 8, 1).unwrap();
//! let options = parse_option_string("raw").unwrap();
//! let mut encoder = Encoding::Raw.encoder(&options, props).unwrap();
//!
//! encoder.encode(&Frame::filled(props, 7)).unwrap();
//! assert_eq!(encoder.data_ready(), 16);
//! ```

mod codec;
mod encoding;
pub mod ffv1;
pub mod jpeg;
pub mod raw;

pub use codec::{CodecError, Decoder, DrainBuffer, Encoder};
pub use encoding::{Encoding, EncodingError, UnknownEncoding};

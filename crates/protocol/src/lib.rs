#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_protocol` defines the control-plane contract between router clients
//! and the broker: the logical [`Message`] structure, the binary wire
//! framing, and the standardized response shape.
//!
//! # Design
//!
//! A message is a count-prefixed array of UTF-8 string components plus an
//! optional opaque payload. Control requests and responses are small
//! component lists; frame data travels as fire-and-forget `Data` messages
//! whose payload is written directly from the producer's payload buffer
//! without an intermediate copy (see [`wire::write_frame`]).
//!
//! Framing is length-prefixed so a reader can always skip a frame it does
//! not understand; hard limits on component counts and sizes bound the
//! memory a malicious peer can force either side to allocate.
//!
//! # Examples
//!
//! ```
//! use svr_protocol::{Message, verbs, wire};
//! use svr_core::Status;
//!
//! let request = Message::request(verbs::SOURCE_OPEN, ["client", "cam1"]);
//!
//! let mut buf = Vec::new();
//! wire::write_message(&mut buf, &request).unwrap();
//! let decoded = wire::read_message(&mut buf.as_slice()).unwrap();
//! assert_eq!(decoded, request);
//!
//! let reply = Message::response(Status::Success, []);
//! assert_eq!(svr_protocol::parse_response(&reply).unwrap(), Status::Success);
//! ```

mod message;
mod response;
pub mod verbs;
pub mod wire;

pub use message::Message;
pub use response::{ResponseError, parse_response};

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_client` is the producer-side library of the Seawolf Video Router: a
//! blocking [`Comm`] connection to the broker and the [`Source`] handle that
//! publishes named frame feeds through it.
//!
//! # Design
//!
//! Every state-changing operation on a source is a request/response exchange
//! with the broker; local state mutates only after the broker acknowledges.
//! Frame payloads travel as fire-and-forget `Data` messages drained from the
//! source's encoder into a reused payload buffer. A [`Source`] is `Sync`:
//! its mutable state lives behind a [`svr_core::Lockable`], so concurrent
//! callers serialize per source and every `Data` message reaches the wire
//! whole.
//!
//! # Errors
//!
//! All failures surface as [`SourceError`] / [`CommError`]; nothing is
//! retried. [`SourceError::status`] collapses any failure to the wire
//! status taxonomy for callers that only route codes.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use svr_client::{Comm, Source};
//! use svr_core::{Frame, FrameProperties};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let comm = Arc::new(Comm::connect("127.0.0.1:18333")?);
//! let source = Source::open(&comm, "cam1")?;
//!
//! let props = FrameProperties::new(640, 480, 8, 3)?;
//! source.send_frame(&Frame::filled(props, 0))?;
//! source.close()?;
//! # Ok(())
//! # }
//! ```

mod comm;
mod error;
mod server_source;
mod source;

pub use comm::Comm;
pub use error::{CommError, SourceError};
pub use server_source::{close_server_source, open_server_source, sources_list};
pub use source::{DEFAULT_ENCODING_ATTEMPTS, PAYLOAD_BUFFER_SIZE, Source};

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_core` exposes the primitives shared by every crate in the Seawolf
//! Video Router workspace: the numeric status taxonomy carried on the wire,
//! the [`Lockable`] synchronization wrapper embedded in shared entities, the
//! option-string descriptor parser, and the frame geometry/container types.
//!
//! # Design
//!
//! The crate deliberately has no I/O. Everything here is a value type or a
//! synchronization primitive consumed by `svr-protocol`, `svr-encodings`,
//! `svr-client`, and `svr-broker`. Status codes cross the wire as decimal
//! strings; [`Status`] owns both the numbering and its textual form so the
//! client and broker cannot drift apart.
//!
//! # Invariants
//!
//! - [`Status::Success`] is `0`; every other variant is nonzero.
//! - [`FrameProperties`] values are immutable after construction and compare
//!   componentwise.
//! - A [`Frame`] always holds exactly `properties.frame_size()` bytes.
//! - Option-string parse failures always carry the byte offset of the first
//!   offending character.
//!
//! # Examples
//!
//! ```
//! use svr_core::{FrameProperties, Status, options::parse_option_string};
//!
//! let props: FrameProperties = "640,480,8,3".parse().unwrap();
//! assert_eq!(props.frame_size(), 640 * 480 * 3);
//!
//! let parsed = parse_option_string("jpeg;quality=90").unwrap();
//! assert_eq!(parsed.name(), "jpeg");
//! assert_eq!(parsed.get("quality"), Some("90"));
//!
//! assert_eq!(Status::Success.to_string(), "0");
//! ```

pub mod frame;
pub mod lockable;
pub mod options;
pub mod status;

pub use frame::{Frame, FrameError, FrameProperties, ParseFramePropertiesError};
pub use lockable::Lockable;
pub use options::{OptionString, OptionStringError, OptionStringErrorKind, parse_option_string};
pub use status::{ParseStatusError, Status};

//! Command verbs recognized by the broker dispatcher.
//!
//! Shared between the client and broker so the two cannot drift. The first
//! component of every control message is one of these strings.

/// Open a source; arguments are `client|server`, the source name, and for
/// server sources the ingestion descriptor.
pub const SOURCE_OPEN: &str = "Source.open";

/// Close a source by name.
pub const SOURCE_CLOSE: &str = "Source.close";

/// Negotiate a source's encoding; arguments are the name and descriptor.
pub const SOURCE_SET_ENCODING: &str = "Source.setEncoding";

/// Lock a source's frame properties; arguments are the name and the
/// `"W,H,D,C"` descriptor.
pub const SOURCE_SET_FRAME_PROPERTIES: &str = "Source.setFrameProperties";

/// List the sources known to the broker.
pub const SOURCE_GET_SOURCES_LIST: &str = "Source.getSourcesList";

/// Fire-and-forget frame payload for a named source (client to broker) or
/// stream (broker to subscriber).
pub const DATA: &str = "Data";

/// Open a subscriber stream by name.
pub const STREAM_OPEN: &str = "Stream.open";

/// Bind a stream to a source; arguments are the stream and source names.
pub const STREAM_ATTACH: &str = "Stream.attach";

/// Negotiate a stream's delivery encoding; arguments are the name and
/// descriptor.
pub const STREAM_SET_ENCODING: &str = "Stream.setEncoding";

/// Close a subscriber stream by name.
pub const STREAM_CLOSE: &str = "Stream.close";

/// Broker-to-subscriber notification that a stream's source was closed; no
/// further frames will be delivered on it.
pub const STREAM_ORPHANED: &str = "Stream.orphaned";

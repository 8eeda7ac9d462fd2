//! Server-source control and source listing.
//!
//! Server sources are ingested by the broker itself (e.g. a synthetic test
//! pattern); clients only open and close them by name. The sources list
//! reports every source known to the broker, each entry prefixed `c:` for
//! client sources or `s:` for server sources.

use svr_protocol::{Message, verbs};

use crate::comm::Comm;
use crate::error::SourceError;

/// Opens a server-side source described by an option string, e.g.
/// `"test;width=320;height=240"`.
pub fn open_server_source(comm: &Comm, name: &str, descriptor: &str) -> Result<(), SourceError> {
    let request = Message::request(verbs::SOURCE_OPEN, ["server", name, descriptor]);
    let (status, _) = comm.request(&request)?;
    if status.is_success() {
        Ok(())
    } else {
        Err(SourceError::Rejected {
            operation: verbs::SOURCE_OPEN,
            status,
        })
    }
}

/// Closes a server-side source by name.
pub fn close_server_source(comm: &Comm, name: &str) -> Result<(), SourceError> {
    let request = Message::request(verbs::SOURCE_CLOSE, [name]);
    let (status, _) = comm.request(&request)?;
    if status.is_success() {
        Ok(())
    } else {
        Err(SourceError::Rejected {
            operation: verbs::SOURCE_CLOSE,
            status,
        })
    }
}

/// Retrieves the list of sources known to the broker.
///
/// Each entry is `"c:<name>"` or `"s:<name>"` in broker-defined order. The
/// returned strings are owned by the caller.
pub fn sources_list(comm: &Comm) -> Result<Vec<String>, SourceError> {
    let request = Message::request(verbs::SOURCE_GET_SOURCES_LIST, []);
    let (status, reply) = comm.request(&request)?;
    if !status.is_success() {
        return Err(SourceError::Rejected {
            operation: verbs::SOURCE_GET_SOURCES_LIST,
            status,
        });
    }
    Ok(reply.components().iter().skip(1).cloned().collect())
}

//! Synchronous broker connection: request/response control messages and
//! fire-and-forget data frames over one TCP stream.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use svr_core::{Lockable, Status};
use svr_protocol::{Message, parse_response, verbs, wire};

use crate::error::CommError;

struct CommInner {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// A blocking connection to the broker.
///
/// All writes happen under one internal lock, so per connection there is at
/// most one outstanding request and responses match requests in FIFO order.
/// Data frames share the same ordered channel: a data frame submitted after
/// a control request cannot overtake it.
pub struct Comm {
    peer: String,
    inner: Lockable<CommInner>,
}

impl Comm {
    /// Connects to a broker.
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self, CommError> {
        let peer = addr.to_string();
        let stream = TcpStream::connect(&addr).map_err(|source| CommError::Connect {
            addr: peer.clone(),
            source,
        })?;
        // Frames are small and latency-sensitive; coalescing hurts both.
        let _ = stream.set_nodelay(true);
        let reader = BufReader::new(stream.try_clone().map_err(|source| CommError::Connect {
            addr: peer.clone(),
            source,
        })?);
        Ok(Self {
            peer,
            inner: Lockable::new(CommInner {
                reader,
                writer: BufWriter::new(stream),
            }),
        })
    }

    /// The broker address this connection was dialed with.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sends a message; when `expect_response` is set, blocks until the
    /// FIFO-matched reply arrives and returns it.
    pub fn send_message(
        &self,
        message: &Message,
        expect_response: bool,
    ) -> Result<Option<Message>, CommError> {
        let mut inner = self.inner.lock();
        wire::write_message(&mut inner.writer, message)?;
        inner.writer.flush().map_err(wire::WireError::Io)?;
        if expect_response {
            let reply = wire::read_message(&mut inner.reader)?;
            Ok(Some(reply))
        } else {
            Ok(None)
        }
    }

    /// Sends one fire-and-forget `Data` frame for `name`.
    ///
    /// The payload is borrowed for exactly the duration of the call; once
    /// this returns the caller may reuse its buffer.
    pub fn send_data(&self, name: &str, payload: &[u8]) -> Result<(), CommError> {
        let mut inner = self.inner.lock();
        wire::write_frame(&mut inner.writer, &[verbs::DATA, name], payload)?;
        inner.writer.flush().map_err(wire::WireError::Io)?;
        Ok(())
    }

    /// Sends a request and decodes the status of its reply.
    ///
    /// Returns the status together with the full reply so callers needing
    /// listing components can read past the status.
    pub fn request(&self, message: &Message) -> Result<(Status, Message), CommError> {
        let reply = {
            let mut inner = self.inner.lock();
            wire::write_message(&mut inner.writer, message)?;
            inner.writer.flush().map_err(wire::WireError::Io)?;
            wire::read_message(&mut inner.reader)?
        };
        let status = parse_response(&reply)?;
        Ok((status, reply))
    }
}

impl std::fmt::Debug for Comm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comm").field("peer", &self.peer).finish()
    }
}

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `svr_broker` is the routing daemon of the Seawolf Video Router. It
//! accepts client connections, maintains the name registries for sources
//! and subscriber streams, fans incoming frame payloads out through
//! per-stream [`Reencoder`]s, and ingests broker-owned server sources.
//!
//! # Design
//!
//! The broker is thread-per-connection: every accepted socket gets a reader
//! loop that dispatches control messages and answers each with exactly one
//! response. Stream deliveries run on dedicated pump threads draining a
//! cancelable channel per stream, so a slow subscriber never blocks the
//! producer path. Server sources add one generator thread each, bounded by
//! their record's lifetime.
//!
//! # Examples
//!
//! ```no_run
//! use svr_broker::{Broker, BrokerConfig};
//!
//! # fn main() -> std::io::Result<()> {
//! let broker = Broker::bind(&BrokerConfig::new("127.0.0.1:18333"))?;
//! broker.run()
//! # }
//! ```

mod config;
mod connection;
mod ingest;
mod registry;
mod reencoder;

pub use config::{BrokerConfig, DEFAULT_PORT};
pub use ingest::IngestError;
pub use reencoder::{ReencodeError, Reencoder};
pub use registry::{
    Registry, RegistryError, SourceKind, SourceRecord, StreamEvent, StreamRecord,
};

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::{info, warn};

/// A bound broker, ready to accept connections.
pub struct Broker {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Broker {
    /// Binds the listening socket.
    pub fn bind(config: &BrokerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.resolve()?)?;
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
        })
    }

    /// The address actually bound, useful with an ephemeral port.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails, one handler thread
    /// per connection.
    pub fn run(self) -> std::io::Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "broker listening");

        let next_connection = AtomicU64::new(1);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    let connection_id = next_connection.fetch_add(1, Ordering::Relaxed);
                    thread::Builder::new()
                        .name(format!("svr-conn-{connection_id}"))
                        .spawn(move || {
                            connection::handle_connection(registry, stream, connection_id);
                        })?;
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                }
            }
        }
        Ok(())
    }
}

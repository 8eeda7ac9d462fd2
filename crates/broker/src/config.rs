//! Broker configuration.

use std::net::{SocketAddr, ToSocketAddrs};

/// Default broker port.
pub const DEFAULT_PORT: u16 = 18333;

/// Settings for a broker instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BrokerConfig {
    bind: String,
}

impl BrokerConfig {
    /// Configures a broker bound to `bind`, e.g. `"0.0.0.0:18333"`.
    pub fn new(bind: impl Into<String>) -> Self {
        Self { bind: bind.into() }
    }

    /// The configured bind address string.
    #[must_use]
    pub fn bind(&self) -> &str {
        &self.bind
    }

    /// Resolves the bind address.
    pub fn resolve(&self) -> std::io::Result<SocketAddr> {
        self.bind
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::other("bind address resolved to nothing"))
    }
}

impl Default for BrokerConfig {
    /// Binds the loopback interface on [`DEFAULT_PORT`].
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{DEFAULT_PORT}"))
    }
}

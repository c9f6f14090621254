//! Bound-address value type.

use std::fmt;
use std::net::SocketAddr;

/// Resolved address of a listening server.
///
/// Produced once, after the underlying bind completes, and read-only
/// afterwards. The port is the ephemeral port the OS picked unless the
/// backend was configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host the listener is bound to.
    pub host: String,
    /// Bound port. Non-zero once resolved.
    pub port: u16,
}

impl Address {
    /// Create an address from an explicit host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:4500".parse().unwrap();
        let address = Address::from(addr);
        assert_eq!(address.host, "127.0.0.1");
        assert_eq!(address.port, 4500);
    }

    #[test]
    fn display_is_host_port() {
        let address = Address::new("127.0.0.1", 9000);
        assert_eq!(address.to_string(), "127.0.0.1:9000");
    }
}

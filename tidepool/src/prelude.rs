//! Common imports for the tidepool test fixture.
//!
//! This module provides a convenient prelude for importing commonly used
//! types and traits.

pub use crate::address::Address;
pub use crate::error::{ServerError, SocketError};
pub use crate::server::{socket_server, ConnectionHandler, SocketServer, TcpSocketServer};
pub use crate::socket::{Socket, TcpSocket};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use std::time::Duration;

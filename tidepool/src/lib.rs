//! # Tidepool
//!
//! A minimal, embeddable TCP socket server used as a test fixture.
//!
//! Tidepool lets integration tests stand up a throwaway server, feed it
//! canned byte sequences, and assert on data a client sent or received,
//! without depending on a real server implementation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ SocketServer (listening endpoint)            │
//! │   start(handler) / address() / close()       │
//! │        │  one per accepted connection        │
//! │        ▼                                     │
//! │ Socket (live connection)                     │
//! │   receive() / write(bytes) / close()         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `receive()` suspends until a chunk arrives or the connection closes;
//! `write()` never suspends and reports whether the transport accepted the
//! bytes; `address()` suspends until the OS finishes binding, then returns
//! the cached address forever after.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use tidepool::{socket_server, SocketServer};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = socket_server(Duration::ZERO);
//!
//! // Echo every received chunk back to the peer.
//! server.start(Box::new(|socket| {
//!     tokio::spawn(async move {
//!         while let Ok(chunk) = socket.receive().await {
//!             socket.write(&chunk);
//!         }
//!     });
//! }))?;
//!
//! let address = server.address().await?;
//! println!("listening on {address}");
//!
//! server.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod address;
pub mod error;
pub mod prelude;
pub mod server;
pub mod socket;

pub use address::Address;
pub use error::{ServerError, SocketError};
pub use server::{socket_server, ConnectionHandler, SocketServer, TcpSocketServer};
pub use socket::{Socket, TcpSocket};

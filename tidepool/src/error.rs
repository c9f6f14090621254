//! Error types for the tidepool socket fixture.

use thiserror::Error;

/// Errors from server lifecycle operations.
///
/// `Clone` is required because a bind failure is latched once and handed to
/// every caller waiting on `address()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// `address()` or `close()` was called before `start()`.
    #[error("server has not been started")]
    NotStarted,

    /// `start()` was called more than once.
    #[error("server is already started")]
    AlreadyStarted,

    /// Binding the listening endpoint failed. The server is unusable.
    #[error("failed to bind listener: {message}")]
    Bind {
        /// Rendered I/O error from the failed bind.
        message: String,
    },

    /// The server was torn down before the bind completed.
    #[error("server is closed")]
    Closed,
}

/// Errors from per-connection socket operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// The connection was closed and the receive queue is drained.
    #[error("the socket was closed")]
    ConnectionClosed,
}

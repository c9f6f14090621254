//! Listening-endpoint abstraction that hands accepted connections to a
//! caller-supplied handler.
//!
//! Lifecycle is `Idle -> Listening -> Closed`, with no restart:
//!
//! ```text
//! socket_server(delay) ──► start(handler) ──► close()
//!        Idle                 Listening         Closed
//! ```
//!
//! `start` returns before the bind completes; the resolved [`Address`] is
//! latched exactly once by the background accept task and `address()`
//! suspends until that latch fills. Each accepted connection is wrapped in a
//! [`TcpSocket`] and the handler is invoked before the next accept, so
//! handler invocations follow acceptance order.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::address::Address;
use crate::error::ServerError;
use crate::socket::{Socket, TcpSocket};

/// Callback invoked once per accepted connection.
pub type ConnectionHandler = Box<dyn FnMut(Box<dyn Socket>) + Send + 'static>;

/// Latch carrying the once-resolved bind outcome to any number of waiters.
type AddressLatch = watch::Receiver<Option<Result<Address, ServerError>>>;

/// The listening endpoint that produces a [`Socket`] per accepted
/// connection.
#[async_trait]
pub trait SocketServer: Send {
    /// Bind a new listening endpoint and register `on_connection` to run
    /// once per accepted connection.
    ///
    /// Must be called exactly once, from within a tokio runtime, before any
    /// other operation succeeds. Binding happens in the background; a bind
    /// failure leaves the server unusable and surfaces from `address()`.
    fn start(&mut self, on_connection: ConnectionHandler) -> Result<(), ServerError>;

    /// Return the bound address, suspending until the bind completes.
    ///
    /// The address is captured once; concurrent callers all observe the
    /// identical value and later calls return it immediately.
    async fn address(&self) -> Result<Address, ServerError>;

    /// Stop accepting connections and release the listening endpoint.
    ///
    /// Sockets already handed to the handler are not touched; their
    /// lifecycle is independent of the server's.
    fn close(&mut self) -> Result<(), ServerError>;
}

/// Create a server backed by the tokio TCP stack.
///
/// `accept_delay` exists for interface parity with backends that simulate
/// slow connection acceptance. This backend does not enforce it and accepts
/// connections immediately.
pub fn socket_server(accept_delay: Duration) -> TcpSocketServer {
    TcpSocketServer::new(accept_delay)
}

/// [`SocketServer`] backed by a tokio [`TcpListener`] on an ephemeral port.
pub struct TcpSocketServer {
    accept_delay: Duration,
    state: State,
}

enum State {
    Idle,
    Listening {
        address: AddressLatch,
        accept_task: JoinHandle<()>,
    },
    Closed {
        /// Kept so a resolved address stays readable after close.
        address: AddressLatch,
    },
}

impl TcpSocketServer {
    /// Create an idle server. See [`socket_server`] for the meaning of
    /// `accept_delay`.
    pub fn new(accept_delay: Duration) -> Self {
        Self {
            accept_delay,
            state: State::Idle,
        }
    }
}

#[async_trait]
impl SocketServer for TcpSocketServer {
    fn start(&mut self, on_connection: ConnectionHandler) -> Result<(), ServerError> {
        if !matches!(self.state, State::Idle) {
            return Err(ServerError::AlreadyStarted);
        }

        tracing::debug!(
            "starting socket server (accept delay {:?}, not enforced)",
            self.accept_delay
        );

        let (latch_tx, latch_rx) = watch::channel(None);
        let accept_task = tokio::spawn(run_accept_loop(latch_tx, on_connection));

        self.state = State::Listening {
            address: latch_rx,
            accept_task,
        };
        Ok(())
    }

    async fn address(&self) -> Result<Address, ServerError> {
        let mut latch = match &self.state {
            State::Idle => return Err(ServerError::NotStarted),
            State::Listening { address, .. } | State::Closed { address } => address.clone(),
        };

        // The latch holds the last sent value even after the accept task is
        // gone; wait_for only errors if the task died before latching.
        let slot = latch
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| ServerError::Closed)?;

        match &*slot {
            Some(Ok(address)) => Ok(address.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(ServerError::Closed),
        }
    }

    fn close(&mut self) -> Result<(), ServerError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => Err(ServerError::NotStarted),
            State::Listening {
                address,
                accept_task,
            } => {
                accept_task.abort();
                tracing::debug!("socket server closed");
                self.state = State::Closed { address };
                Ok(())
            }
            State::Closed { address } => {
                self.state = State::Closed { address };
                Ok(())
            }
        }
    }
}

impl Drop for TcpSocketServer {
    fn drop(&mut self) {
        if let State::Listening { accept_task, .. } = &self.state {
            accept_task.abort();
        }
    }
}

/// Bind, latch the resolved address, then accept until failure or abort.
async fn run_accept_loop(
    latch: watch::Sender<Option<Result<Address, ServerError>>>,
    mut on_connection: ConnectionHandler,
) {
    let listener = match TcpListener::bind(("127.0.0.1", 0)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!("failed to bind listener: {}", error);
            let _ = latch.send(Some(Err(ServerError::Bind {
                message: error.to_string(),
            })));
            return;
        }
    };

    let address = match listener.local_addr() {
        Ok(addr) => Address::from(addr),
        Err(error) => {
            tracing::error!("failed to resolve bound address: {}", error);
            let _ = latch.send(Some(Err(ServerError::Bind {
                message: error.to_string(),
            })));
            return;
        }
    };

    tracing::debug!("listening on {}", address);
    let _ = latch.send(Some(Ok(address)));

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!("accepted connection from {}", peer);
                on_connection(Box::new(TcpSocket::new(stream)));
            }
            Err(error) => {
                // No caller to surface this to; stop accepting rather than
                // spin on a broken listener.
                tracing::error!("accept failed, stopping accept loop: {}", error);
                break;
            }
        }
    }
}

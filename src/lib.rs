//! A WebSocket (RFC 6455) client and server library over an async
//! byte-stream transport.
//!
//! ```no_run
//! use wsmill::{Connection, Deadline, Listener};
//!
//! # async fn run() -> Result<(), wsmill::WsError> {
//! let mut listener = Listener::bind("127.0.0.1:9001", Some("chat"), 128).await?;
//! let server = listener.accept(Deadline::infinite()).await?;
//! drop(server);
//!
//! let client = Connection::connect_tcp("127.0.0.1:9001", "/", Some("chat"), Deadline::infinite()).await?;
//! drop(client);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Tagged-variant short-string storage for the URL and subprotocol values
/// a handle carries.
pub mod smallstring;

/// Big-endian integer wire helpers.
pub mod wire;

/// First-match intersection of two comma-separated subprotocol lists.
pub mod subproto;

/// The byte-stream transport contract and a concrete TCP implementation.
pub mod transport;

/// CRLF-delimited HTTP line reading, validation, and normalization.
pub mod httpline;

/// RFC 6455 frame header encode/decode and masking.
pub mod frame;

/// The opening handshake, both server- and client-side.
pub mod handshake;

/// The open connection: framing, fragmentation reassembly, and the
/// lifecycle state guard.
pub mod connection;

/// The server-side accept loop.
pub mod listener;

/// Error kinds returned from `wsmill` operations.
pub mod errors;

pub use connection::Connection;
pub use errors::{ProtocolError, WsError};
pub use listener::Listener;
pub use transport::{Deadline, TcpTransport};

impl Connection<TcpTransport> {
    /// Connect over plain TCP and perform the client-side handshake in one
    /// step; a convenience wrapper around [`TcpTransport::connect`] +
    /// [`Connection::connect`].
    pub async fn connect_tcp(
        addr: impl tokio::net::ToSocketAddrs,
        url: &str,
        requested_subprotocols: Option<&str>,
        deadline: Deadline,
    ) -> Result<Self, WsError> {
        let transport = TcpTransport::connect(addr, deadline).await?;
        Connection::connect(transport, url, requested_subprotocols, deadline).await
    }
}

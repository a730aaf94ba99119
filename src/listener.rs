//! The server-side accept loop: binds a transport listener, advertises an
//! optional subprotocol list, and hands out handshaken [`Connection`]s.

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::errors::WsError;
use crate::frame::Role;
use crate::handshake;
use crate::smallstring::{validate_user_string, SmallString};
use crate::transport::{Deadline, TcpListenerTransport, TcpTransport};

/// A bound WebSocket listener over plain TCP.
///
/// Modeled as its own type rather than a `Connection` in a `Listening`
/// stage: a listener simply has no `send`/`recv`/`ping` methods to guard,
/// so there is no `OPNOTSUPP` check to forget.
pub struct Listener {
    transport: TcpListenerTransport,
    subprotocols: SmallString,
}

impl Listener {
    /// Bind a listener. `subprotocols` is the server's advertised,
    /// comma-separated list (validated non-empty/printable-ASCII if
    /// present, before any network I/O).
    pub async fn bind(
        addr: impl tokio::net::ToSocketAddrs,
        subprotocols: Option<&str>,
        backlog: i32,
    ) -> Result<Self, WsError> {
        if let Some(list) = subprotocols {
            validate_user_string(list)?;
        }
        let transport = TcpListenerTransport::bind(addr, backlog).await?;
        Ok(Listener {
            transport,
            subprotocols: SmallString::from_option(subprotocols),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Accept one pending transport connection and run the server-side
    /// handshake against it. On any handshake failure the transport is
    /// closed and the error is returned; the listener itself stays usable
    /// for the next `accept`.
    pub async fn accept(&mut self, deadline: Deadline) -> Result<Connection<TcpTransport>, WsError> {
        let mut transport = self.transport.accept(deadline).await?;
        let preset = self.subprotocols.as_str();

        match handshake::accept_handshake(&mut transport, preset, deadline).await {
            Ok(accepted) => {
                debug!(url = %accepted.url, subprotocol = ?accepted.subprotocol, "server handshake complete");
                Ok(Connection::new(
                    transport,
                    Role::Server,
                    SmallString::new(&accepted.url),
                    SmallString::from_option(accepted.subprotocol.as_deref()),
                ))
            }
            Err(err) => {
                warn!(%err, "server handshake failed");
                let _ = transport.close().await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s1_url_propagation() {
        let mut listener = Listener::bind("127.0.0.1:0", None, 1).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move { listener.accept(Deadline::infinite()).await });
        let client = Connection::connect(
            TcpTransport::connect(addr, Deadline::infinite()).await.unwrap(),
            "/a/b/c",
            None,
            Deadline::infinite(),
        )
        .await
        .unwrap();

        let server = server.await.unwrap().unwrap();
        assert_eq!(server.url(), Some("/a/b/c"));
        assert_eq!(server.subprotocol(), None);
        assert_eq!(client.subprotocol(), None);
    }

    #[tokio::test]
    async fn s3_subprotocol_match_tie_break() {
        let mut listener = Listener::bind("127.0.0.1:0", Some("sp3,sp2"), 1).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move { listener.accept(Deadline::infinite()).await });
        let client = Connection::connect(
            TcpTransport::connect(addr, Deadline::infinite()).await.unwrap(),
            "/",
            Some("sp1,sp2"),
            Deadline::infinite(),
        )
        .await
        .unwrap();

        let server = server.await.unwrap().unwrap();
        assert_eq!(server.subprotocol(), Some("sp2"));
        assert_eq!(client.subprotocol(), Some("sp2"));
    }

    #[tokio::test]
    async fn quirk_preset_without_client_header_is_server_local_only() {
        let mut listener = Listener::bind("127.0.0.1:0", Some("sp1,sp2"), 1).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move { listener.accept(Deadline::infinite()).await });
        let client = Connection::connect(
            TcpTransport::connect(addr, Deadline::infinite()).await.unwrap(),
            "/",
            None,
            Deadline::infinite(),
        )
        .await
        .unwrap();

        let server = server.await.unwrap().unwrap();
        assert_eq!(server.subprotocol(), Some("sp1"));
        assert_eq!(client.subprotocol(), None);
    }

    #[tokio::test]
    async fn rejects_invalid_subprotocol_list_before_any_io() {
        let err = Listener::bind("127.0.0.1:0", Some(""), 1).await;
        assert!(matches!(err, Err(WsError::Inval(_))));
    }
}

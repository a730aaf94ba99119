//! Reads one CRLF-delimited HTTP header/status line, validated and
//! whitespace-normalized.

use crate::errors::{ProtocolError, WsError};
use crate::transport::{Deadline, Transport};

/// Maximum length of a single normalized header/status line this reader
/// will accept; generous for any real HTTP/1.1 Upgrade exchange.
const MAX_LINE: usize = 8 * 1024;

/// Reads up to and including a `\r`, then consumes exactly one `\n`.
/// Fails with [`ProtocolError::MissingLineFeed`] if the following byte is
/// not `\n`, or [`ProtocolError::NonPrintableLine`] if any line byte falls
/// outside 0x20-0x7F. Normalizes by trimming leading/trailing whitespace
/// and collapsing each run of interior whitespace to a single space.
/// Returns the normalized line (possibly empty — an empty line terminates
/// the header block).
pub async fn read_line<T: Transport>(
    transport: &mut T,
    deadline: Deadline,
) -> Result<String, WsError> {
    let mut raw = Vec::new();
    transport
        .recv_until(&mut raw, MAX_LINE, b'\r', deadline)
        .await?;
    // drop the trailing \r
    raw.pop();

    let mut lf = [0u8; 1];
    transport.recv(&mut lf, deadline).await?;
    if lf[0] != b'\n' {
        return Err(ProtocolError::MissingLineFeed.into());
    }

    if !raw.iter().all(|&b| (0x20..=0x7F).contains(&b)) {
        return Err(ProtocolError::NonPrintableLine.into());
    }

    Ok(normalize_whitespace(&raw))
}

fn normalize_whitespace(raw: &[u8]) -> String {
    let s = std::str::from_utf8(raw).expect("validated as 0x20-0x7F above");
    let mut out = String::with_capacity(s.len());
    let mut tokens = s.split_ascii_whitespace();
    if let Some(first) = tokens.next() {
        out.push_str(first);
        for tok in tokens {
            out.push(' ');
            out.push_str(tok);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TcpListenerTransport, TcpTransport};

    async fn pipe() -> (TcpTransport, TcpTransport) {
        let mut listener = TcpListenerTransport::bind("127.0.0.1:0", 1).await.unwrap();
        let addr_listener = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept(Deadline::infinite()).await });
        let client = TcpTransport::connect(addr_listener, Deadline::infinite())
            .await
            .unwrap();
        let server = accept.await.unwrap().unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn collapses_interior_whitespace_and_trims() {
        let (mut client, mut server) = pipe().await;
        client
            .send(b"  GET   /a   HTTP/1.1  \r\n", Deadline::infinite())
            .await
            .unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let line = read_line(&mut server, Deadline::infinite()).await.unwrap();
        assert_eq!(line, "GET /a HTTP/1.1");
    }

    #[tokio::test]
    async fn empty_line_terminates_headers() {
        let (mut client, mut server) = pipe().await;
        client.send(b"\r\n", Deadline::infinite()).await.unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let line = read_line(&mut server, Deadline::infinite()).await.unwrap();
        assert_eq!(line, "");
    }

    #[tokio::test]
    async fn rejects_non_printable_bytes() {
        let (mut client, mut server) = pipe().await;
        client
            .send(b"bad\x01line\r\n", Deadline::infinite())
            .await
            .unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let err = read_line(&mut server, Deadline::infinite()).await;
        assert!(matches!(
            err,
            Err(WsError::Protocol(ProtocolError::NonPrintableLine))
        ));
    }

    #[tokio::test]
    async fn rejects_missing_lf() {
        let (mut client, mut server) = pipe().await;
        client.send(b"oops\rX", Deadline::infinite()).await.unwrap();
        client.flush(Deadline::infinite()).await.unwrap();
        let err = read_line(&mut server, Deadline::infinite()).await;
        assert!(matches!(
            err,
            Err(WsError::Protocol(ProtocolError::MissingLineFeed))
        ));
    }
}

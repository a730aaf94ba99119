use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use wsmill::{Deadline, Listener};

/// A minimal echo server: accepts connections on 127.0.0.1:9000 and echoes
/// every message back until the peer closes.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::fmt()
        .with_max_level(Level::DEBUG)
        .finish()
        .try_init()
        .expect("failed to init log");

    let mut listener = Listener::bind("127.0.0.1:9000", None, 128)
        .await
        .expect("failed to bind");
    tracing::info!("listening on 127.0.0.1:9000");

    loop {
        let conn = match listener.accept(Deadline::infinite()).await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(%err, "accept/handshake failed");
                continue;
            }
        };
        tokio::spawn(async move {
            let mut conn = conn;
            let mut buf = vec![0u8; 4096];
            loop {
                match conn.recv(&mut buf, Deadline::infinite()).await {
                    Ok(n) => {
                        // `n` is the full message length, which may exceed
                        // `buf.len()` if the peer sent more than this demo's
                        // fixed buffer holds; echo back only what we kept.
                        let kept = n.min(buf.len());
                        if kept < n {
                            tracing::debug!(n, kept, "message truncated to buffer size");
                        }
                        if conn.send(&buf[..kept], Deadline::infinite()).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%err, "connection ended");
                        break;
                    }
                }
            }
            let _ = conn.close().await;
        });
    }
}

use std::io::Write;

use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use wsmill::{Connection, Deadline};

/// A minimal interactive client for [`echo_server`]: reads a line from
/// stdin, sends it, and prints what comes back.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::fmt()
        .with_max_level(Level::DEBUG)
        .finish()
        .try_init()
        .expect("failed to init log");

    let mut conn = Connection::connect_tcp("127.0.0.1:9000", "/", None, Deadline::infinite())
        .await
        .expect("handshake failed");

    let mut line = String::new();
    let mut buf = vec![0u8; 4096];
    loop {
        print!("[send] > ");
        std::io::stdout().flush().unwrap();
        line.clear();
        if std::io::stdin().read_line(&mut line).unwrap() == 0 || line.trim() == "quit" {
            break;
        }
        conn.send(line.trim_end().as_bytes(), Deadline::infinite())
            .await
            .expect("send failed");
        match conn.recv(&mut buf, Deadline::infinite()).await {
            Ok(n) => println!("[recv] > {}", String::from_utf8_lossy(&buf[..n])),
            Err(err) => {
                println!("connection ended: {err}");
                break;
            }
        }
    }

    conn.done(Deadline::infinite()).await.ok();
    let _ = conn.close().await;
}

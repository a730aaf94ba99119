//! Invariant 1: round-trip for boundary payload sizes, over a real
//! handshaken loopback connection. Scenario S4's raw three-frame
//! fragmentation byte sequence (from
//! `examples/original_source/tests/fragments.c`) is exercised as a unit
//! test in `src/connection.rs`, since reassembly needs frames injected
//! below the handshake layer that a `Connection` does not expose once
//! built.

use wsmill::{Connection, Deadline, Listener};

#[tokio::test]
async fn boundary_payload_sizes_round_trip() {
    for len in [0usize, 1, 125, 126, 65535, 65536] {
        let mut listener = Listener::bind("127.0.0.1:0", None, 10).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_task = tokio::spawn(async move { listener.accept(Deadline::infinite()).await.unwrap() });

        let mut client = Connection::connect_tcp(addr, "/", None, Deadline::infinite())
            .await
            .unwrap();
        let mut server = server_task.await.unwrap();

        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        client.send(&payload, Deadline::infinite()).await.unwrap();

        let mut buf = vec![0u8; len.max(1)];
        let n = server.recv(&mut buf, Deadline::infinite()).await.unwrap();
        assert_eq!(n, len, "length mismatch for payload size {len}");
        assert_eq!(&buf[..n], payload.as_slice(), "payload mismatch for size {len}");

        client.close().await.unwrap();
        server.close().await.unwrap();
    }
}

//! Bidirectional exchange followed by a client-initiated close.

use wsmill::{Connection, Deadline, Listener};

#[tokio::test]
async fn bidirectional_exchange_then_close() {
    let mut listener = Listener::bind("127.0.0.1:0", None, 10).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let mut server = listener.accept(Deadline::infinite()).await.unwrap();
        server.send(b"ABC", Deadline::infinite()).await.unwrap();

        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf, Deadline::infinite()).await.unwrap();
        assert_eq!(&buf[..n], b"DEF");

        let err = server.recv(&mut buf, Deadline::infinite()).await;
        assert!(matches!(err, Err(wsmill::WsError::ConnReset)));

        let err = server.send(b"x", Deadline::infinite()).await;
        assert!(matches!(err, Err(wsmill::WsError::ConnAborted)));
        server
    });

    let mut client = Connection::connect_tcp(addr, "/", None, Deadline::infinite())
        .await
        .unwrap();

    let mut buf = [0u8; 16];
    let n = client.recv(&mut buf, Deadline::infinite()).await.unwrap();
    assert_eq!(&buf[..n], b"ABC");

    client.send(b"DEF", Deadline::infinite()).await.unwrap();
    client.done(Deadline::infinite()).await.unwrap();

    let server = server_task.await.unwrap();
    server.close().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn idempotent_close_releases_resources_without_touching_the_wire() {
    let mut listener = Listener::bind("127.0.0.1:0", None, 10).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move { listener.accept(Deadline::infinite()).await.unwrap() });
    let client = Connection::connect_tcp(addr, "/", None, Deadline::infinite())
        .await
        .unwrap();
    let server = server_task.await.unwrap();

    // Closing a handle that never went through an error path still just
    // releases the transport; calling it is always safe exactly once per
    // handle (the type's ownership already prevents calling it twice).
    client.close().await.unwrap();
    server.close().await.unwrap();
}

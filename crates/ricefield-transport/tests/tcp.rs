//! Integration tests for the newline-framed TCP transport.
//!
//! These tests spin up a real listener on an OS-assigned port and talk to it
//! either through a second `TcpLineConnection` or through a raw `TcpStream`,
//! so the exact bytes on the wire are under the test's control.

use ricefield_transport::{
    Connection, TcpLineConnection, TcpLineTransport, Transport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Binds a transport on a random port and returns it with its address.
async fn bind(max_line_length: usize) -> (TcpLineTransport, String) {
    let transport = TcpLineTransport::bind("127.0.0.1:0", max_line_length)
        .await
        .expect("should bind");
    let addr = transport
        .local_addr()
        .expect("should have local addr")
        .to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind(1024).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let client = TcpLineConnection::connect(&addr)
        .await
        .expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");

    assert!(server_conn.id().into_inner() > 0);
    assert_ne!(server_conn.id(), client.id());

    // --- Server sends, client receives ---
    server_conn
        .send("LOGIN_SUCCESS:alice")
        .await
        .expect("send should succeed");
    let line = client.recv().await.expect("recv ok").expect("line");
    assert_eq!(line, "LOGIN_SUCCESS:alice");

    // --- Client sends, server receives ---
    client.send("GET_ONLINE_USERS").await.expect("send ok");
    let line = server_conn.recv().await.expect("recv ok").expect("line");
    assert_eq!(line, "GET_ONLINE_USERS");
}

#[tokio::test]
async fn test_tcp_recv_strips_carriage_return_and_splits_lines() {
    let (mut transport, addr) = bind(1024).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    // Two lines in one write, the first with a CRLF terminator.
    raw.write_all(b"INVITE:bob\r\nGAME_ACTION:12\n")
        .await
        .expect("write");

    let first = server_conn.recv().await.expect("recv").expect("line");
    let second = server_conn.recv().await.expect("recv").expect("line");
    assert_eq!(first, "INVITE:bob");
    assert_eq!(second, "GAME_ACTION:12");
}

#[tokio::test]
async fn test_tcp_recv_clean_close_returns_none() {
    let (mut transport, addr) = bind(1024).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let raw = TcpStream::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    drop(raw);

    let result = server_conn.recv().await.expect("clean close is not an error");
    assert!(result.is_none(), "closed peer should yield None");
}

#[tokio::test]
async fn test_tcp_recv_over_long_line_is_skipped() {
    // A 16-byte limit: the first line is dropped, the connection survives
    // and the following line is delivered intact.
    let (mut transport, addr) = bind(16).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    let long = "X".repeat(64);
    raw.write_all(format!("{long}\nQUIT_GAME\n").as_bytes())
        .await
        .expect("write");

    let line = server_conn.recv().await.expect("recv").expect("line");
    assert_eq!(line, "QUIT_GAME");
}

#[tokio::test]
async fn test_tcp_send_appends_newline() {
    let (mut transport, addr) = bind(1024).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    server_conn.send("ONLINE_USERS:").await.expect("send");
    server_conn.close().await.expect("close");

    let mut received = String::new();
    raw.read_to_string(&mut received).await.expect("read");
    assert_eq!(received, "ONLINE_USERS:\n");
}

#[tokio::test]
async fn test_tcp_recv_invalid_utf8_line_is_skipped() {
    let (mut transport, addr) = bind(1024).await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server_conn = server_handle.await.expect("task should complete");

    raw.write_all(b"GAME_ACTION:\xff\xfe\nLOGIN:amy,pw\r\n")
        .await
        .expect("write");

    let line = server_conn.recv().await.expect("recv").expect("line");
    assert_eq!(line, "LOGIN:amy,pw");
}

//! End-to-end DSI sessions over loopback TCP.

use std::net::SocketAddr;

use dsi_protocol::core::DsiConfig;
use dsi_protocol::server::{DsiServer, Reply, RequestHandler};
use dsi_protocol::transport::{Command, DsiHeader, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Echo;

impl RequestHandler for Echo {
    fn status(&self) -> Vec<u8> {
        b"status".to_vec()
    }

    async fn handle(&self, request: &Frame) -> Reply {
        Reply::ok(request.payload.clone())
    }
}

async fn start_server(max_sessions: usize) -> SocketAddr {
    let config = DsiConfig::builder()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .read_buffer_units(2)
        .max_sessions(max_sessions)
        .build();
    let server = DsiServer::bind(config, Echo).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

async fn send(stream: &mut TcpStream, command: Command, request_id: u16, payload: &[u8]) {
    let frame = Frame::new(DsiHeader::request(command, request_id), payload.to_vec());
    stream.write_all(&frame.encode()).await.unwrap();
}

async fn read_exact_hex(stream: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    hex::encode(buf)
}

async fn remaining(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    rest
}

#[tokio::test]
async fn test_open_command_close() {
    let addr = start_server(4).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, Command::OpenSession, 1, &hex::decode("010400000400").unwrap()).await;
    assert_eq!(
        read_exact_hex(&mut stream, 28).await,
        "01040001000000000000000c00000000000400100000020400000080"
    );

    send(&mut stream, Command::Command, 2, &[0x09, 0x0a]).await;
    assert_eq!(
        read_exact_hex(&mut stream, 18).await,
        "01020002000000000000000200000000090a"
    );

    send(&mut stream, Command::Tickle, 3, &[]).await;
    send(&mut stream, Command::Close, 4, &[]).await;
    assert_eq!(
        hex::encode(remaining(&mut stream).await),
        "00010000000000000000000000000000"
    );
}

#[tokio::test]
async fn test_get_status_then_disconnect() {
    let addr = start_server(4).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, Command::GetStatus, 5, &[]).await;

    let reply = remaining(&mut stream).await;
    assert_eq!(
        hex::encode(&reply[..16]),
        "01030005000000000000000600000000"
    );
    assert_eq!(&reply[16..], b"status");
}

#[tokio::test]
async fn test_malformed_options_drop_connection() {
    let addr = start_server(4).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, Command::OpenSession, 1, &hex::decode("010a00000400").unwrap()).await;

    assert!(remaining(&mut stream).await.is_empty());
}

#[tokio::test]
async fn test_session_limit() {
    let addr = start_server(1).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    send(&mut first, Command::OpenSession, 1, &[]).await;
    read_exact_hex(&mut first, 28).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    send(&mut second, Command::OpenSession, 1, &[]).await;
    assert_eq!(
        hex::encode(remaining(&mut second).await),
        "01040001fffffbce0000000000000000"
    );
}

//! TCP transport over tokio.
//!
//! A connection is split once: the read half feeds a [`FrameReader`], the
//! write half becomes the session's [`Transport`].

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::reader::FrameReader;
use crate::core::{SendMode, Transport};

/// Outbound half of a DSI TCP connection.
#[derive(Debug)]
pub struct TcpTransport {
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Split a connected stream into a frame reader and a transport.
    pub fn split(stream: TcpStream) -> io::Result<(FrameReader<OwnedReadHalf>, Self)> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok((FrameReader::new(reader), Self { writer, peer }))
    }

    /// Remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8], mode: SendMode) -> io::Result<usize> {
        match mode {
            SendMode::Wait => {
                self.writer.write_all(data).await?;
            }
            SendMode::NoWait => {
                // WouldBlock here means nothing was written; pass it up.
                let written = self.writer.try_write(data)?;
                if written < data.len() {
                    self.writer.write_all(&data[written..]).await?;
                }
            }
        }
        Ok(data.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::buffer::ReceiveBuffer;
    use crate::transport::frame::{DsiHeader, Frame};
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_send_both_modes() {
        let (client, server) = connected_pair().await;
        let (_, mut transport) = TcpTransport::split(server).unwrap();
        let (mut reader, _client_tx) = TcpTransport::split(client).unwrap();

        let tickle = Frame::empty(DsiHeader::tickle(9)).encode();
        assert_eq!(transport.send(&tickle, SendMode::NoWait).await.unwrap(), 16);
        assert_eq!(transport.send(&tickle, SendMode::Wait).await.unwrap(), 16);

        let mut buffer = ReceiveBuffer::with_capacity(64).unwrap();
        for _ in 0..2 {
            let frame = reader.read_frame(&mut buffer).await.unwrap().unwrap();
            assert_eq!(frame.header, DsiHeader::tickle(9));
        }
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (client, server) = connected_pair().await;
        let (_, mut transport) = TcpTransport::split(server).unwrap();
        let (mut reader, _client_tx) = TcpTransport::split(client).unwrap();

        transport.close().await.unwrap();

        let mut buffer = ReceiveBuffer::with_capacity(64).unwrap();
        assert!(reader.read_frame(&mut buffer).await.unwrap().is_none());
    }
}

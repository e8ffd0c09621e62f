//! Inbound frame reading.
//!
//! Before a session exists the server reads one bootstrap frame
//! (OpenSession or GetStatus) with exact-size reads, so no bytes belonging
//! to later frames are pulled off the stream. Afterwards [`FrameReader`]
//! reads ahead into the session's [`ReceiveBuffer`].

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::buffer::ReceiveBuffer;
use super::frame::{DsiHeader, Frame};
use crate::core::constants::{DSI_BLOCKSIZ, DSI_CMDSIZ};
use crate::core::{DsiResult, FrameError, ResourceError};

/// Read into `buf` until it is full or the stream ends; returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended mid-frame")
}

/// Read the first frame of a connection.
///
/// Returns `Ok(None)` if the peer closed before sending anything. The
/// command block is limited to [`DSI_CMDSIZ`] bytes.
pub async fn read_bootstrap_frame<R: AsyncRead + Unpin>(reader: &mut R) -> DsiResult<Option<Frame>> {
    let mut header_bytes = [0u8; DSI_BLOCKSIZ];
    match read_full(reader, &mut header_bytes).await? {
        0 => return Ok(None),
        DSI_BLOCKSIZ => {}
        _ => return Err(unexpected_eof().into()),
    }

    let header = DsiHeader::from_bytes(&header_bytes)?;
    if header.payload_len() > DSI_CMDSIZ {
        return Err(FrameError::PayloadTooLarge {
            declared: header.payload_len(),
            capacity: DSI_CMDSIZ,
        }
        .into());
    }

    let mut payload = vec![0u8; header.payload_len()];
    if read_full(reader, &mut payload).await? != payload.len() {
        return Err(unexpected_eof().into());
    }

    Ok(Some(Frame { header, payload }))
}

/// Reads whole frames through a session receive buffer.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap the inbound half of a stream.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames. A frame
    /// whose declared payload cannot fit in `buffer` is malformed input.
    pub async fn read_frame(&mut self, buffer: &mut ReceiveBuffer) -> DsiResult<Option<Frame>> {
        loop {
            if buffer.len() >= DSI_BLOCKSIZ {
                let header = DsiHeader::from_bytes(buffer.readable())?;
                let room = buffer.capacity() - DSI_BLOCKSIZ;
                if header.payload_len() > room {
                    return Err(FrameError::PayloadTooLarge {
                        declared: header.payload_len(),
                        capacity: room,
                    }
                    .into());
                }

                if buffer.len() >= DSI_BLOCKSIZ + header.payload_len() {
                    let (frame, used) = Frame::decode(buffer.readable())?;
                    buffer.consume(used);
                    return Ok(Some(frame));
                }
            }

            if buffer.writable_mut().is_empty() {
                buffer.compact();
            }
            if buffer.writable_mut().is_empty() {
                return Err(ResourceError::TooSmall {
                    capacity: buffer.capacity(),
                    minimum: DSI_BLOCKSIZ,
                }
                .into());
            }

            let n = self.reader.read(buffer.writable_mut()).await?;
            if n == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof().into());
            }
            buffer.commit(n);
        }
    }

    /// Mutable access to the wrapped reader, for exact reads outside the buffer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Get the wrapped reader back.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

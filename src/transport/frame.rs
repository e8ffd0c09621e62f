//! DSI frame encoding and decoding.
//!
//! Every DSI message starts with the same 16-byte header; all multi-byte
//! fields are big-endian.
//!
//! ```text
//! +-------+---------+------------+----------------+----------------+----------------+
//! | Flags | Command | Request ID | Code / Offset  | Length         | Reserved       |
//! | 1     | 1       | 2 (BE16)   | 4 (BE32)       | 4 (BE32)       | 4 (BE32)       |
//! +-------+---------+------------+----------------+----------------+----------------+
//! ```

use crate::core::FrameError;
use crate::core::constants::{
    DSI_BLOCKSIZ, DSIFL_REPLY, DSIFL_REQUEST, DSIFUNC_ATTN, DSIFUNC_CLOSE, DSIFUNC_CMD,
    DSIFUNC_OPEN, DSIFUNC_STAT, DSIFUNC_TICKLE, DSIFUNC_WRITE,
};

/// Whether a frame is a request or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Request (flags = 0).
    Request = DSIFL_REQUEST,
    /// Reply (flags = 1).
    Reply = DSIFL_REPLY,
}

impl FrameKind {
    /// Parse a flags byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            DSIFL_REQUEST => Some(Self::Request),
            DSIFL_REPLY => Some(Self::Reply),
            _ => None,
        }
    }

    /// Raw flags byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// DSI command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Close the session.
    Close = DSIFUNC_CLOSE,
    /// AFP command.
    Command = DSIFUNC_CMD,
    /// Server status.
    GetStatus = DSIFUNC_STAT,
    /// Open the session.
    OpenSession = DSIFUNC_OPEN,
    /// Liveness check.
    Tickle = DSIFUNC_TICKLE,
    /// AFP write.
    Write = DSIFUNC_WRITE,
    /// Server attention.
    Attention = DSIFUNC_ATTN,
}

impl Command {
    /// Parse a command byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            DSIFUNC_CLOSE => Some(Self::Close),
            DSIFUNC_CMD => Some(Self::Command),
            DSIFUNC_STAT => Some(Self::GetStatus),
            DSIFUNC_OPEN => Some(Self::OpenSession),
            DSIFUNC_TICKLE => Some(Self::Tickle),
            DSIFUNC_WRITE => Some(Self::Write),
            DSIFUNC_ATTN => Some(Self::Attention),
            _ => None,
        }
    }

    /// Raw command byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed DSI header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsiHeader {
    /// Request or reply.
    pub kind: FrameKind,
    /// Command code.
    pub command: Command,
    /// Correlates requests with replies.
    pub request_id: u16,
    /// Error code on replies, data offset on writes.
    pub code: u32,
    /// Payload bytes following the header.
    pub length: u32,
    /// Reserved, zero.
    pub reserved: u32,
}

impl DsiHeader {
    /// Create a zero-length request header.
    pub fn request(command: Command, request_id: u16) -> Self {
        Self {
            kind: FrameKind::Request,
            command,
            request_id,
            code: 0,
            length: 0,
            reserved: 0,
        }
    }

    /// Create a reply header answering `request`, with the given error code.
    pub fn reply_to(request: &DsiHeader, code: u32) -> Self {
        Self {
            kind: FrameKind::Reply,
            command: request.command,
            request_id: request.request_id,
            code,
            length: 0,
            reserved: 0,
        }
    }

    /// Tickle header carrying a server-assigned ID.
    pub fn tickle(request_id: u16) -> Self {
        Self::request(Command::Tickle, request_id)
    }

    /// Close header carrying a server-assigned ID.
    pub fn close(request_id: u16) -> Self {
        Self::request(Command::Close, request_id)
    }

    /// Payload length as a buffer size.
    pub fn payload_len(&self) -> usize {
        self.length as usize
    }

    /// Serialize header to bytes (16 bytes).
    pub fn to_bytes(&self) -> [u8; DSI_BLOCKSIZ] {
        let mut buf = [0u8; DSI_BLOCKSIZ];
        buf[0] = self.kind.as_byte();
        buf[1] = self.command.as_byte();
        buf[2..4].copy_from_slice(&self.request_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.code.to_be_bytes());
        buf[8..12].copy_from_slice(&self.length.to_be_bytes());
        buf[12..16].copy_from_slice(&self.reserved.to_be_bytes());
        buf
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < DSI_BLOCKSIZ {
            return Err(FrameError::TooShort {
                expected: DSI_BLOCKSIZ,
                actual: bytes.len(),
            });
        }

        let kind = FrameKind::from_byte(bytes[0]).ok_or(FrameError::InvalidFlags(bytes[0]))?;
        let command = Command::from_byte(bytes[1]).ok_or(FrameError::UnknownCommand(bytes[1]))?;

        Ok(Self {
            kind,
            command,
            request_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            code: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            length: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            reserved: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// Encode a payload size as the header's 32-bit length field.
pub fn length_field(len: usize) -> Result<u32, FrameError> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        declared: len,
        capacity: u32::MAX as usize,
    })
}

/// A header together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The header; `length` always matches `payload`.
    pub header: DsiHeader,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame, fixing up the header length.
    ///
    /// # Panics
    ///
    /// If the payload does not fit in the 32-bit length field. Use
    /// [`Frame::try_new`] for payloads of unchecked size.
    pub fn new(header: DsiHeader, payload: Vec<u8>) -> Self {
        match Self::try_new(header, payload) {
            Ok(frame) => frame,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a frame, failing if the payload overflows the length field.
    pub fn try_new(mut header: DsiHeader, payload: Vec<u8>) -> Result<Self, FrameError> {
        header.length = length_field(payload.len())?;
        Ok(Self { header, payload })
    }

    /// Create a frame with no payload.
    pub fn empty(header: DsiHeader) -> Self {
        Self::new(header, Vec::new())
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        DSI_BLOCKSIZ + self.payload.len()
    }

    /// Encode header and payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode one complete frame from the front of `data`.
    ///
    /// Returns the frame and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), FrameError> {
        let header = DsiHeader::from_bytes(data)?;
        let end = DSI_BLOCKSIZ + header.payload_len();
        if data.len() < end {
            return Err(FrameError::TooShort {
                expected: end,
                actual: data.len(),
            });
        }

        let payload = data[DSI_BLOCKSIZ..end].to_vec();
        Ok((Self { header, payload }, end))
    }
}

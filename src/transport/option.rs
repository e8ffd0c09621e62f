//! OpenSession option block codec.
//!
//! An option block is a sequence of TLV triples:
//!
//! ```text
//! +0   Tag (1 byte)
//! +1   Length (1 byte)
//! +2   Value (Length bytes, integers BE)
//! ```
//!
//! Unknown tags are carried through untouched; only the attention quantum
//! has its size checked here because it is the only option the server reads.

use crate::core::FrameError;
use crate::core::constants::{
    DSIOPT_ATTNQUANT, DSIOPT_REPLCSIZE, DSIOPT_SERVQUANT, OPTION_HEADER_SIZE, OPTION_VALUE_SIZE,
};

/// Option tags the server knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionTag {
    /// Server request quantum.
    ServerQuantum,
    /// Attention quantum.
    AttentionQuantum,
    /// Replay cache size.
    ReplayCacheSize,
    /// Anything else.
    Unknown(u8),
}

impl OptionTag {
    /// Parse a tag byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            DSIOPT_SERVQUANT => Self::ServerQuantum,
            DSIOPT_ATTNQUANT => Self::AttentionQuantum,
            DSIOPT_REPLCSIZE => Self::ReplayCacheSize,
            other => Self::Unknown(other),
        }
    }

    /// Raw tag byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::ServerQuantum => DSIOPT_SERVQUANT,
            Self::AttentionQuantum => DSIOPT_ATTNQUANT,
            Self::ReplayCacheSize => DSIOPT_REPLCSIZE,
            Self::Unknown(other) => other,
        }
    }
}

/// One negotiated connection parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsiOption {
    /// Option tag.
    pub tag: OptionTag,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl DsiOption {
    /// Create a 4-byte big-endian option.
    pub fn from_u32(tag: OptionTag, value: u32) -> Self {
        Self {
            tag,
            value: value.to_be_bytes().to_vec(),
        }
    }

    /// Value as a big-endian u32, if it is exactly 4 bytes.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; OPTION_VALUE_SIZE] = self.value.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        OPTION_HEADER_SIZE + self.value.len()
    }

    /// Append the encoded option to `buf`.
    ///
    /// Values longer than 255 bytes cannot be represented; callers only
    /// encode fixed-width options.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        debug_assert!(self.value.len() <= u8::MAX as usize);
        buf.push(self.tag.as_byte());
        buf.push(self.value.len() as u8);
        buf.extend_from_slice(&self.value);
    }
}

/// Decode an option block.
///
/// A trailing single byte (no room for a length) is ignored. Fails if any
/// option claims more bytes than remain, or if an attention quantum is not
/// exactly 4 bytes. On failure nothing is returned, so callers never see a
/// partially decoded block.
pub fn decode_options(block: &[u8]) -> Result<Vec<DsiOption>, FrameError> {
    let mut options = Vec::new();
    let mut i = 0;

    while i + 1 < block.len() {
        let tag_byte = block[i];
        let declared = block[i + 1] as usize;
        i += OPTION_HEADER_SIZE;

        let remaining = block.len() - i;
        if declared > remaining {
            return Err(FrameError::OptionOverrun {
                tag: tag_byte,
                declared,
                remaining,
            });
        }

        let tag = OptionTag::from_byte(tag_byte);
        if tag == OptionTag::AttentionQuantum && declared != OPTION_VALUE_SIZE {
            return Err(FrameError::OptionLength {
                tag: tag_byte,
                expected: OPTION_VALUE_SIZE,
                actual: declared,
            });
        }

        options.push(DsiOption {
            tag,
            value: block[i..i + declared].to_vec(),
        });
        i += declared;
    }

    Ok(options)
}

/// Encode options into one block.
pub fn encode_options(options: &[DsiOption]) -> Vec<u8> {
    let size = options.iter().map(DsiOption::wire_size).sum();
    let mut buf = Vec::with_capacity(size);
    for option in options {
        option.encode_into(&mut buf);
    }
    buf
}

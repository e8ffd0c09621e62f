//! Error types for the DSI session layer.

use std::io;

use thiserror::Error;

use super::constants::{CNID_DBD_RES_ERR_DB, CNID_DBD_RES_NOTFOUND};

/// Malformed peer input: the peer violated the frame or option encoding.
///
/// Always fatal to the connection that produced it, never to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes for a header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Flags byte is neither request nor reply.
    #[error("invalid flags: 0x{0:02x}")]
    InvalidFlags(u8),

    /// Unknown command code.
    #[error("unknown command: 0x{0:02x}")]
    UnknownCommand(u8),

    /// An option's declared length runs past the end of the block.
    #[error("option 0x{tag:02x} too large: {declared} bytes declared, {remaining} remaining")]
    OptionOverrun {
        /// Option tag.
        tag: u8,
        /// Declared value length.
        declared: usize,
        /// Bytes left in the block.
        remaining: usize,
    },

    /// A recognized option carries a value of the wrong size.
    #[error("option 0x{tag:02x} bad length: expected {expected}, got {actual}")]
    OptionLength {
        /// Option tag.
        tag: u8,
        /// Fixed size for this tag.
        expected: usize,
        /// Declared size.
        actual: usize,
    },

    /// Declared payload does not fit the space available for it.
    #[error("payload too large: {declared} bytes declared, room for {capacity}")]
    PayloadTooLarge {
        /// Declared payload length.
        declared: usize,
        /// Bytes available.
        capacity: usize,
    },
}

/// Receive buffer could not be provisioned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// `units × quantum` does not fit in memory addressing.
    #[error("buffer size overflow: {units} units of {quantum} bytes")]
    CapacityOverflow {
        /// Read units.
        units: usize,
        /// Quantum in bytes.
        quantum: u32,
    },

    /// Allocation failed.
    #[error("out of memory allocating {0} byte receive buffer")]
    OutOfMemory(usize),

    /// Buffer cannot hold even a frame header.
    #[error("receive buffer of {capacity} bytes is smaller than {minimum}")]
    TooSmall {
        /// Provisioned capacity.
        capacity: usize,
        /// Smallest usable capacity.
        minimum: usize,
    },
}

/// Top-level session errors.
#[derive(Debug, Error)]
pub enum DsiError {
    /// Peer sent malformed frames or options.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] FrameError),

    /// Session setup could not get its resources.
    #[error("fatal resource error: {0}")]
    FatalResource(#[from] ResourceError),

    /// Send, receive or close failed in the transport.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// Operation not valid in the current session state.
    #[error("{operation} not valid in state {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State the session was in.
        state: &'static str,
    },

    /// Session is closed.
    #[error("session closed")]
    Closed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DsiError {
    /// Check if this error ends the connection it occurred on.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            DsiError::MalformedInput(_)
                | DsiError::FatalResource(_)
                | DsiError::Transport(_)
                | DsiError::Closed
        )
    }
}

/// Result type for session operations.
pub type DsiResult<T> = Result<T, DsiError>;

/// Failure reported by an identifier store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database failed.
    #[error("database error: {0}")]
    Backend(String),

    /// Record exists but is shorter than its fixed layout.
    #[error("record truncated: need {needed} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        actual: usize,
    },
}

/// Outcome of an identifier lookup that produced no value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No record under the key.
    #[error("record not found")]
    NotFound,

    /// Store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LookupError {
    /// Result code carried in a CNID reply.
    pub fn result_code(&self) -> i32 {
        match self {
            LookupError::NotFound => CNID_DBD_RES_NOTFOUND,
            LookupError::Store(_) => CNID_DBD_RES_ERR_DB,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_fatal_errors() {
        assert!(DsiError::MalformedInput(FrameError::InvalidFlags(7)).is_connection_fatal());
        assert!(DsiError::FatalResource(ResourceError::OutOfMemory(16)).is_connection_fatal());
        assert!(DsiError::Transport(io::Error::other("test")).is_connection_fatal());
        assert!(DsiError::Closed.is_connection_fatal());

        let invalid = DsiError::InvalidState {
            operation: "wake",
            state: "active",
        };
        assert!(!invalid.is_connection_fatal());
        assert!(!DsiError::Config("bad".into()).is_connection_fatal());
    }

    #[test]
    fn test_lookup_result_codes() {
        assert_eq!(LookupError::NotFound.result_code(), CNID_DBD_RES_NOTFOUND);
        assert_eq!(
            LookupError::Store(StoreError::Backend("io".into())).result_code(),
            CNID_DBD_RES_ERR_DB
        );
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::OptionOverrun {
            tag: 1,
            declared: 10,
            remaining: 4,
        };
        assert_eq!(
            err.to_string(),
            "option 0x01 too large: 10 bytes declared, 4 remaining"
        );
    }
}

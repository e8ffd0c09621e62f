//! Protocol constants for the DSI session layer.
//!
//! Wire values are fixed by the protocol and MUST NOT be changed. Sizing
//! values are defaults; the live values travel through [`DsiConfig`].
//!
//! [`DsiConfig`]: super::DsiConfig

use std::time::Duration;

// =============================================================================
// FRAME LAYOUT
// =============================================================================

/// Size of the fixed DSI header, and of every tickle frame.
pub const DSI_BLOCKSIZ: usize = 16;

/// Largest command block accepted before the receive buffer exists
/// (OpenSession and GetStatus requests).
pub const DSI_CMDSIZ: usize = 8192;

// =============================================================================
// FRAME FLAGS
// =============================================================================

/// Frame is a request.
pub const DSIFL_REQUEST: u8 = 0x00;

/// Frame is a reply.
pub const DSIFL_REPLY: u8 = 0x01;

// =============================================================================
// COMMANDS
// =============================================================================

/// Close the session.
pub const DSIFUNC_CLOSE: u8 = 0x01;

/// AFP command.
pub const DSIFUNC_CMD: u8 = 0x02;

/// Server status request (no session required).
pub const DSIFUNC_STAT: u8 = 0x03;

/// Open a session.
pub const DSIFUNC_OPEN: u8 = 0x04;

/// Liveness check.
pub const DSIFUNC_TICKLE: u8 = 0x05;

/// AFP write command (carries data after the command block).
pub const DSIFUNC_WRITE: u8 = 0x06;

/// Server attention.
pub const DSIFUNC_ATTN: u8 = 0x08;

// =============================================================================
// OPEN SESSION OPTIONS
// =============================================================================

/// Server request quantum.
pub const DSIOPT_SERVQUANT: u8 = 0x00;

/// Attention quantum.
pub const DSIOPT_ATTNQUANT: u8 = 0x01;

/// Replay cache size (server to client only).
pub const DSIOPT_REPLCSIZE: u8 = 0x02;

/// Tag + length prefix of one option.
pub const OPTION_HEADER_SIZE: usize = 2;

/// Size of every fixed-width option value.
pub const OPTION_VALUE_SIZE: usize = 4;

// =============================================================================
// QUANTUM AND BUFFER SIZING
// =============================================================================

/// Default attention quantum when the client does not send one.
pub const DSI_DEFQUANT: u32 = 2;

/// Smallest server quantum advertised to clients.
pub const DSI_SERVQUANT_MIN: u32 = 32000;

/// Largest server quantum advertised to clients.
pub const DSI_SERVQUANT_MAX: u32 = 0xffff_ffff;

/// Server quantum used when none is configured or the configured one is out of bounds.
pub const DSI_SERVQUANT_DEF: u32 = 0x0010_0000;

/// Number of quantum-sized units in the receive buffer.
pub const DSI_READ_BUFFER_UNITS: usize = 12;

/// Replay cache size advertised to clients.
pub const REPLAYCACHE_SIZE: u32 = 128;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Success.
pub const DSIERR_OK: u32 = 0;

/// Server busy.
pub const DSIERR_SERVBUSY: u32 = 0xffff_fbd1;

/// Too many sessions.
pub const DSIERR_TOOMANY: u32 = 0xffff_fbce;

// =============================================================================
// TIMING
// =============================================================================

/// Interval between server tickles.
pub const TICKLE_INTERVAL: Duration = Duration::from_secs(30);

/// Number of silent tickle intervals before the peer is considered gone.
pub const TICKLE_TIMEOUT: u32 = 4;

// =============================================================================
// IDENTIFIER DATABASE
// =============================================================================

/// Key of the root info record.
pub const ROOTINFO_KEY: [u8; 4] = [0; 4];

/// Offset of the stamp inside the root info record.
pub const CNID_DEV_OFS: usize = 4;

/// Length of the stamp.
pub const CNID_DEV_LEN: usize = 8;

/// Lookup succeeded.
pub const CNID_DBD_RES_OK: i32 = 0;

/// Record not found.
pub const CNID_DBD_RES_NOTFOUND: i32 = 1;

/// Database error.
pub const CNID_DBD_RES_ERR_DB: i32 = 2;

//! DSI Protocol - Transport Layer
//!
//! This module holds everything between raw stream bytes and session
//! logic:
//!
//! - **Frame encoding/decoding**: [`DsiHeader`], [`Frame`] and the fixed 16-byte wire header
//! - **Option blocks**: [`DsiOption`] TLVs exchanged at OpenSession
//! - **Receive buffer**: [`ReceiveBuffer`] sized `read units × quantum`
//! - **Frame reading**: [`read_bootstrap_frame`] and [`FrameReader`]
//! - **Transports**: [`TcpTransport`] over tokio and [`MemoryTransport`] for tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         AFP command dispatch            │
//! ├─────────────────────────────────────────┤
//! │         Session layer (server)          │
//! │   open, tickle, close, request IDs      │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, options, buffer, streams      │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod buffer;
mod frame;
mod memory;
mod option;
mod reader;
mod tcp;

pub use buffer::*;
pub use frame::*;
pub use memory::{MemoryTransport, MemoryWire};
pub use option::*;
pub use reader::*;
pub use tcp::TcpTransport;

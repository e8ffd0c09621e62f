//! # DSI Protocol
//!
//! **D**ata **S**tream **I**nterface
//!
//! DSI is the session layer that carries AFP file-sharing requests over
//! TCP. Every message is a 16-byte big-endian header followed by an
//! optional payload. This crate implements the server side:
//!
//! - **Framing**: header codec and OpenSession option blocks
//! - **Sessions**: buffer provisioning, option negotiation, sleep and
//!   disconnect tracking, the close handshake
//! - **Liveness**: periodic tickles that never interrupt a frame in flight
//! - **Identifier database**: stamp lookup from the CNID root info record
//!
//! ## Feature Flags
//!
//! - `transport` (default): Wire codec, receive buffer, frame reader, TCP transport
//! - `server` (default): Session controller, liveness prober and accept loop
//! - `cnid` (default): Identifier database stamp lookup
//!
//! ## Modules
//!
//! - [`core`]: Constants, configuration, collaborator traits and error types (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`server`]: Server side session layer (requires `server` feature)
//! - [`cnid`]: Identifier lookup (requires `cnid` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dsi_protocol::prelude::*;
//!
//! struct Refuse;
//!
//! impl RequestHandler for Refuse {
//!     fn status(&self) -> Vec<u8> {
//!         Vec::new()
//!     }
//!
//!     async fn handle(&self, _request: &Frame) -> Reply {
//!         Reply::error(DSIERR_SERVBUSY)
//!     }
//! }
//!
//! # async fn run() -> Result<(), ServerError> {
//! let config = DsiConfig::builder()
//!     .bind_addr("127.0.0.1:10548".parse().unwrap())
//!     .build();
//! let server = DsiServer::bind(config, Refuse).await?;
//! server.run().await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

// Identifier lookup (feature-gated)
#[cfg(feature = "cnid")]
#[cfg_attr(docsrs, doc(cfg(feature = "cnid")))]
pub mod cnid;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::constants::*;
    pub use crate::core::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        Command, DsiHeader, DsiOption, Frame, FrameKind, FrameReader, MemoryTransport,
        OptionTag, ReceiveBuffer, TcpTransport,
    };

    #[cfg(feature = "server")]
    pub use crate::server::{
        DsiServer, LivenessProber, OptionNegotiator, Reply, RequestHandler, ServerError,
        Session, SessionState, TickleOutcome,
    };

    #[cfg(feature = "cnid")]
    pub use crate::cnid::{MemoryStore, Stamp, get_stamp};
}

// Re-export commonly used items at crate root
pub use core::{DsiConfig, DsiError, DsiResult};

#[cfg(feature = "transport")]
pub use transport::{DsiHeader, Frame};

#[cfg(feature = "server")]
pub use server::{DsiServer, Session};

//! DSI Protocol - Server Library
//!
//! Session lifecycle, OpenSession negotiation, tickles and the TCP accept
//! loop.

mod negotiation;
#[allow(clippy::module_inception)]
mod server;
mod session;
mod tickle;

pub use negotiation::*;
pub use server::*;
pub use session::{Session, SessionState};
pub use tickle::*;

//! CNID database stamp lookup.
//!
//! The identifier database keeps a "root info" record under a fixed key.
//! Its stamp field identifies the database instance; clients compare it
//! across reconnects to detect a rebuilt database.

mod stamp;
mod store;

pub use stamp::*;
pub use store::MemoryStore;

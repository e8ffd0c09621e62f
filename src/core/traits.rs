//! Collaborator traits consumed by the session layer.
//!
//! The session layer never touches sockets or databases directly; it sends
//! bytes through a [`Transport`] and reads records through an
//! [`IdentifierStore`].

use std::future::Future;
use std::io;

use super::error::StoreError;

/// How a send may suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Wait until every byte is accepted.
    Wait,
    /// Return `WouldBlock` instead of waiting when nothing can be written.
    NoWait,
}

/// Outbound half of a DSI byte stream.
///
/// # Requirements
///
/// - With [`SendMode::NoWait`], `send` MUST NOT wait when the stream cannot
///   take any bytes; it returns an `io::ErrorKind::WouldBlock` error.
/// - Once any byte of `data` has been written, `send` MUST finish the
///   whole buffer so frames are never interleaved mid-frame.
/// - `close` is called at most once per transport by the session layer.
pub trait Transport: Send + 'static {
    /// Write `data` to the peer, returning the number of bytes written.
    fn send(&mut self, data: &[u8], mode: SendMode)
    -> impl Future<Output = io::Result<usize>> + Send;

    /// Toggle non-blocking operation, called once at session open.
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        let _ = nonblocking;
        Ok(())
    }

    /// Orderly shutdown of the outbound direction.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Read access to the identifier database.
///
/// Implementations handle their own locking; callers from many sessions
/// may read concurrently.
pub trait IdentifierStore: Send + Sync {
    /// Fetch the value stored under `key`, `Ok(None)` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}

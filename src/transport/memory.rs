//! In-memory transport.
//!
//! Records every frame written and lets callers simulate a full socket or
//! a failing peer. A [`MemoryWire`] handle stays with the caller to inspect
//! what the session did after the transport itself has been moved or
//! released.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::{SendMode, Transport};

#[derive(Debug, Default)]
struct WireState {
    sent: Vec<Vec<u8>>,
    would_block: bool,
    fail_sends: bool,
    fail_nonblocking: bool,
    nonblocking: bool,
    close_calls: usize,
    releases: usize,
}

/// Inspection and fault-injection handle for a [`MemoryTransport`].
#[derive(Debug, Clone, Default)]
pub struct MemoryWire {
    state: Arc<Mutex<WireState>>,
}

impl MemoryWire {
    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every buffer passed to a successful send, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Total bytes sent.
    pub fn bytes_sent(&self) -> usize {
        self.lock().sent.iter().map(Vec::len).sum()
    }

    /// Make non-waiting sends fail with `WouldBlock`.
    pub fn set_would_block(&self, would_block: bool) {
        self.lock().would_block = would_block;
    }

    /// Make every send fail with `BrokenPipe`.
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Make the non-blocking toggle fail.
    pub fn set_fail_nonblocking(&self, fail: bool) {
        self.lock().fail_nonblocking = fail;
    }

    /// Whether the transport was switched to non-blocking mode.
    pub fn is_nonblocking(&self) -> bool {
        self.lock().nonblocking
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Number of times the transport was dropped.
    pub fn releases(&self) -> usize {
        self.lock().releases
    }
}

/// Transport that writes into memory.
#[derive(Debug)]
pub struct MemoryTransport {
    wire: MemoryWire,
}

impl MemoryTransport {
    /// Create a transport and its inspection handle.
    pub fn new() -> (Self, MemoryWire) {
        let wire = MemoryWire::default();
        (Self { wire: wire.clone() }, wire)
    }
}

impl Transport for MemoryTransport {
    async fn send(&mut self, data: &[u8], mode: SendMode) -> io::Result<usize> {
        let mut state = self.wire.lock();
        if state.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        if state.would_block && mode == SendMode::NoWait {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        state.sent.push(data.to_vec());
        Ok(data.len())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        let mut state = self.wire.lock();
        if state.fail_nonblocking {
            return Err(io::Error::other("fcntl failed"));
        }
        state.nonblocking = nonblocking;
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.wire.lock().close_calls += 1;
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.wire.lock().releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sends() {
        let (mut transport, wire) = MemoryTransport::new();

        transport.send(b"abc", SendMode::Wait).await.unwrap();
        transport.send(b"de", SendMode::NoWait).await.unwrap();

        assert_eq!(wire.sent(), vec![b"abc".to_vec(), b"de".to_vec()]);
        assert_eq!(wire.bytes_sent(), 5);
    }

    #[tokio::test]
    async fn test_would_block_only_affects_nowait() {
        let (mut transport, wire) = MemoryTransport::new();
        wire.set_would_block(true);

        let err = transport.send(b"x", SendMode::NoWait).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(transport.send(b"y", SendMode::Wait).await.is_ok());
        assert_eq!(wire.sent(), vec![b"y".to_vec()]);
    }

    #[tokio::test]
    async fn test_counts_close_and_release() {
        let (mut transport, wire) = MemoryTransport::new();
        transport.close().await.unwrap();
        drop(transport);

        assert_eq!(wire.close_calls(), 1);
        assert_eq!(wire.releases(), 1);
    }
}

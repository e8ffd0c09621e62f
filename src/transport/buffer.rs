//! Session receive buffer.
//!
//! The buffer is sized once at session open to `read units × quantum` and
//! tracked with three cursors:
//!
//! ```text
//! origin        start            eof                   end
//!   |  consumed   |  unread bytes  |   free space       |
//! ```
//!
//! `start ≤ eof ≤ end` holds after every operation.

use crate::core::constants::DSI_BLOCKSIZ;
use crate::core::{QuantumLimits, ResourceError};

/// Compute the capacity for a session receive buffer.
///
/// A zero `requested_quantum` selects `limits.default`.
pub fn buffer_capacity(
    read_units: usize,
    requested_quantum: u32,
    limits: &QuantumLimits,
) -> Result<usize, ResourceError> {
    let quantum = limits.or_default(requested_quantum);
    read_units
        .checked_mul(quantum as usize)
        .ok_or(ResourceError::CapacityOverflow {
            units: read_units,
            quantum,
        })
}

/// Fixed-capacity receive buffer with read cursors.
#[derive(Debug)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    start: usize,
    eof: usize,
}

impl ReceiveBuffer {
    /// Allocate a buffer of `read_units × quantum` bytes.
    ///
    /// Allocation failure is reported instead of aborting so that only the
    /// session being opened fails. The buffer must hold at least one header.
    pub fn provision(
        read_units: usize,
        requested_quantum: u32,
        limits: &QuantumLimits,
    ) -> Result<Self, ResourceError> {
        let capacity = buffer_capacity(read_units, requested_quantum, limits)?;
        if capacity < DSI_BLOCKSIZ {
            return Err(ResourceError::TooSmall {
                capacity,
                minimum: DSI_BLOCKSIZ,
            });
        }
        Self::with_capacity(capacity)
    }

    /// Allocate a buffer of exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| ResourceError::OutOfMemory(capacity))?;
        data.resize(capacity, 0);
        Ok(Self {
            data,
            start: 0,
            eof: 0,
        })
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Read cursor, as an offset from the origin.
    pub fn start(&self) -> usize {
        self.start
    }

    /// End of valid data, as an offset from the origin.
    pub fn eof(&self) -> usize {
        self.eof
    }

    /// End of the buffer, as an offset from the origin.
    pub fn end(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.eof - self.start
    }

    /// No unread bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.eof
    }

    /// Unread bytes.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.start..self.eof]
    }

    /// Free space after `eof`.
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.eof..]
    }

    /// Mark `n` bytes written into [`writable_mut`](Self::writable_mut) as valid.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.end() - self.eof, "commit past end of buffer");
        self.eof += n;
    }

    /// Drop `n` unread bytes from the front.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consume past eof");
        self.start += n;
        if self.start == self.eof {
            self.start = 0;
            self.eof = 0;
        }
    }

    /// Move unread bytes to the origin, maximizing free space.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.data.copy_within(self.start..self.eof, 0);
        self.eof -= self.start;
        self.start = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_limits() -> QuantumLimits {
        QuantumLimits {
            min: 8,
            max: 1024,
            default: 64,
        }
    }

    #[test]
    fn test_provision_capacity() {
        let buffer = ReceiveBuffer::provision(3, 100, &small_limits()).unwrap();

        assert_eq!(buffer.capacity(), 300);
        assert_eq!(buffer.start(), 0);
        assert_eq!(buffer.eof(), 0);
        assert_eq!(buffer.end(), 300);
    }

    #[test]
    fn test_provision_zero_quantum_uses_default() {
        let first = ReceiveBuffer::provision(2, 0, &small_limits()).unwrap();
        let second = ReceiveBuffer::provision(2, 0, &small_limits()).unwrap();

        assert_eq!(first.capacity(), 128);
        assert_eq!(second.capacity(), first.capacity());
    }

    #[test]
    fn test_capacity_overflow() {
        let result = buffer_capacity(usize::MAX, 2, &small_limits());
        assert_eq!(
            result,
            Err(ResourceError::CapacityOverflow {
                units: usize::MAX,
                quantum: 2
            })
        );
    }

    #[test]
    fn test_provision_too_small() {
        let result = ReceiveBuffer::provision(1, 8, &small_limits());
        assert!(matches!(
            result,
            Err(ResourceError::TooSmall {
                capacity: 8,
                minimum: 16
            })
        ));
    }

    #[test]
    fn test_commit_consume_compact() {
        let mut buffer = ReceiveBuffer::with_capacity(8).unwrap();

        buffer.writable_mut()[..5].copy_from_slice(b"hello");
        buffer.commit(5);
        assert_eq!(buffer.readable(), b"hello");

        buffer.consume(2);
        assert_eq!(buffer.start(), 2);
        assert_eq!(buffer.readable(), b"llo");
        assert_eq!(buffer.writable_mut().len(), 3);

        buffer.compact();
        assert_eq!(buffer.start(), 0);
        assert_eq!(buffer.eof(), 3);
        assert_eq!(buffer.readable(), b"llo");
        assert_eq!(buffer.writable_mut().len(), 5);

        buffer.consume(3);
        assert!(buffer.is_empty());
        assert_eq!(buffer.eof(), 0);
    }

    #[test]
    #[should_panic(expected = "commit past end of buffer")]
    fn test_commit_past_end() {
        let mut buffer = ReceiveBuffer::with_capacity(4).unwrap();
        buffer.commit(5);
    }
}

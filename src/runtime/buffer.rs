//! Per-connection byte buffers.
//!
//! - `ReadBuffer`: fixed-capacity buffer that accumulates partial reads until
//!   complete frames can be extracted. Never grows.
//! - `WriteQueue`: FIFO of outgoing bytes. Partial writes advance the front,
//!   so whatever the transport did not accept stays queued in order.

use bytes::{Buf, BytesMut};

/// Fixed-size read buffer with a fill level.
///
/// The storage is allocated once at construction; frames are consumed from
/// the front and any trailing partial frame is moved back to offset zero.
pub struct ReadBuffer {
    buf: Box<[u8]>,
    filled: usize,
}

impl ReadBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            filled: 0,
        }
    }

    /// Bytes received but not yet consumed.
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Free space at the tail, for the next read.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Record that `n` bytes were read into [`spare_mut`](Self::spare_mut).
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.buf.len(), "commit past capacity");
        self.filled = (self.filled + n).min(self.buf.len());
    }

    /// Drop `n` bytes from the front, keeping the remainder.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.filled);
        self.buf.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// Outgoing bytes awaiting a writable socket.
#[derive(Default)]
pub struct WriteQueue {
    pending: BytesMut,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer used by responders to append replies.
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.pending
    }

    /// The unsent bytes, in append order.
    pub fn chunk(&self) -> &[u8] {
        self.pending.chunk()
    }

    /// Mark `n` bytes as sent.
    pub fn advance(&mut self, n: usize) {
        self.pending.advance(n.min(self.pending.len()));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

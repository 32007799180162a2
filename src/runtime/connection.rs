//! Per-connection I/O engine.
//!
//! A `Connection` owns one peer's transport, its bounded read buffer and its
//! write queue. The event loop calls [`Connection::on_readable`] and
//! [`Connection::on_writable`] when poll reports readiness; neither call ever
//! blocks. Frames are cut from the read buffer by the configured [`Framing`]
//! and every reply is appended to the write queue in arrival order.
//!
//! Readiness is edge-triggered, so both hooks keep going until the transport
//! reports `WouldBlock`. An interrupted call stops the pass and asks the event
//! loop to re-arm the registration instead of spinning. Resuming reads after
//! backpressure asks for the same, since the paused pass left input unread.

use crate::error::Error;
use crate::protocol::wire::{HEADER_LEN, MAX_MSG};
use crate::protocol::Framing;
use crate::runtime::buffer::{ReadBuffer, WriteQueue};
use mio::Interest;
use std::io::{self, Read, Write};
use tracing::{debug, trace};

/// Read buffer capacity: one maximal length-prefixed frame.
pub const READ_BUFFER_SIZE: usize = HEADER_LEN + MAX_MSG;

/// Why a connection was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer shut down its side (read returned 0).
    PeerClosed,
    ReadError,
    WriteError,
    /// Write returned 0.
    WriteZero,
    /// Malformed or oversized frame.
    ProtocolViolation,
}

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Reading and writing.
    Open,
    /// Peer closed its side; flushing queued output before closing.
    Draining,
    /// Done. The owner must drop the connection.
    Closed(CloseReason),
}

/// A single peer connection.
pub struct Connection<T> {
    transport: T,
    framing: Framing,
    read_buf: ReadBuffer,
    write_queue: WriteQueue,
    state: ConnState,
    /// Pending output at which reading is paused.
    high_water: usize,
    reading_paused: bool,
    /// Set when the transport may hold input that no further edge will report.
    rearm: bool,
}

impl<T: Read + Write> Connection<T> {
    /// Create a connection in the open state.
    ///
    /// Reading pauses once `max_pending_write` bytes are queued and resumes
    /// when the queue drains to half of that.
    pub fn new(transport: T, framing: Framing, max_pending_write: usize) -> Self {
        Self {
            transport,
            framing,
            read_buf: ReadBuffer::new(READ_BUFFER_SIZE),
            write_queue: WriteQueue::new(),
            state: ConnState::Open,
            high_water: max_pending_write.max(1),
            reading_paused: false,
            rearm: false,
        }
    }

    /// Read what the transport has, extract complete frames and queue replies.
    pub fn on_readable(&mut self) {
        if self.state != ConnState::Open {
            return;
        }

        while !self.reading_paused {
            let n = match self.transport.read(self.read_buf.spare_mut()) {
                Ok(0) => {
                    self.on_peer_closed();
                    return;
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.rearm = true;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Read error");
                    self.close(CloseReason::ReadError);
                    return;
                }
            };

            self.read_buf.commit(n);
            trace!(bytes = n, buffered = self.read_buf.len(), "Read");

            if let Err(e) = self.extract_frames() {
                debug!(error = %e, "Protocol violation");
                self.close(CloseReason::ProtocolViolation);
                return;
            }
        }
    }

    /// Flush as much of the write queue as the transport accepts.
    pub fn on_writable(&mut self) {
        if matches!(self.state, ConnState::Closed(_)) {
            return;
        }

        while !self.write_queue.is_empty() {
            match self.transport.write(self.write_queue.chunk()) {
                Ok(0) => {
                    debug!("Write returned 0");
                    self.close(CloseReason::WriteZero);
                    return;
                }
                Ok(n) => {
                    self.write_queue.advance(n);
                    trace!(bytes = n, pending = self.write_queue.len(), "Wrote");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.rearm = true;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Write error");
                    self.close(CloseReason::WriteError);
                    return;
                }
            }
        }

        self.update_backpressure();

        if self.state == ConnState::Draining && self.write_queue.is_empty() {
            self.close(CloseReason::PeerClosed);
        }
    }

    /// Cut every complete frame off the front of the read buffer.
    fn extract_frames(&mut self) -> Result<(), Error> {
        while let Some(len) = self.framing.next_frame(self.read_buf.filled())? {
            self.framing
                .respond(&self.read_buf.filled()[..len], self.write_queue.buf_mut())?;
            self.read_buf.consume(len);
        }

        if self.read_buf.is_full() {
            return Err(Error::ProtocolViolation(format!(
                "no frame boundary within {} bytes",
                self.read_buf.capacity()
            )));
        }

        self.update_backpressure();
        Ok(())
    }

    fn update_backpressure(&mut self) {
        let pending = self.write_queue.len();
        if !self.reading_paused && pending >= self.high_water {
            trace!(pending, "Pausing reads");
            self.reading_paused = true;
        } else if self.reading_paused && pending <= self.high_water / 2 {
            trace!(pending, "Resuming reads");
            self.reading_paused = false;
            // The paused read pass stopped short of WouldBlock
            self.rearm = true;
        }
    }

    fn on_peer_closed(&mut self) {
        if self.write_queue.is_empty() {
            self.close(CloseReason::PeerClosed);
        } else {
            debug!(pending = self.write_queue.len(), "Peer closed, draining");
            self.state = ConnState::Draining;
        }
    }
}

impl<T> Connection<T> {
    /// Interest the event loop should register for, or `None` once closed.
    pub fn interest(&self) -> Option<Interest> {
        let writable = !self.write_queue.is_empty();
        match self.state {
            ConnState::Closed(_) => None,
            ConnState::Draining => Some(Interest::WRITABLE),
            ConnState::Open if self.reading_paused && writable => Some(Interest::WRITABLE),
            ConnState::Open if writable => Some(Interest::READABLE | Interest::WRITABLE),
            ConnState::Open => Some(Interest::READABLE),
        }
    }

    /// Returns and clears the re-arm request.
    pub fn take_rearm(&mut self) -> bool {
        std::mem::take(&mut self.rearm)
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnState::Closed(_))
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.state {
            ConnState::Closed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_reading_paused(&self) -> bool {
        self.reading_paused
    }

    /// Bytes queued but not yet written.
    pub fn pending_output(&self) -> &[u8] {
        self.write_queue.chunk()
    }

    /// Bytes of an incomplete frame held in the read buffer.
    pub fn buffered_input(&self) -> &[u8] {
        self.read_buf.filled()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn close(&mut self, reason: CloseReason) {
        self.state = ConnState::Closed(reason);
    }
}

//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready,
//! then we perform non-blocking read/write syscalls.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! One thread owns the listener and every connection. Each iteration waits in
//! `poll`, accepts pending connections, then gives every ready connection one
//! read-then-write pass. Connections are stored in a slab keyed by their
//! token; dropping a slot closes its socket.

use crate::config::Config;
use crate::protocol::Framing;
use crate::runtime::connection::Connection;
use crate::runtime::readiness::{ReadySet, Readiness, LISTENER_TOKEN};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A live connection plus what the loop knows about it.
struct Slot {
    conn: Connection<TcpStream>,
    peer: SocketAddr,
    /// Interest currently registered with poll.
    registered: Interest,
}

/// Single-threaded connection multiplexer.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: Slab<Slot>,
    ready: ReadySet,
    framing: Framing,
    max_connections: usize,
    max_pending_write: usize,
}

impl EventLoop {
    /// Bind the listening socket and register it with a new poll instance.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::from_std(create_listener(addr, config.backlog)?);
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            framing = ?config.framing,
            max_connections = config.max_connections,
            "Listening"
        );

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity.max(1)),
            listener,
            local_addr,
            connections: Slab::with_capacity(config.max_connections.min(4096)),
            ready: ReadySet::new(),
            framing: config.framing,
            max_connections: config.max_connections,
            max_pending_write: config.max_pending_write,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Serve forever. Returns only if polling fails.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.turn(None)?;
        }
    }

    /// Run one loop iteration, waiting at most `timeout` for readiness.
    ///
    /// Returns how many readiness entries were dispatched.
    pub fn turn(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e),
        }

        let mut ready = std::mem::take(&mut self.ready);
        for event in self.events.iter() {
            let readable = event.is_readable() || event.is_read_closed() || event.is_error();
            if let Some(readiness) =
                Readiness::from_event(event.token(), readable, event.is_writable())
            {
                ready.push(readiness);
            }
        }

        let mut dispatched = 0;
        for readiness in ready.drain() {
            dispatched += 1;
            match readiness {
                Readiness::Acceptable => self.accept_connections(),
                Readiness::Readable(conn_id) => self.dispatch(conn_id, true),
                Readiness::Writable(conn_id) => self.dispatch(conn_id, false),
            }
        }
        self.ready = ready;

        Ok(dispatched)
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.connections.len() >= self.max_connections {
                        warn!(peer = %peer, "Connection limit reached, refusing");
                        continue;
                    }

                    let entry = self.connections.vacant_entry();
                    let conn_id = entry.key();
                    let mut conn = Connection::new(stream, self.framing, self.max_pending_write);

                    if let Err(e) = self.poll.registry().register(
                        conn.transport_mut(),
                        Token(conn_id),
                        Interest::READABLE,
                    ) {
                        error!(peer = %peer, error = %e, "Failed to register connection");
                        continue;
                    }

                    entry.insert(Slot {
                        conn,
                        peer,
                        registered: Interest::READABLE,
                    });
                    debug!(conn_id, peer = %peer, "Accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.on_accept_error(e);
                    break;
                }
            }
        }
    }

    /// Connections may still be queued behind a failed accept (e.g. EMFILE).
    /// Reregistering the listener makes poll report them again.
    fn on_accept_error(&mut self, e: io::Error) {
        error!(error = %e, "Accept error");
        if let Err(e) =
            self.poll
                .registry()
                .reregister(&mut self.listener, LISTENER_TOKEN, Interest::READABLE)
        {
            error!(error = %e, "Failed to re-arm listener");
        }
    }

    fn dispatch(&mut self, conn_id: usize, readable: bool) {
        // Stale event for a slot closed earlier this round
        let Some(slot) = self.connections.get_mut(conn_id) else {
            return;
        };

        if readable {
            slot.conn.on_readable();
        }
        slot.conn.on_writable();

        if let Err(e) = self.sync_interest(conn_id) {
            debug!(conn_id, error = %e, "Reregister failed");
            self.close_connection(conn_id);
        }
    }

    /// Close the connection if it is done, otherwise update its registration.
    fn sync_interest(&mut self, conn_id: usize) -> io::Result<()> {
        let Some(slot) = self.connections.get_mut(conn_id) else {
            return Ok(());
        };

        let Some(interest) = slot.conn.interest() else {
            self.close_connection(conn_id);
            return Ok(());
        };

        // Reregistering also re-arms edge-triggered readiness
        let rearm = slot.conn.take_rearm();
        if rearm || interest != slot.registered {
            self.poll
                .registry()
                .reregister(slot.conn.transport_mut(), Token(conn_id), interest)?;
            slot.registered = interest;
        }
        Ok(())
    }

    fn close_connection(&mut self, conn_id: usize) {
        if let Some(mut slot) = self.connections.try_remove(conn_id) {
            if let Err(e) = self.poll.registry().deregister(slot.conn.transport_mut()) {
                debug!(conn_id, error = %e, "Deregister failed");
            }
            debug!(
                conn_id,
                peer = %slot.peer,
                reason = ?slot.conn.close_reason(),
                "Connection closed"
            );
        }
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;

    Ok(socket.into())
}

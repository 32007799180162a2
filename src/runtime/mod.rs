//! Readiness-driven runtime.
//!
//! Built on mio (epoll on Linux, kqueue on macOS):
//! - `EventLoop`: owns the listener and all connections on one thread
//! - `Connection`: per-peer buffering, framing and partial-write state
//! - `Readiness`: tagged poll events dispatched by the loop

pub mod buffer;
pub mod connection;
pub mod event_loop;
pub mod readiness;

pub use connection::{CloseReason, ConnState, Connection};
pub use event_loop::EventLoop;
pub use readiness::Readiness;

use crate::config::Config;

/// Bind according to `config` and serve until polling fails.
pub fn run(config: &Config) -> std::io::Result<()> {
    EventLoop::bind(config)?.run()
}

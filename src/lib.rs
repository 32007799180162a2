//! echo-reactor: a single-threaded readiness-driven echo server.
//!
//! The server multiplexes any number of TCP connections on one thread,
//! reassembles frames from partial reads and queues replies without letting
//! one slow peer block another. Two framings are supported:
//! - newline-delimited lines, echoed verbatim
//! - length-prefixed requests, answered with status-coded responses
//!
//! The blocking [`client::Client`] speaks both.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;

pub use error::{Error, Result};

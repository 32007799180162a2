//! Wire formats.
//!
//! - `wire`: length-prefixed request/response codec shared by client and server
//! - `framing`: how the server splits inbound bytes into frames and replies

pub mod framing;
pub mod wire;

pub use framing::Framing;

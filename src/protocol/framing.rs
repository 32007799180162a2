//! Inbound framing policy.
//!
//! Decides where a frame ends in a connection's read buffer and what gets
//! queued in reply:
//! - `Line`: a frame ends at the first `\n`; the line is echoed verbatim,
//!   terminator included.
//! - `Length`: a frame is a length-prefixed request (see [`wire`]); the reply
//!   is a status-coded response whose body is the arguments joined by spaces.

use crate::error::Result;
use crate::protocol::wire::{self, STATUS_ERR, STATUS_OK};
use bytes::BytesMut;
use serde::Deserialize;

/// Framing discipline used by the server for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Newline-delimited lines, echoed back as-is.
    #[default]
    Line,
    /// Length-prefixed requests answered with status-coded responses.
    Length,
}

impl Framing {
    /// Length of the complete frame at the front of `buf`, if any.
    ///
    /// Errors mean the stream can never yield a valid frame.
    pub fn next_frame(self, buf: &[u8]) -> Result<Option<usize>> {
        match self {
            Framing::Line => Ok(buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)),
            Framing::Length => wire::frame_len(buf),
        }
    }

    /// Append the reply for one complete frame to `out`.
    pub fn respond(self, frame: &[u8], out: &mut BytesMut) -> Result<()> {
        match self {
            Framing::Line => {
                out.extend_from_slice(frame);
                Ok(())
            }
            Framing::Length => {
                let args = wire::decode_request(frame)?;
                if args.is_empty() {
                    return wire::encode_response_into(STATUS_ERR, b"empty request", out);
                }
                let body = args.join(&b' ');
                wire::encode_response_into(STATUS_OK, &body, out)
            }
        }
    }
}

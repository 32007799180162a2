//! Blocking request/response client.
//!
//! Sends one length-prefixed request and reads back one status-coded
//! response, or, for line-framed servers, one line and its echo. Every call
//! either completes the whole exchange or fails; there is no retry.

use crate::error::{Error, Result};
use crate::protocol::wire::{self, Response, HEADER_LEN, MAX_MSG};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use tracing::debug;

/// A connected client.
pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    /// Connect to `addr` (e.g. `127.0.0.1:1234`).
    ///
    /// With a `read_timeout`, a response that never arrives fails with an
    /// `Io` error of kind `WouldBlock` or `TimedOut` instead of blocking.
    pub fn connect(addr: &str, read_timeout: Option<Duration>) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| Error::ConnectFailure {
            addr: addr.to_string(),
            source,
        })?;
        stream
            .set_read_timeout(read_timeout)
            .map_err(|source| Error::Resource {
                context: "set_read_timeout",
                source,
            })?;
        debug!(addr, "Connected");

        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Send one request. Oversized requests are rejected before anything is written.
    pub fn send_request<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<()> {
        let frame = wire::encode_request(args)?;
        self.write_all(&frame)
    }

    /// Read one response.
    pub fn receive_response(&mut self) -> Result<Response> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact(&mut header, "response header")?;
        let len = wire::decode_response_header(header)?;

        let mut body = vec![0u8; len];
        self.read_exact(&mut body, "response body")?;
        wire::decode_response_body(&body)
    }

    /// Send a request and wait for its response.
    pub fn call<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<Response> {
        self.send_request(args)?;
        self.receive_response()
    }

    /// Send raw bytes followed by `\n` (line framing).
    pub fn send_line(&mut self, line: &[u8]) -> Result<()> {
        if line.len() + 1 > HEADER_LEN + MAX_MSG {
            return Err(Error::MessageTooLarge {
                len: line.len() + 1,
                max: HEADER_LEN + MAX_MSG,
            });
        }
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\n');
        self.write_all(&buf)
    }

    /// Read one line, terminator included.
    pub fn receive_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let limit = (HEADER_LEN + MAX_MSG) as u64;
        let n = (&mut self.reader).take(limit).read_until(b'\n', &mut line)?;
        if n == 0 || line.last() != Some(&b'\n') {
            if n as u64 == limit {
                return Err(Error::ResponseTooLarge {
                    len: n,
                    max: HEADER_LEN + MAX_MSG,
                });
            }
            return Err(Error::TruncatedIo("connection closed before end of line"));
        }
        Ok(line)
    }

    /// Write raw bytes as-is.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.reader.get_mut().write_all(buf).map_err(|e| match e.kind() {
            io::ErrorKind::WriteZero | io::ErrorKind::Interrupted => {
                Error::TruncatedIo("connection closed while sending")
            }
            _ => Error::Io(e),
        })
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &'static str) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted => {
                debug!(what, "Short read");
                Error::TruncatedIo("connection closed mid-response")
            }
            _ => Error::Io(e),
        })
    }
}

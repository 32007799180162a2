//! Length-prefixed binary wire format.
//!
//! ```text
//! Request:  <total_len:u32> <count:u32> { <len:u32> <bytes> } * count
//! Response: <total_len:u32> <status:u32> <body>
//! ```
//!
//! `total_len` excludes itself and never exceeds [`MAX_MSG`]. All integers are
//! little-endian. Sizes read from the wire are checked against the cap before
//! anything is allocated from them.

use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Maximum payload size, excluding the leading length field.
pub const MAX_MSG: usize = 4096;

/// Size of the leading `total_len` field.
pub const HEADER_LEN: usize = 4;

/// Request handled.
pub const STATUS_OK: u32 = 0;
/// Request rejected.
pub const STATUS_ERR: u32 = 1;
/// Requested thing does not exist.
pub const STATUS_NX: u32 = 2;

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

impl Response {
    /// Body as text, replacing invalid UTF-8.
    pub fn body_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Encode a request frame from an ordered list of arguments.
pub fn encode_request<S: AsRef<[u8]>>(args: &[S]) -> Result<Vec<u8>> {
    let total_len = args
        .iter()
        .fold(4usize, |acc, arg| acc.saturating_add(4 + arg.as_ref().len()));
    if total_len > MAX_MSG {
        return Err(Error::MessageTooLarge {
            len: total_len,
            max: MAX_MSG,
        });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + total_len);
    buf.put_u32_le(total_len as u32);
    buf.put_u32_le(args.len() as u32);
    for arg in args {
        let arg = arg.as_ref();
        buf.put_u32_le(arg.len() as u32);
        buf.put_slice(arg);
    }
    Ok(buf.to_vec())
}

/// Decode a complete request frame (including its length field).
pub fn decode_request(frame: &[u8]) -> Result<Vec<Vec<u8>>> {
    let total_len =
        read_u32(frame, 0).ok_or_else(|| violation("frame shorter than its length field"))?;
    let total_len = check_len(total_len)?;
    if frame.len() != HEADER_LEN + total_len {
        return Err(violation(format!(
            "frame is {} bytes, header announces {}",
            frame.len() - HEADER_LEN,
            total_len
        )));
    }

    let body = &frame[HEADER_LEN..];
    let count = read_u32(body, 0).ok_or_else(|| violation("missing argument count"))? as usize;

    // Each argument needs at least its own length field.
    if count > (body.len() - 4) / 4 {
        return Err(violation(format!("argument count {count} overruns frame")));
    }

    let mut args = Vec::with_capacity(count);
    let mut pos = 4;
    for i in 0..count {
        let len = read_u32(body, pos)
            .ok_or_else(|| violation(format!("argument {i} length overruns frame")))?
            as usize;
        pos += 4;
        let arg = body
            .get(pos..pos + len)
            .ok_or_else(|| violation(format!("argument {i} data overruns frame")))?;
        args.push(arg.to_vec());
        pos += len;
    }

    if pos != body.len() {
        return Err(violation(format!(
            "{} trailing bytes after last argument",
            body.len() - pos
        )));
    }

    Ok(args)
}

/// Encode a response frame.
pub fn encode_response(status: u32, body: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4 + body.len());
    encode_response_into(status, body, &mut buf)?;
    Ok(buf.to_vec())
}

/// Append a response frame to `out`. Nothing is written on error.
pub fn encode_response_into(status: u32, body: &[u8], out: &mut BytesMut) -> Result<()> {
    let total_len = 4 + body.len();
    if total_len > MAX_MSG {
        return Err(Error::MessageTooLarge {
            len: total_len,
            max: MAX_MSG,
        });
    }
    out.reserve(HEADER_LEN + total_len);
    out.put_u32_le(total_len as u32);
    out.put_u32_le(status);
    out.put_slice(body);
    Ok(())
}

/// Decode the response length field, rejecting oversized responses.
pub fn decode_response_header(header: [u8; HEADER_LEN]) -> Result<usize> {
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MSG {
        return Err(Error::ResponseTooLarge { len, max: MAX_MSG });
    }
    Ok(len)
}

/// Split a response body into status code and payload.
pub fn decode_response_body(body: &[u8]) -> Result<Response> {
    let status = read_u32(body, 0).ok_or(Error::TruncatedResponse { len: body.len() })?;
    Ok(Response {
        status,
        body: body[4..].to_vec(),
    })
}

/// Length of the complete frame at the front of `buf`, if one is buffered.
///
/// Fails as soon as the length field is visible and exceeds [`MAX_MSG`], so an
/// oversized frame is rejected before its body is read.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    let Some(total_len) = read_u32(buf, 0) else {
        return Ok(None);
    };
    let total_len = check_len(total_len)?;
    let needed = HEADER_LEN + total_len;
    Ok((buf.len() >= needed).then_some(needed))
}

fn check_len(total_len: u32) -> Result<usize> {
    let len = total_len as usize;
    if len > MAX_MSG {
        return Err(Error::MessageTooLarge { len, max: MAX_MSG });
    }
    Ok(len)
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn violation(msg: impl Into<String>) -> Error {
    Error::ProtocolViolation(msg.into())
}

//! Incremental RESP Framing
//!
//! [`read_frame`] looks at the front of a byte buffer and either decodes one
//! complete frame or reports that more bytes are needed. It keeps no state
//! between calls: the caller owns the buffer, appends whatever the socket
//! delivers, and retries.
//!
//! ## Contract
//!
//! - `None`: the buffer does not yet hold one complete frame. Nothing was
//!   consumed; call again once more data has arrived.
//! - `Some((value, consumed))`: the first `consumed` bytes form one frame. The
//!   caller drops exactly those bytes and keeps the rest, which may already
//!   contain the next pipelined request.
//!
//! Malformed input is not an error path. A header that does not parse is still
//! consumed, and the frame decodes to a [`RespValue::Error`] describing the
//! problem, so the connection can reply with it and carry on:
//!
//! ```text
//! :1.25\r\n    ->  Error("value \"1.25\" is not a 64-bit integer"), 7 bytes
//! $x\r\n       ->  Error("value \"x\" is not a valid bulk string length"), 4 bytes
//! ?PING\r\n    ->  Error("unknown protocol symbol \"?\""), 7 bytes
//! ```
//!
//! Inside an array, the first element that decodes to an error stops the
//! parse and becomes the value of the whole array.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;

/// Arrays nested deeper than this decode to an error value.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Largest bulk string payload accepted (512 MiB, as in Redis).
pub const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

/// Decodes the first complete frame at the front of `buf`.
///
/// # Example
///
/// ```
/// use ledgerkv::protocol::{read_frame, RespValue};
///
/// let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n+PARTIAL";
/// let (value, consumed) = read_frame(data).unwrap();
/// assert_eq!(value, RespValue::command(["GET", "name"]));
/// assert_eq!(consumed, 23);
///
/// assert!(read_frame(&data[consumed..]).is_none());
/// ```
pub fn read_frame(buf: &[u8]) -> Option<(RespValue, usize)> {
    read_value(buf, 0)
}

fn read_value(buf: &[u8], depth: usize) -> Option<(RespValue, usize)> {
    let symbol = *buf.first()?;
    let (line, header_len) = read_line(buf)?;

    match symbol {
        prefix::SIMPLE_STRING => Some((RespValue::SimpleString(lossy(line)), header_len)),
        prefix::ERROR => Some((RespValue::Error(lossy(line)), header_len)),
        prefix::INTEGER => match parse_i64(line) {
            Some(n) => Some((RespValue::Integer(n), header_len)),
            None => Some((
                malformed(line, "is not a 64-bit integer"),
                header_len,
            )),
        },
        prefix::BULK_STRING => read_bulk_string(buf, line, header_len),
        prefix::ARRAY => read_array(buf, line, header_len, depth),
        other => Some((
            RespValue::Error(format!(
                "unknown protocol symbol \"{}\"",
                (other as char).escape_default()
            )),
            header_len,
        )),
    }
}

/// `$<len>\r\n<payload>\r\n`
fn read_bulk_string(buf: &[u8], line: &[u8], header_len: usize) -> Option<(RespValue, usize)> {
    let invalid = || {
        Some((
            malformed(line, "is not a valid bulk string length"),
            header_len,
        ))
    };
    let declared = match parse_i64(line) {
        Some(-1) => return Some((RespValue::Null, header_len)),
        Some(n) => match usize::try_from(n) {
            Ok(len) if len <= MAX_BULK_LENGTH => len,
            _ => return invalid(),
        },
        None => return invalid(),
    };

    let frame_len = header_len + declared + CRLF.len();
    if buf.len() < frame_len {
        return None;
    }

    let payload = &buf[header_len..header_len + declared];
    if &buf[header_len + declared..frame_len] != CRLF {
        return Some((
            RespValue::Error(format!(
                "bulk string of length {} is not terminated by CRLF",
                declared
            )),
            frame_len,
        ));
    }

    Some((
        RespValue::BulkString(Bytes::copy_from_slice(payload)),
        frame_len,
    ))
}

/// `*<count>\r\n<element>...`
fn read_array(
    buf: &[u8],
    line: &[u8],
    header_len: usize,
    depth: usize,
) -> Option<(RespValue, usize)> {
    let invalid = || {
        Some((
            malformed(line, "is not a valid array length"),
            header_len,
        ))
    };
    let count = match parse_i64(line) {
        Some(-1) => return Some((RespValue::Null, header_len)),
        Some(n) => match usize::try_from(n) {
            Ok(count) => count,
            Err(_) => return invalid(),
        },
        None => return invalid(),
    };

    if depth >= MAX_NESTING_DEPTH {
        return Some((
            RespValue::Error(format!(
                "array nesting exceeds {} levels",
                MAX_NESTING_DEPTH
            )),
            header_len,
        ));
    }

    // The count comes off the wire; don't let it size the allocation.
    let mut elements = Vec::with_capacity(count.min(64));
    let mut consumed = header_len;

    for _ in 0..count {
        let (element, used) = read_value(&buf[consumed..], depth + 1)?;
        consumed += used;
        if element.is_error() {
            return Some((element, consumed));
        }
        elements.push(element);
    }

    Some((RespValue::Array(elements), consumed))
}

/// Returns the content of the first line (after the type byte, before CRLF)
/// and the length of the whole line including both.
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let end = find_crlf(&buf[1..])?;
    Some((&buf[1..1 + end], 1 + end + CRLF.len()))
}

/// Position of the first `\r\n` in `buf`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

fn parse_i64(line: &[u8]) -> Option<i64> {
    std::str::from_utf8(line).ok()?.parse().ok()
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn malformed(line: &[u8], problem: &str) -> RespValue {
    RespValue::Error(format!("value \"{}\" {}", lossy(line), problem))
}

//! RESP Value Types
//!
//! Every frame that crosses the wire, in either direction, is one of the
//! variants of [`RespValue`]. Requests are arrays of bulk strings; replies can
//! be any variant.
//!
//! ## Wire Format
//!
//! ```text
//! +OK\r\n                         SimpleString("OK")
//! -ERR syntax error\r\n           Error("ERR syntax error")
//! :42\r\n                         Integer(42)
//! $5\r\nhello\r\n                 BulkString("hello")
//! $-1\r\n                         Null
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n  Array([BulkString("GET"), BulkString("k")])
//! ```
//!
//! Serialization is the exact inverse of [`read_frame`](super::read_frame):
//! for any complete, well-formed frame `b`, serializing the decoded value
//! yields `b` again.

use bytes::Bytes;
use std::fmt;

/// Line terminator for every RESP header and scalar.
pub const CRLF: &[u8] = b"\r\n";

/// Leading type bytes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A decoded RESP frame, or a reply waiting to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+<text>\r\n`
    SimpleString(String),

    /// `-<message>\r\n`
    ///
    /// Also produced by the decoder for malformed input, so that the caller
    /// can hand it back to the client unchanged.
    Error(String),

    /// `:<i64>\r\n`
    Integer(i64),

    /// `$<len>\r\n<payload>\r\n`, binary safe.
    BulkString(Bytes),

    /// A null bulk string or null array. Always encoded as `$-1\r\n`.
    Null,

    /// `*<count>\r\n` followed by `count` nested frames.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Creates a simple string reply.
    ///
    /// # Example
    /// ```
    /// use ledgerkv::protocol::RespValue;
    /// assert_eq!(RespValue::simple_string("OK").serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates a bulk string.
    ///
    /// # Example
    /// ```
    /// use ledgerkv::protocol::RespValue;
    /// let bulk = RespValue::bulk_string("hello");
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Builds a request array out of bulk strings, the shape every client
    /// command takes on the wire.
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        RespValue::Array(parts.into_iter().map(RespValue::bulk_string).collect())
    }

    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// The type byte this value is introduced by on the wire.
    ///
    /// Used when reporting `expected '$', got '<symbol>'` protocol errors.
    pub fn symbol(&self) -> char {
        let byte = match self {
            RespValue::SimpleString(_) => prefix::SIMPLE_STRING,
            RespValue::Error(_) => prefix::ERROR,
            RespValue::Integer(_) => prefix::INTEGER,
            RespValue::BulkString(_) | RespValue::Null => prefix::BULK_STRING,
            RespValue::Array(_) => prefix::ARRAY,
        };
        byte as char
    }

    /// Encodes the value into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Appends the wire encoding of this value to `buf`.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => write_line(buf, prefix::SIMPLE_STRING, s.as_bytes()),
            RespValue::Error(s) => write_line(buf, prefix::ERROR, s.as_bytes()),
            RespValue::Integer(n) => write_line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                write_line(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => write_line(buf, prefix::BULK_STRING, b"-1"),
            RespValue::Array(values) => {
                write_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

fn write_line(buf: &mut Vec<u8>, symbol: u8, content: &[u8]) {
    buf.push(symbol);
    buf.extend_from_slice(content);
    buf.extend_from_slice(CRLF);
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Bytes> for RespValue {
    fn from(data: Bytes) -> Self {
        RespValue::BulkString(data)
    }
}

impl From<Option<Bytes>> for RespValue {
    fn from(data: Option<Bytes>) -> Self {
        data.map_or(RespValue::Null, RespValue::BulkString)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_serialize() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
        assert_eq!(
            RespValue::error("ERR syntax error").serialize(),
            b"-ERR syntax error\r\n"
        );
        assert_eq!(RespValue::Integer(-42).serialize(), b":-42\r\n");
        assert_eq!(RespValue::bulk_string("hello").serialize(), b"$5\r\nhello\r\n");
        assert_eq!(RespValue::bulk_string("").serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn test_null_serializes_as_null_bulk() {
        assert_eq!(RespValue::Null.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_command_array_serialize() {
        let value = RespValue::command(["GET", "name"]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    }

    #[test]
    fn test_nested_array_serialize() {
        let value = RespValue::Array(vec![
            RespValue::Integer(1),
            RespValue::Array(vec![RespValue::Null, RespValue::pong()]),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n:1\r\n*2\r\n$-1\r\n+PONG\r\n");
        assert_eq!(RespValue::Array(vec![]).serialize(), b"*0\r\n");
    }

    #[test]
    fn test_symbol() {
        assert_eq!(RespValue::pong().symbol(), '+');
        assert_eq!(RespValue::Integer(1).symbol(), ':');
        assert_eq!(RespValue::Null.symbol(), '$');
        assert_eq!(RespValue::Array(vec![]).symbol(), '*');
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(RespValue::from(None::<Bytes>), RespValue::Null);
        assert_eq!(
            RespValue::from(Some(Bytes::from("v"))),
            RespValue::bulk_string("v")
        );
    }
}

//! RESP Protocol Codec
//!
//! LedgerKV speaks RESP2, the Redis Serialization Protocol, so any Redis
//! client can talk to it. The same codec also frames the append-only log,
//! which is nothing more than the client requests written back to back.
//!
//! ## Modules
//!
//! - `types`: the [`RespValue`] enum and its serialization
//! - `parser`: [`read_frame`], the stateless incremental decoder
//!
//! ## Example
//!
//! ```
//! use ledgerkv::protocol::{read_frame, RespValue};
//!
//! let (request, consumed) = read_frame(b"*1\r\n$4\r\nPING\r\n").unwrap();
//! assert_eq!(request, RespValue::command(["PING"]));
//! assert_eq!(consumed, 14);
//!
//! assert_eq!(RespValue::pong().serialize(), b"+PONG\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{read_frame, MAX_BULK_LENGTH};
pub use types::RespValue;

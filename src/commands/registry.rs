//! Command Registry
//!
//! Turns a decoded request frame into a [`Command`], or into the error reply
//! the client should get instead. The table of known commands is built once
//! at startup and shared behind an `Arc`; it never changes afterwards.
//!
//! ## Validation Order
//!
//! ```text
//! frame ──> array? ──> non-empty? ──> all bulk strings? ──> known name?
//!                                                              │
//!                                                              ▼
//!                                             per-command arity and arguments
//! ```
//!
//! Nothing is executed or archived for a request that fails validation.
//!
//! ## Relative Expiry
//!
//! `SET ... EX s` and `SET ... PX ms` are resolved against the registry's
//! clock here, at validation time, and the request bytes kept for the log are
//! rewritten to `SET ... PXAT <ms>`. Replaying the log later therefore expires
//! the key at the original deadline, not `s` seconds after the restart.

use crate::commands::command::{Command, Operation, SetCommand};
use crate::protocol::RespValue;
use crate::storage::{Clock, Expiry, WriteCondition};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a command from its arguments (everything after the name).
type Validator = fn(&CommandRegistry, Invocation<'_>) -> Result<Command, RespValue>;

/// One request, split into its parts.
struct Invocation<'a> {
    /// Registered (upper-case) name.
    name: &'static str,
    /// The name exactly as the client sent it.
    raw_name: &'a Bytes,
    args: &'a [Bytes],
    /// The complete request frame as received.
    request: Bytes,
}

impl Invocation<'_> {
    fn build(self, operation: Operation) -> Result<Command, RespValue> {
        Ok(Command::new(self.name, operation, self.request))
    }

    fn wrong_arity(&self) -> RespValue {
        RespValue::error(format!(
            "ERR wrong number of arguments for '{}' command",
            self.name.to_ascii_lowercase()
        ))
    }

    fn expect_exactly(&self, count: usize) -> Result<(), RespValue> {
        if self.args.len() == count {
            Ok(())
        } else {
            Err(self.wrong_arity())
        }
    }

    fn expect_at_least(&self, count: usize) -> Result<(), RespValue> {
        if self.args.len() >= count {
            Ok(())
        } else {
            Err(self.wrong_arity())
        }
    }
}

/// The table of supported commands.
pub struct CommandRegistry {
    validators: HashMap<&'static str, Validator>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.validators.keys().collect();
        names.sort();
        f.debug_struct("CommandRegistry")
            .field("commands", &names)
            .field("clock", &self.clock)
            .finish()
    }
}

impl CommandRegistry {
    /// Registers every supported command.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let table: [(&'static str, Validator); 12] = [
            ("PING", validate_ping),
            ("ECHO", validate_echo),
            ("GET", validate_get),
            ("SET", validate_set),
            ("DEL", validate_del),
            ("EXISTS", validate_exists),
            ("INCR", validate_incr),
            ("DECR", validate_decr),
            ("LPUSH", validate_lpush),
            ("RPUSH", validate_rpush),
            ("LRANGE", validate_lrange),
            ("CONFIG", validate_config),
        ];

        Self {
            validators: table.into_iter().collect(),
            clock,
        }
    }

    /// True if `name` (any case) is a registered command.
    pub fn contains(&self, name: &str) -> bool {
        self.validators
            .contains_key(name.to_ascii_uppercase().as_str())
    }

    /// Validates a decoded request.
    ///
    /// `request` must be the exact bytes `frame` was decoded from.
    ///
    /// # Example
    ///
    /// ```
    /// use ledgerkv::commands::CommandRegistry;
    /// use ledgerkv::protocol::{read_frame, RespValue};
    /// use ledgerkv::storage::SystemClock;
    /// use bytes::Bytes;
    /// use std::sync::Arc;
    ///
    /// let registry = CommandRegistry::new(Arc::new(SystemClock));
    /// let raw = Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    /// let (frame, _) = read_frame(&raw).unwrap();
    ///
    /// let command = registry.validate(frame, raw.clone()).unwrap();
    /// assert_eq!(command.name(), "GET");
    /// assert!(!command.is_update());
    ///
    /// let err = registry.validate(RespValue::command(["NOPE"]), Bytes::new()).unwrap_err();
    /// assert_eq!(err, RespValue::error("ERR unknown command 'NOPE'"));
    /// ```
    pub fn validate(&self, frame: RespValue, request: Bytes) -> Result<Command, RespValue> {
        let items = match frame {
            RespValue::Array(items) => items,
            // Malformed input already decoded to an error reply.
            RespValue::Error(message) => return Err(RespValue::Error(message)),
            other => return Err(protocol_error('*', other.symbol())),
        };

        if items.is_empty() {
            return Err(RespValue::error("ERR empty command"));
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::BulkString(part) => parts.push(part),
                other => return Err(protocol_error('$', other.symbol())),
            }
        }

        let (raw_name, args) = parts.split_first().ok_or_else(|| RespValue::error("ERR empty command"))?;
        let upper = String::from_utf8_lossy(raw_name).to_ascii_uppercase();

        let Some((&name, validator)) = self.validators.get_key_value(upper.as_str()) else {
            return Err(RespValue::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(raw_name)
            )));
        };

        validator(
            self,
            Invocation {
                name,
                raw_name,
                args,
                request,
            },
        )
    }
}

fn protocol_error(expected: char, got: char) -> RespValue {
    RespValue::error(format!(
        "ERR Protocol error: expected '{}', got '{}'",
        expected, got
    ))
}

fn syntax_error() -> RespValue {
    RespValue::error("ERR syntax error")
}

fn not_an_integer() -> RespValue {
    RespValue::error("ERR value is not an integer or out of range")
}

fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

// ============================================================================
// Validators
// ============================================================================

fn validate_ping(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    if inv.args.len() > 1 {
        return Err(inv.wrong_arity());
    }
    let message = inv.args.first().cloned();
    inv.build(Operation::Ping(message))
}

fn validate_echo(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_exactly(1)?;
    let message = inv.args[0].clone();
    inv.build(Operation::Echo(message))
}

fn validate_get(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_exactly(1)?;
    let key = inv.args[0].clone();
    inv.build(Operation::Get(key))
}

fn validate_del(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_at_least(1)?;
    let keys = inv.args.to_vec();
    inv.build(Operation::Del(keys))
}

fn validate_exists(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_at_least(1)?;
    let keys = inv.args.to_vec();
    inv.build(Operation::Exists(keys))
}

fn validate_incr(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_exactly(1)?;
    let key = inv.args[0].clone();
    inv.build(Operation::Incr(key))
}

fn validate_decr(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_exactly(1)?;
    let key = inv.args[0].clone();
    inv.build(Operation::Decr(key))
}

fn validate_lpush(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_at_least(2)?;
    let key = inv.args[0].clone();
    let values = inv.args[1..].to_vec();
    inv.build(Operation::LPush { key, values })
}

fn validate_rpush(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_at_least(2)?;
    let key = inv.args[0].clone();
    let values = inv.args[1..].to_vec();
    inv.build(Operation::RPush { key, values })
}

fn validate_lrange(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_exactly(3)?;
    let key = inv.args[0].clone();
    let start = parse_i64(&inv.args[1]).ok_or_else(not_an_integer)?;
    let end = parse_i64(&inv.args[2]).ok_or_else(not_an_integer)?;
    inv.build(Operation::LRange { key, start, end })
}

fn validate_config(_: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.build(Operation::Config)
}

/// `SET key value [GET] [NX|XX] [EX s|PX ms|EXAT ts|PXAT ts|KEEPTTL]`
fn validate_set(registry: &CommandRegistry, inv: Invocation<'_>) -> Result<Command, RespValue> {
    inv.expect_at_least(2)?;

    let mut get = false;
    let mut condition = WriteCondition::Always;
    let mut expiry: Option<Expiry> = None;
    // Position of a relative EX/PX option, which the log stores as PXAT.
    let mut relative_at: Option<usize> = None;

    let mut i = 2;
    while i < inv.args.len() {
        let option = inv.args[i].to_ascii_uppercase();
        match option.as_slice() {
            b"GET" => get = true,
            b"NX" | b"XX" => {
                if condition != WriteCondition::Always {
                    return Err(syntax_error());
                }
                condition = if option == b"NX" {
                    WriteCondition::IfAbsent
                } else {
                    WriteCondition::IfPresent
                };
            }
            b"KEEPTTL" => {
                if expiry.is_some() {
                    return Err(syntax_error());
                }
                expiry = Some(Expiry::KeepTtl);
            }
            b"EX" | b"PX" | b"EXAT" | b"PXAT" => {
                if expiry.is_some() {
                    return Err(syntax_error());
                }
                let amount = inv
                    .args
                    .get(i + 1)
                    .and_then(|arg| parse_i64(arg))
                    .ok_or_else(syntax_error)?;

                let now = registry.clock.now_millis();
                let deadline = match option.as_slice() {
                    b"EX" => now.saturating_add(amount.saturating_mul(1000)),
                    b"PX" => now.saturating_add(amount),
                    b"EXAT" => amount.saturating_mul(1000),
                    _ => amount,
                };
                if matches!(option.as_slice(), b"EX" | b"PX") {
                    relative_at = Some(i);
                }
                expiry = Some(Expiry::AtMillis(deadline));
                i += 1;
            }
            _ => return Err(syntax_error()),
        }
        i += 1;
    }

    let expiry = expiry.unwrap_or(Expiry::Never);
    let set = SetCommand {
        key: inv.args[0].clone(),
        value: inv.args[1].clone(),
        condition,
        get,
        expiry,
    };

    match (relative_at, expiry) {
        (Some(index), Expiry::AtMillis(deadline)) => {
            let request = absolute_request(inv.raw_name, inv.args, index, deadline);
            Ok(Command::new(inv.name, Operation::Set(set), request))
        }
        _ => inv.build(Operation::Set(set)),
    }
}

/// Re-encodes a SET request with the option at `index` replaced by
/// `PXAT <deadline>`.
fn absolute_request(raw_name: &Bytes, args: &[Bytes], index: usize, deadline: i64) -> Bytes {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(raw_name.clone());
    parts.extend_from_slice(args);
    parts[index + 1] = Bytes::from_static(b"PXAT");
    parts[index + 2] = Bytes::from(deadline.to_string());
    Bytes::from(RespValue::command(parts).serialize())
}

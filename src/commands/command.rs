//! Validated Commands
//!
//! A [`Command`] is what the registry hands to the executor: a fully parsed
//! [`Operation`] plus the exact request bytes that go into the append-only log
//! when the command mutates the store.
//!
//! Execution turns store results into RESP replies. Store errors that a client
//! can trigger (`WRONGTYPE`, non-integer counters) become error replies here;
//! nothing in this module fails in any other way.

use crate::protocol::RespValue;
use crate::storage::{Expiry, Store, StoreError, WriteCondition};
use bytes::Bytes;

/// A validated unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    operation: Operation,
    request: Bytes,
}

/// What a command does, with its arguments already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Ping(Option<Bytes>),
    Echo(Bytes),
    Get(Bytes),
    Set(SetCommand),
    Del(Vec<Bytes>),
    Exists(Vec<Bytes>),
    Incr(Bytes),
    Decr(Bytes),
    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LRange { key: Bytes, start: i64, end: i64 },
    /// Accepted so that client handshakes don't fail; does nothing.
    Config,
}

/// `SET key value [GET] [NX|XX] [expiry]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    pub key: Bytes,
    pub value: Bytes,
    pub condition: WriteCondition,
    /// Reply with the previous value instead of `OK`.
    pub get: bool,
    pub expiry: Expiry,
}

impl Command {
    pub fn new(name: &'static str, operation: Operation, request: impl Into<Bytes>) -> Self {
        Self {
            name,
            operation,
            request: request.into(),
        }
    }

    /// Upper-case command name, as registered.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The RESP bytes to append to the log for this command.
    pub fn request(&self) -> &Bytes {
        &self.request
    }

    /// True for commands that change the store and must be archived.
    pub fn is_update(&self) -> bool {
        matches!(
            self.operation,
            Operation::Set(_)
                | Operation::Del(_)
                | Operation::Incr(_)
                | Operation::Decr(_)
                | Operation::LPush { .. }
                | Operation::RPush { .. }
        )
    }

    /// Runs the command against `store` and builds the reply.
    pub fn execute(&self, store: &mut dyn Store) -> RespValue {
        match &self.operation {
            Operation::Ping(None) => RespValue::pong(),
            Operation::Ping(Some(message)) => RespValue::BulkString(message.clone()),
            Operation::Echo(message) => RespValue::BulkString(message.clone()),

            Operation::Get(key) => match store.read_string(key) {
                Ok(value) => RespValue::BulkString(value),
                Err(StoreError::KeyNotFound) => RespValue::Null,
                Err(e) => error_reply(e),
            },

            Operation::Set(set) => set.execute(store),

            Operation::Del(keys) => {
                let removed = keys.iter().filter(|key| store.delete(key)).count();
                RespValue::Integer(removed as i64)
            }

            Operation::Exists(keys) => {
                let found = keys.iter().filter(|key| store.exists(key)).count();
                RespValue::Integer(found as i64)
            }

            Operation::Incr(key) => integer_reply(store.increment(key.clone(), 1)),
            Operation::Decr(key) => integer_reply(store.increment(key.clone(), -1)),

            Operation::LPush { key, values } => {
                length_reply(store.left_push(key.clone(), values.clone()))
            }
            Operation::RPush { key, values } => {
                length_reply(store.right_push(key.clone(), values.clone()))
            }

            Operation::LRange { key, start, end } => {
                match store.read_list_range(key, *start, *end) {
                    Ok(items) => {
                        RespValue::Array(items.into_iter().map(RespValue::BulkString).collect())
                    }
                    Err(e) => error_reply(e),
                }
            }

            Operation::Config => RespValue::Null,
        }
    }
}

impl SetCommand {
    fn execute(&self, store: &mut dyn Store) -> RespValue {
        let previous = if self.get {
            match store.read_string(&self.key) {
                Ok(value) => Some(value),
                Err(StoreError::KeyNotFound) => None,
                Err(e) => return error_reply(e),
            }
        } else {
            None
        };

        let written = store.write_if(
            self.key.clone(),
            self.value.clone(),
            self.expiry,
            self.condition,
        );

        if self.get {
            RespValue::from(previous)
        } else if written {
            RespValue::ok()
        } else {
            RespValue::Null
        }
    }
}

fn error_reply(error: StoreError) -> RespValue {
    RespValue::error(error.to_string())
}

fn integer_reply(result: Result<i64, StoreError>) -> RespValue {
    result.map_or_else(error_reply, RespValue::Integer)
}

fn length_reply(result: Result<usize, StoreError>) -> RespValue {
    result.map_or_else(error_reply, |len| RespValue::Integer(len as i64))
}

//! Command Layer
//!
//! Sits between the wire and the store: requests come in as decoded frames,
//! get validated into [`Command`] values, and are executed one at a time by
//! the executor.
//!
//! ## Architecture
//!
//! ```text
//! Client Request (RespValue + raw bytes)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandRegistry │  validate: shape, name, arity, options
//! └────────┬────────┘
//!          │ Command { operation, request bytes }
//!          ▼
//! ┌─────────────────┐
//! │    Executor     │  archive (updates only), then execute
//! └────────┬────────┘
//!          │ Command::execute(&mut dyn Store)
//!          ▼
//! ┌─────────────────┐
//! │      Store      │
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`, `ECHO message`
//! - `GET key`
//! - `SET key value [GET] [NX|XX] [EX s|PX ms|EXAT ts|PXAT ts|KEEPTTL]`
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `INCR key`, `DECR key`
//! - `LPUSH key value [value ...]`, `RPUSH key value [value ...]`
//! - `LRANGE key start stop`
//! - `CONFIG ...` (accepted and ignored)
//!
//! `SET`, `DEL`, `INCR`, `DECR`, `LPUSH` and `RPUSH` are updates: they are
//! written to the append-only log before they run.

pub mod command;
pub mod registry;

pub use command::{Command, Operation, SetCommand};
pub use registry::CommandRegistry;

//! # LedgerKV - A Single-Writer In-Memory Key-Value Server
//!
//! LedgerKV speaks the Redis serialization protocol (RESP) and serves a
//! subset of Redis string and list commands. Every store operation runs on
//! one task, in one global order, and every mutation is appended to an
//! append-only log before it is applied, so the log can rebuild the store
//! after a restart.
//!
//! ## Features
//!
//! - **Redis-Compatible**: RESP framing, `redis-cli` works out of the box
//! - **Serializable**: a single executor task owns the store, no locks
//! - **Durable**: update commands are flushed to the log before they run
//! - **TTL Support**: lazy expiry on access plus sampled active expiry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              LedgerKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Registry   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │        one task per client                    │ Command                 │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │   ┌──────────┐      │           Executor (single task)             │    │
//! │   │  Ticker  │─────>│   bounded queue ──> append ──> execute       │    │
//! │   │ (100ms)  │ Scan │                       │           │          │    │
//! │   └──────────┘      └───────────────────────┼───────────┼──────────┘    │
//! │                                             ▼           ▼               │
//! │                                      ┌──────────┐ ┌───────────────┐     │
//! │                                      │ AOF file │ │ InMemoryStore │     │
//! │                                      └──────────┘ │  + tracker    │     │
//! │                                                   └───────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ledgerkv::commands::CommandRegistry;
//! use ledgerkv::connection::ConnectionStats;
//! use ledgerkv::executor::{Executor, ExecutorConfig};
//! use ledgerkv::server::accept_loop;
//! use ledgerkv::storage::{InMemoryStore, SystemClock};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let clock = Arc::new(SystemClock);
//!     let registry = Arc::new(CommandRegistry::new(clock.clone()));
//!     let store = InMemoryStore::new(clock);
//!
//!     let executor = Executor::start(store, tokio::io::sink(), ExecutorConfig::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!     accept_loop(listener, registry, executor.handle(), stats).await;
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frame decoding and encoding
//! - [`storage`]: the keyspace, lists, TTL tracking and the expiry scanner
//! - [`commands`]: request validation and command semantics
//! - [`executor`]: the single-writer task and append-only log replay
//! - [`connection`]: client connection management
//! - [`server`]: the accept loop
//! - [`config`]: command-line configuration
//!
//! ## Design Highlights
//!
//! ### One Writer
//!
//! Connections never touch the store. They submit commands to a bounded
//! queue and wait for the reply; the executor drains the queue in order.
//! Reads and writes from all clients are therefore totally ordered.
//!
//! ### Log Before Apply
//!
//! Relative expiries (`EX`, `PX`) are rewritten to absolute `PXAT` when the
//! request is validated, so replaying the log later reproduces the original
//! deadlines instead of restarting them.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: Every 100ms the executor samples tracked keys and purges
//!    the expired ones, repeating while a large share of the sample was stale

pub mod commands;
pub mod config;
pub mod connection;
pub mod executor;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandRegistry};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use executor::{restore_from_archive, Executor, ExecutorConfig, ExecutorHandle};
pub use protocol::{read_frame, RespValue};
pub use storage::{InMemoryStore, Store, SystemClock};

/// The default port LedgerKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host LedgerKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default location of the append-only log
pub const DEFAULT_AOF_PATH: &str = "redis-aof.log";

/// Version of LedgerKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

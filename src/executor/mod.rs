//! Executor Module
//!
//! Owns the store once the server is running, and rebuilds it from the
//! append-only log before that.
//!
//! ```text
//!   startup                          running
//!   ───────                          ───────
//!   log file ──> restore_from_archive ──> InMemoryStore ──> Executor::start
//!                (direct execution)                          │
//!                                                            ├─ worker task (store + log)
//!                                                            └─ ticker task (RunScan)
//! ```
//!
//! - [`restore`]: replay of the log into a fresh store
//! - [`worker`]: the single-writer task, its queue and the submission handle

pub mod restore;
pub mod worker;

pub use restore::{restore_from_archive, RestoreError, READ_CHUNK_SIZE};
pub use worker::{
    ArchiveWriter, Executor, ExecutorConfig, ExecutorError, ExecutorHandle,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SCAN_INTERVAL,
};

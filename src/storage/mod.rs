//! Storage Module
//!
//! The keyspace and everything that decides when a key stops existing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     InMemoryStore                           │
//! │                                                             │
//! │   HashMap<Bytes, Entry>          ExpiryTracker              │
//! │   ┌──────────────────────┐       ┌───────────────────┐      │
//! │   │ key -> Text | List   │──────>│ keys with a TTL   │      │
//! │   │        expires_at    │       │ (sampling index)  │      │
//! │   └──────────────────────┘       └─────────▲─────────┘      │
//! │              ▲                             │                │
//! │              │ now_millis()                │ select_keys()  │
//! │        ┌─────┴─────┐               ┌───────┴───────┐        │
//! │        │   Clock   │               │ ExpiryScanner │        │
//! │        └───────────┘               └───────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use ledgerkv::storage::{Expiry, FixedClock, InMemoryStore, Store};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(FixedClock::new(1_000));
//! let mut store = InMemoryStore::new(clock.clone());
//!
//! store.write(Bytes::from("session"), Bytes::from("token"), Expiry::Seconds(1));
//! assert!(store.exists(b"session"));
//!
//! clock.advance_secs(1);
//! assert!(!store.exists(b"session"));
//! ```

pub mod clock;
pub mod engine;
pub mod expiry;
pub mod list;
pub mod tracker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{
    Entry, Expiry, InMemoryStore, Store, StoreError, Value, WriteCondition, NEVER_EXPIRES,
};
pub use expiry::{ExpiryScanner, ScannerConfig};
pub use list::DoubleEndedList;
pub use tracker::ExpiryTracker;

#[cfg(test)]
pub(crate) mod testing;

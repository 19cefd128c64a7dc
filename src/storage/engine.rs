//! Key-Value Store with Lazy Expiry
//!
//! The store maps each key to exactly one [`Entry`]: a text value or a
//! [`DoubleEndedList`], plus an absolute expiry in epoch milliseconds.
//!
//! ## Ownership Model
//!
//! ```text
//!   conn 1 ─┐
//!   conn 2 ─┼──> executor queue ──> executor task ──> &mut InMemoryStore
//!   conn N ─┘                          (single owner, no locks)
//! ```
//!
//! There is no internal locking. The store is owned by the executor task
//! (or by the restorer during startup) and every operation takes `&mut self`.
//!
//! ## Expiry
//!
//! An entry whose `expires_at <= now` is logically absent. Any operation that
//! looks the key up removes such an entry on the spot (lazy expiry) and drops
//! it from the [`ExpiryTracker`]. Keys that are never looked at again are
//! reclaimed by the [`ExpiryScanner`](super::ExpiryScanner), which samples the
//! tracker.
//!
//! A key is tracked exactly while its entry has a finite expiry.

use crate::storage::clock::Clock;
use crate::storage::list::DoubleEndedList;
use crate::storage::tracker::ExpiryTracker;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Expiry sentinel for entries without a TTL.
pub const NEVER_EXPIRES: i64 = i64::MAX;

/// Errors returned by [`Store`] operations.
///
/// The messages are the RESP error strings sent to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("ERR no such key")]
    KeyNotFound,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongOperationType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
}

/// How a write sets the key's expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// No TTL.
    Never,
    /// Relative, in seconds (`EX`).
    Seconds(i64),
    /// Relative, in milliseconds (`PX`).
    Millis(i64),
    /// Absolute Unix time in seconds (`EXAT`).
    AtSeconds(i64),
    /// Absolute Unix time in milliseconds (`PXAT`).
    AtMillis(i64),
    /// Keep whatever TTL the live entry had; none if there was no live entry.
    KeepTtl,
}

/// Precondition for [`Store::write_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    Always,
    /// `NX`
    IfAbsent,
    /// `XX`
    IfPresent,
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(Bytes),
    List(DoubleEndedList),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    /// Absolute epoch milliseconds, or [`NEVER_EXPIRES`].
    pub expires_at: i64,
}

impl Entry {
    pub fn new(value: Value, expires_at: i64) -> Self {
        Self { value, expires_at }
    }

    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// The operations commands, the scanner and the restorer need from a store.
pub trait Store: Send {
    /// True if a live entry exists. An expired entry is removed as a side effect.
    fn exists(&mut self, key: &[u8]) -> bool;

    fn read_string(&mut self, key: &[u8]) -> Result<Bytes, StoreError>;

    /// Removes the key. True if a live entry was removed.
    fn delete(&mut self, key: &[u8]) -> bool;

    /// Stores a text value. A computed expiry at or before now makes this a
    /// no-op.
    fn write(&mut self, key: Bytes, value: Bytes, expiry: Expiry);

    /// Checks `condition` and writes in one step. Returns whether the
    /// condition held.
    fn write_if(
        &mut self,
        key: Bytes,
        value: Bytes,
        expiry: Expiry,
        condition: WriteCondition,
    ) -> bool {
        let holds = match condition {
            WriteCondition::Always => true,
            WriteCondition::IfAbsent => !self.exists(&key),
            WriteCondition::IfPresent => self.exists(&key),
        };
        if holds {
            self.write(key, value, expiry);
        }
        holds
    }

    /// Adds `delta` to the integer stored at `key` (missing counts as 0) and
    /// returns the new value. The result is stored without a TTL.
    fn increment(&mut self, key: Bytes, delta: i64) -> Result<i64, StoreError>;

    /// Pushes onto the head; returns the new length.
    fn left_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError>;

    /// Pushes onto the tail; returns the new length.
    fn right_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError>;

    /// Inclusive range with negative indices counted from the tail.
    fn read_list_range(
        &mut self,
        key: &[u8],
        start: i64,
        end: i64,
    ) -> Result<Vec<Bytes>, StoreError>;

    /// Number of stored entries, including expired ones nobody has touched yet.
    fn size(&self) -> usize;

    /// Up to `count` distinct keys that carry a TTL.
    fn select_expiring_keys(&self, count: usize) -> Vec<Bytes>;
}

/// The in-memory [`Store`].
#[derive(Debug)]
pub struct InMemoryStore {
    entries: HashMap<Bytes, Entry>,
    tracker: ExpiryTracker,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
enum End {
    Head,
    Tail,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            tracker: ExpiryTracker::new(),
            clock,
        }
    }

    /// Number of keys currently carrying a TTL.
    pub fn tracked_keys(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_tracked(&self, key: &[u8]) -> bool {
        self.tracker.contains(key)
    }

    /// Raw expiry of the stored entry, expired or not.
    pub fn expires_at(&self, key: &[u8]) -> Option<i64> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    fn purge_if_expired(&mut self, key: &[u8]) {
        let now = self.clock.now_millis();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
            self.tracker.remove_key(key);
        }
    }

    fn live_entry(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.purge_if_expired(key);
        self.entries.get_mut(key)
    }

    fn insert(&mut self, key: Bytes, value: Value, expires_at: i64) {
        if expires_at == NEVER_EXPIRES {
            self.tracker.remove_key(&key);
        } else {
            self.tracker.add_key(&key);
        }
        self.entries.insert(key, Entry::new(value, expires_at));
    }

    fn push(&mut self, key: Bytes, values: Vec<Bytes>, end: End) -> Result<usize, StoreError> {
        self.purge_if_expired(&key);
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Entry::new(Value::List(DoubleEndedList::new()), NEVER_EXPIRES));

        match &mut entry.value {
            Value::List(list) => {
                match end {
                    End::Head => list.push_left(values),
                    End::Tail => list.push_right(values),
                }
                Ok(list.len())
            }
            Value::Text(_) => Err(StoreError::WrongOperationType),
        }
    }
}

impl Store for InMemoryStore {
    fn exists(&mut self, key: &[u8]) -> bool {
        self.live_entry(key).is_some()
    }

    fn read_string(&mut self, key: &[u8]) -> Result<Bytes, StoreError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(text.clone()),
            Some(_) => Err(StoreError::WrongOperationType),
            None => Err(StoreError::KeyNotFound),
        }
    }

    fn delete(&mut self, key: &[u8]) -> bool {
        if !self.exists(key) {
            return false;
        }
        self.entries.remove(key);
        self.tracker.remove_key(key);
        true
    }

    fn write(&mut self, key: Bytes, value: Bytes, expiry: Expiry) {
        let now = self.clock.now_millis();
        let expires_at = match expiry {
            Expiry::Never => NEVER_EXPIRES,
            Expiry::Seconds(secs) => now.saturating_add(secs.saturating_mul(1000)),
            Expiry::Millis(millis) => now.saturating_add(millis),
            Expiry::AtSeconds(ts) => ts.saturating_mul(1000),
            Expiry::AtMillis(ts) => ts,
            Expiry::KeepTtl => self
                .live_entry(&key)
                .map_or(NEVER_EXPIRES, |entry| entry.expires_at),
        };

        if expires_at <= now {
            return;
        }

        self.insert(key, Value::Text(value), expires_at);
    }

    fn increment(&mut self, key: Bytes, delta: i64) -> Result<i64, StoreError> {
        let current = match self.live_entry(&key) {
            None => 0,
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => parse_integer(text)?,
            Some(_) => return Err(StoreError::WrongOperationType),
        };

        let updated = current
            .checked_add(delta)
            .ok_or(StoreError::NotAnInteger)?;

        self.insert(key, Value::Text(Bytes::from(updated.to_string())), NEVER_EXPIRES);
        Ok(updated)
    }

    fn left_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.push(key, values, End::Head)
    }

    fn right_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.push(key, values, End::Tail)
    }

    fn read_list_range(
        &mut self,
        key: &[u8],
        start: i64,
        end: i64,
    ) -> Result<Vec<Bytes>, StoreError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.range(start, end)),
            Some(_) => Err(StoreError::WrongOperationType),
            None => Ok(Vec::new()),
        }
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn select_expiring_keys(&self, count: usize) -> Vec<Bytes> {
        self.tracker.select_keys(count)
    }
}

fn parse_integer(text: &[u8]) -> Result<i64, StoreError> {
    std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(StoreError::NotAnInteger)
}

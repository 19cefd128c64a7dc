//! Store test doubles.

use crate::storage::engine::{Expiry, InMemoryStore, Store, StoreError, WriteCondition};
use bytes::Bytes;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

/// A [`Store`] handle onto an [`InMemoryStore`] that the test keeps a second
/// handle to, so it can inspect state the executor owns.
///
/// Conditional writes can be paused and observed, which lets a test force an
/// exact interleaving between two commands.
pub struct SharedStore {
    inner: Arc<Mutex<InMemoryStore>>,
    reached_write: Option<mpsc::Sender<()>>,
    write_gate: Option<mpsc::Receiver<()>>,
    wrote: Option<mpsc::Sender<()>>,
}

impl SharedStore {
    pub fn new(inner: &Arc<Mutex<InMemoryStore>>) -> Self {
        Self {
            inner: Arc::clone(inner),
            reached_write: None,
            write_gate: None,
            wrote: None,
        }
    }

    /// Signal `tx` when a conditional write is about to happen.
    pub fn signal_on_write(mut self, tx: mpsc::Sender<()>) -> Self {
        self.reached_write = Some(tx);
        self
    }

    /// Block each conditional write until `rx` receives.
    pub fn wait_before_write(mut self, rx: mpsc::Receiver<()>) -> Self {
        self.write_gate = Some(rx);
        self
    }

    /// Signal `tx` once a conditional write is done.
    pub fn signal_after_write(mut self, tx: mpsc::Sender<()>) -> Self {
        self.wrote = Some(tx);
        self
    }

    fn store(&self) -> MutexGuard<'_, InMemoryStore> {
        self.inner.lock().unwrap()
    }
}

impl Store for SharedStore {
    fn exists(&mut self, key: &[u8]) -> bool {
        self.store().exists(key)
    }

    fn read_string(&mut self, key: &[u8]) -> Result<Bytes, StoreError> {
        self.store().read_string(key)
    }

    fn delete(&mut self, key: &[u8]) -> bool {
        self.store().delete(key)
    }

    fn write(&mut self, key: Bytes, value: Bytes, expiry: Expiry) {
        self.store().write(key, value, expiry)
    }

    fn write_if(
        &mut self,
        key: Bytes,
        value: Bytes,
        expiry: Expiry,
        condition: WriteCondition,
    ) -> bool {
        if let Some(reached) = &self.reached_write {
            reached.send(()).unwrap();
        }
        if let Some(gate) = &self.write_gate {
            gate.recv().unwrap();
        }
        let written = self.store().write_if(key, value, expiry, condition);
        if let Some(wrote) = &self.wrote {
            wrote.send(()).unwrap();
        }
        written
    }

    fn increment(&mut self, key: Bytes, delta: i64) -> Result<i64, StoreError> {
        self.store().increment(key, delta)
    }

    fn left_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.store().left_push(key, values)
    }

    fn right_push(&mut self, key: Bytes, values: Vec<Bytes>) -> Result<usize, StoreError> {
        self.store().right_push(key, values)
    }

    fn read_list_range(
        &mut self,
        key: &[u8],
        start: i64,
        end: i64,
    ) -> Result<Vec<Bytes>, StoreError> {
        self.store().read_list_range(key, start, end)
    }

    fn size(&self) -> usize {
        self.store().size()
    }

    fn select_expiring_keys(&self, count: usize) -> Vec<Bytes> {
        self.store().select_expiring_keys(count)
    }
}

//! Active Expiry
//!
//! Lazy expiry only reclaims a key when somebody looks at it. A key that
//! expires and is never read again would stay in memory forever, so the
//! executor periodically runs an [`ExpiryScanner`] pass against the store.
//!
//! ## Algorithm
//!
//! ```text
//! loop:
//!     sample = up to 20 random keys that carry a TTL
//!     expired = how many of them are past their deadline (probing purges them)
//!     if expired < 6: stop       // fewer than 30% stale, not worth another round
//! ```
//!
//! The pass is adaptive without any timers of its own: while a large share of
//! the tracked keys is stale, it keeps going; once the sample comes back mostly
//! live, it yields back to the executor.
//!
//! The scanner is a plain value. It does not own the store and has no task;
//! the executor calls [`ExpiryScanner::scan`] whenever a `RunScan` message
//! reaches the front of its queue.

use crate::storage::engine::Store;
use tracing::trace;

/// Tuning for [`ExpiryScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Keys sampled per round (default: 20)
    pub sample_size: usize,

    /// Another round runs when at least this many sampled keys had expired
    /// (default: 6)
    pub continue_threshold: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sample_size: 20,
            continue_threshold: 6,
        }
    }
}

/// Purges expired keys by random sampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryScanner {
    config: ScannerConfig,
}

impl ExpiryScanner {
    /// A `continue_threshold` of 0 would never stop, so it is raised to 1.
    pub fn new(mut config: ScannerConfig) -> Self {
        config.continue_threshold = config.continue_threshold.max(1);
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Runs sampling rounds until one finds fewer than `continue_threshold`
    /// expired keys. Returns the number of keys purged.
    pub fn scan(&self, store: &mut dyn Store) -> usize {
        let mut purged = 0;
        let mut rounds = 0;

        loop {
            rounds += 1;
            let sample = store.select_expiring_keys(self.config.sample_size);
            let expired = sample.iter().filter(|key| !store.exists(key)).count();
            purged += expired;

            trace!(
                round = rounds,
                sampled = sample.len(),
                expired = expired,
                "Expiry sampling round"
            );

            if expired < self.config.continue_threshold {
                break;
            }
        }

        purged
    }
}

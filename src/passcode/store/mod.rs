//! Pending confirmation codes keyed by address.
//!
//! Two interchangeable strategies sit behind [`CodeStore`]:
//!
//! - [`BoundedUseStore`] expires an entry after a fixed number of lookups. A lookup
//!   that finds no uses left deletes the entry and reports it as missing, so a code
//!   created with a bound of `B` can be read exactly `B` times.
//! - [`ExpiringStore`] expires an entry after a fixed amount of time and never
//!   consumes it on read.
//!
//! [`CodePolicy`] picks one of them from configuration. Both keep their data in a
//! sharded map: operations on the same key are serialized by the shard guard,
//! operations on keys in different shards proceed in parallel.

mod bounded;
mod expiring;

pub use bounded::BoundedUseStore;
pub use expiring::ExpiringStore;

use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::interval};
use tracing::debug;

pub const DEFAULT_CODE_USES: u32 = 3;
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(10 * 60);

pub trait CodeStore: Send + Sync {
    /// Insert or overwrite the pending code for `key` with a fresh budget.
    fn set(&self, key: &str, value: String);

    /// Look the code up, consuming whatever the strategy counts as a use.
    fn get(&self, key: &str) -> Option<String>;

    /// Compare `code` with the pending code and remove the entry on a match.
    ///
    /// Counts as a lookup exactly like [`CodeStore::get`]; the compare and the
    /// removal happen under the same per-key guard, so one code signs in once.
    fn take_if_matches(&self, key: &str, code: &str) -> bool;

    /// Remove the entry for `key`. Idempotent.
    fn delete(&self, key: &str);

    /// Drop entries that can no longer be returned. Returns how many were removed.
    fn evict(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expiry policy for pending codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodePolicy {
    /// Count-bounded: valid for this many lookups.
    Uses {
        uses: u32,
        max_idle: Option<Duration>,
    },
    /// Time-bounded: valid until this much time has passed.
    Ttl(Duration),
}

impl CodePolicy {
    #[must_use]
    pub fn build_store(self) -> Arc<dyn CodeStore> {
        match self {
            Self::Uses { uses, max_idle } => {
                Arc::new(BoundedUseStore::new(uses).with_max_idle(max_idle))
            }
            Self::Ttl(ttl) => Arc::new(ExpiringStore::new(ttl)),
        }
    }

    /// Whether a periodic [`CodeStore::evict`] pass can reclaim anything.
    #[must_use]
    pub fn needs_sweeper(&self) -> bool {
        match self {
            Self::Uses { max_idle, .. } => max_idle.is_some(),
            Self::Ttl(_) => true,
        }
    }
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self::Uses {
            uses: DEFAULT_CODE_USES,
            max_idle: None,
        }
    }
}

/// Spawn a background task that periodically evicts dead entries.
pub fn spawn_sweeper(store: Arc<dyn CodeStore>, every: Duration) -> JoinHandle<()> {
    let every = if every.is_zero() {
        Duration::from_secs(1)
    } else {
        every
    };

    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let removed = store.evict();
            if removed > 0 {
                debug!(removed, remaining = store.len(), "code store sweep");
            }
        }
    })
}

use dashmap::{DashMap, mapref::entry::Entry};
use std::time::Duration;
use tokio::time::Instant;

use super::CodeStore;

#[derive(Debug)]
struct Pending {
    code: String,
    remaining: u32,
    created: Instant,
}

/// Count-bounded code store: entries disappear after `uses` lookups.
///
/// There is no clock-based expiry unless `max_idle` is set, in which case
/// [`CodeStore::evict`] drops entries older than it. Lookups never look at the
/// age, only at the remaining count.
#[derive(Debug)]
pub struct BoundedUseStore {
    entries: DashMap<String, Pending>,
    uses: u32,
    max_idle: Option<Duration>,
}

impl BoundedUseStore {
    #[must_use]
    pub fn new(uses: u32) -> Self {
        Self {
            entries: DashMap::new(),
            uses,
            max_idle: None,
        }
    }

    #[must_use]
    pub fn with_max_idle(mut self, max_idle: Option<Duration>) -> Self {
        self.max_idle = max_idle.filter(|d| !d.is_zero());
        self
    }
}

impl CodeStore for BoundedUseStore {
    fn set(&self, key: &str, value: String) {
        self.entries.insert(
            key.to_string(),
            Pending {
                code: value,
                remaining: self.uses,
                created: Instant::now(),
            },
        );
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.entries.contains_key(key) {
            return None;
        }

        // The shard stays write-locked for the whole decrement-or-remove.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let pending = entry.get_mut();
                if pending.remaining > 0 {
                    pending.remaining -= 1;
                    Some(pending.code.clone())
                } else {
                    entry.remove();
                    None
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    fn take_if_matches(&self, key: &str, code: &str) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let pending = entry.get_mut();
                if pending.remaining == 0 {
                    entry.remove();
                    return false;
                }
                pending.remaining -= 1;
                if pending.code == code {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn evict(&self) -> usize {
        let Some(max_idle) = self.max_idle else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, pending| pending.created.elapsed() < max_idle);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

use dashmap::{DashMap, mapref::entry::Entry};
use std::time::Duration;
use tokio::time::Instant;

use super::CodeStore;

#[derive(Debug)]
struct Pending {
    code: String,
    // `None` when the deadline is beyond what the clock can represent.
    expires_at: Option<Instant>,
}

impl Pending {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Time-bounded code store: entries are readable any number of times until `ttl` passes.
#[derive(Debug)]
pub struct ExpiringStore {
    entries: DashMap<String, Pending>,
    ttl: Duration,
}

impl ExpiringStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl CodeStore for ExpiringStore {
    fn set(&self, key: &str, value: String) {
        self.entries.insert(
            key.to_string(),
            Pending {
                code: value,
                expires_at: Instant::now().checked_add(self.ttl),
            },
        );
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.entries.contains_key(key) {
            return None;
        }

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().is_live(Instant::now()) {
                    Some(entry.get().code.clone())
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
            Entry::Occupied(entry) => {
                if !entry.get().is_live(Instant::now()) {
                    entry.remove();
                    false
                } else if entry.get().code == code {
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
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, pending| pending.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

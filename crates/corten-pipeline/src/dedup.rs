//! Duplicate-message-id detection.
//!
//! Peers retransmit on timeout, so the same message id can legitimately
//! arrive more than once. The guard remembers accepted ids across execution
//! contexts and is bounded both ways: entries older than the retention
//! window are evicted, and the cache never holds more than `max_entries`
//! ids (oldest out first). A retransmission seen after eviction is treated
//! as new, which is the documented trade-off of a bounded window.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// How long an accepted id is remembered, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Hard cap on remembered ids.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_entries() -> usize {
    4096
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_entries: default_max_entries(),
        }
    }
}

/// Concurrent duplicate-id cache. Clones share the same state, so one guard
/// can back every execution context of an endpoint.
#[derive(Clone)]
pub struct DuplicateGuard {
    retention: Duration,
    max_entries: usize,
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    seen: HashMap<String, Instant>,
    /// Insertion order; the front is always the oldest entry.
    order: VecDeque<String>,
}

impl DuplicateGuard {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            retention: Duration::from_secs(config.retention_secs),
            max_entries: config.max_entries,
            inner: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Record a message id. Returns `true` on first sight, `false` for a
    /// retransmission inside the retention window. A retransmission does
    /// not refresh the original entry's clock.
    pub fn first_sight(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        loop {
            let expired = match state.order.front() {
                Some(front) => state
                    .seen
                    .get(front)
                    .is_some_and(|at| now.duration_since(*at) >= self.retention),
                None => break,
            };
            if !expired {
                break;
            }
            if let Some(id) = state.order.pop_front() {
                state.seen.remove(&id);
            }
        }

        if state.seen.contains_key(message_id) {
            return false;
        }
        state.seen.insert(message_id.to_string(), now);
        state.order.push_back(message_id.to_string());
        while state.order.len() > self.max_entries {
            if let Some(id) = state.order.pop_front() {
                state.seen.remove(&id);
            }
        }
        true
    }

    /// Drop a recorded id so the next sight of it reads as new. Rolls back
    /// a registration when the message is rejected after the duplicate
    /// check; only accepted messages stay remembered.
    pub fn forget(&self, message_id: &str) {
        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.seen.remove(message_id).is_some() {
            if let Some(position) = state.order.iter().position(|id| id == message_id) {
                state.order.remove(position);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sight_is_a_duplicate() {
        let guard = DuplicateGuard::new(&DedupConfig::default());
        assert!(guard.first_sight("m-1"));
        assert!(!guard.first_sight("m-1"));
        assert!(guard.first_sight("m-2"));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let config = DedupConfig {
            max_entries: 2,
            ..DedupConfig::default()
        };
        let guard = DuplicateGuard::new(&config);
        assert!(guard.first_sight("m-1"));
        assert!(guard.first_sight("m-2"));
        assert!(guard.first_sight("m-3"));
        assert_eq!(guard.len(), 2);
        // m-1 aged out of the bounded window, so it reads as new again.
        assert!(guard.first_sight("m-1"));
    }

    #[test]
    fn forgotten_id_reads_as_new_again() {
        let guard = DuplicateGuard::new(&DedupConfig::default());
        assert!(guard.first_sight("m-1"));
        guard.forget("m-1");
        assert!(guard.first_sight("m-1"));
        // Unknown ids are a no-op.
        guard.forget("never-seen");
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn zero_retention_forgets_immediately() {
        let config = DedupConfig {
            retention_secs: 0,
            ..DedupConfig::default()
        };
        let guard = DuplicateGuard::new(&config);
        assert!(guard.first_sight("m-1"));
        assert!(guard.first_sight("m-1"));
    }

    #[test]
    fn clones_share_one_cache() {
        let guard = DuplicateGuard::new(&DedupConfig::default());
        let other = guard.clone();
        assert!(guard.first_sight("m-1"));
        assert!(!other.first_sight("m-1"));
    }

    #[test]
    fn concurrent_inserts_count_one_first_sight_per_id() {
        let guard = DuplicateGuard::new(&DedupConfig::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            handles.push(std::thread::spawn(move || {
                let mut firsts = 0;
                for i in 0..100 {
                    if guard.first_sight(&format!("m-{i}")) {
                        firsts += 1;
                    }
                }
                firsts
            }));
        }
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 100 distinct ids, each first-sighted exactly once across threads.
        assert_eq!(total, 100);
        assert_eq!(guard.len(), 100);
    }

    #[test]
    fn config_defaults_deserialize() {
        let config: DedupConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DedupConfig::default());
        assert!(serde_json::from_str::<DedupConfig>(r#"{"retention": 5}"#).is_err());
    }
}

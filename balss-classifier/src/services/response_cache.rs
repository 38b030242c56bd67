//! Bounded response cache keyed by batch signature
//!
//! The whole map is dropped once the clear interval has elapsed; there is no
//! per-entry eviction. When full, new entries are simply not stored.

use crate::models::ClassificationResponse;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source for the clear interval
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock advanced by hand
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Order-independent signature of a batch of raw names
///
/// Hex SHA-256 of the sorted names joined by U+001F.
pub fn signature(items: &[String]) -> String {
    let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for (i, item) in sorted.iter().enumerate() {
        if i > 0 {
            hasher.update("\u{1F}".as_bytes());
        }
        hasher.update(item.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

struct CacheState {
    entries: HashMap<String, ClassificationResponse>,
    last_clear: Instant,
}

pub struct ResponseCache {
    capacity: usize,
    clear_interval: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(capacity: usize, clear_interval: Duration) -> Self {
        Self::with_clock(capacity, clear_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clear_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let last_clear = clock.now();
        Self {
            capacity,
            clear_interval,
            clock,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                last_clear,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Entries are plain data, a poisoned guard is still consistent
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = self.clock.now();
        if now.duration_since(state.last_clear) >= self.clear_interval {
            if !state.entries.is_empty() {
                debug!(entries = state.entries.len(), "Response cache interval elapsed, clearing");
            }
            state.entries.clear();
            state.last_clear = now;
        }
        state
    }

    pub fn get(&self, signature: &str) -> Option<ClassificationResponse> {
        self.lock().entries.get(signature).cloned()
    }

    /// Store a response if there is room
    ///
    /// Returns `false` when the cache is full and the entry was not stored.
    pub fn put(&self, signature: String, response: ClassificationResponse) -> bool {
        let mut state = self.lock();
        if state.entries.contains_key(&signature) {
            state.entries.insert(signature, response);
            return true;
        }
        if state.entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "Response cache full, not storing");
            return false;
        }
        state.entries.insert(signature, response);
        true
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.last_clear = self.clock.now();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

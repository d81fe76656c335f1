//! Keyed in-flight request counters.
//!
//! `acquire` and `release` must be paired; the guard releases on drop so
//! every exit path — including panics and client disconnects — gives the
//! slot back.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

pub struct InflightMap {
    counts: Mutex<HashMap<String, u32>>,
}

impl Default for InflightMap {
    fn default() -> Self {
        Self::new()
    }
}

impl InflightMap {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically check-and-increment. Returns a guard when under `max`.
    pub fn acquire(self: &Arc<Self>, key: &str, max: u32) -> Option<InflightGuard> {
        let mut counts = self.counts.lock();
        let count = counts.entry(key.to_owned()).or_insert(0);
        if *count >= max {
            return None;
        }
        *count += 1;
        Some(InflightGuard {
            map: Arc::clone(self),
            key: key.to_owned(),
        })
    }

    /// Decrement, clamped at zero; the entry is removed when it reaches
    /// zero. Releasing an untracked key is a no-op.
    pub fn release(&self, key: &str) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(key);
            }
        }
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }
}

/// RAII slot held for the duration of one downstream call.
pub struct InflightGuard {
    map: Arc<InflightMap>,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.map.release(&self.key);
    }
}

/*!
 * Object Pool
 * Factory-backed pool with a bounded free-list cache
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Pool statistics snapshot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectPoolStats {
    pub created: u64,
    pub acquired: u64,
    pub released: u64,
    /// Objects dropped because the free list was at `max_cached`
    pub discarded: u64,
}

struct PoolState<T> {
    free: Vec<T>,
    stats: ObjectPoolStats,
}

/// Object pool that recycles values through a bounded free list.
///
/// `acquire` hands out a cached value when one exists and builds a fresh one
/// otherwise; `release` returns a value to the cache or drops it when the
/// cache is full.
pub struct ObjectPool<T> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    state: Mutex<PoolState<T>>,
    max_cached: usize,
}

impl<T> ObjectPool<T> {
    pub fn new(max_cached: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(PoolState { free: Vec::new(), stats: ObjectPoolStats::default() }),
            max_cached,
        }
    }

    /// Pre-build `count` values into the free list, up to `max_cached`
    pub fn reserve(&self, count: usize) {
        let mut state = self.state.lock();
        while state.free.len() < self.max_cached && state.free.len() < count {
            let value = (self.factory)();
            state.stats.created += 1;
            state.free.push(value);
        }
    }

    pub fn acquire(&self) -> T {
        let mut state = self.state.lock();
        state.stats.acquired += 1;
        match state.free.pop() {
            Some(value) => value,
            None => {
                state.stats.created += 1;
                drop(state);
                (self.factory)()
            }
        }
    }

    pub fn release(&self, value: T) {
        let mut state = self.state.lock();
        state.stats.released += 1;
        if state.free.len() < self.max_cached {
            state.free.push(value);
        } else {
            state.stats.discarded += 1;
        }
    }

    pub fn cached(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn stats(&self) -> ObjectPoolStats {
        self.state.lock().stats
    }
}

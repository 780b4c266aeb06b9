//! Bounded in-memory store with selectable eviction and TTL + stale reads

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{SharedClock, SystemClock};

use crate::{
    cache::{Cache, CacheEntry, CacheKey, CacheValue},
    config::EvictionPolicy,
    stats::{SharedStatsCollector, StatsCollector},
    CacheResult, CacheStats,
};

struct Slot<V> {
    entry: CacheEntry<V>,
    /// Insertion order, for FIFO
    inserted: u64,
    /// Last touch order, for LRU (clock instants can tie under a mock clock)
    touched: u64,
}

struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    tick: u64,
}

impl<K, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

pub struct PolicyCache<K, V> {
    capacity: usize,
    policy: EvictionPolicy,
    default_ttl: Option<Duration>,
    max_stale: Duration,
    clock: SharedClock,
    inner: Mutex<Inner<K, V>>,
    stats: SharedStatsCollector,
}

impl<K: CacheKey + 'static, V: CacheValue + 'static> PolicyCache<K, V> {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
            default_ttl: None,
            max_stale: Duration::ZERO,
            clock: SystemClock::shared(),
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                tick: 0,
            }),
            stats: Arc::new(StatsCollector::new()),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_max_stale(mut self, max_stale: Duration) -> Self {
        self.max_stale = max_stale;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop entries that are past the stale window; returns how many
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.slots.len();
        inner
            .slots
            .retain(|_, slot| !slot.entry.is_dead(now, self.max_stale));
        let purged = before - inner.slots.len();
        if purged > 0 {
            self.stats.record_expirations(purged as u64);
        }
        purged
    }

    fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = match ttl {
            Some(ttl) => CacheEntry::with_ttl(value, ttl, now),
            None => CacheEntry::new(value, now),
        };

        let mut inner = self.inner.lock();

        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.capacity {
            let before = inner.slots.len();
            inner
                .slots
                .retain(|_, slot| !slot.entry.is_dead(now, self.max_stale));
            let purged = before - inner.slots.len();
            if purged > 0 {
                self.stats.record_expirations(purged as u64);
            }

            if inner.slots.len() >= self.capacity {
                if let Some(victim) = self.select_victim(&inner.slots) {
                    log::debug!("Evicting {:?} ({} policy)", victim, self.policy);
                    inner.slots.remove(&victim);
                    self.stats.record_eviction();
                }
            }
        }

        let tick = inner.next_tick();
        let inserted = inner
            .slots
            .get(&key)
            .map(|existing| existing.inserted)
            .unwrap_or(tick);
        inner.slots.insert(
            key,
            Slot {
                entry,
                inserted,
                touched: tick,
            },
        );
        self.stats.record_put();
    }

    fn select_victim(&self, slots: &HashMap<K, Slot<V>>) -> Option<K> {
        let victim = match self.policy {
            EvictionPolicy::Lru => slots.iter().min_by_key(|(_, s)| s.touched),
            EvictionPolicy::Lfu => slots
                .iter()
                .min_by_key(|(_, s)| (s.entry.access_count, s.touched)),
            EvictionPolicy::Fifo => slots.iter().min_by_key(|(_, s)| s.inserted),
        };
        victim.map(|(k, _)| k.clone())
    }
}

#[async_trait]
impl<K: CacheKey + 'static, V: CacheValue + 'static> Cache<K, V> for PolicyCache<K, V> {
    async fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        let (expired, dead) = match inner.slots.get(key) {
            Some(slot) => (
                slot.entry.is_expired(now),
                slot.entry.is_dead(now, self.max_stale),
            ),
            None => {
                self.stats.record_miss();
                return Ok(None);
            }
        };

        if dead {
            inner.slots.remove(key);
            self.stats.record_expirations(1);
        }
        if expired {
            self.stats.record_miss();
            return Ok(None);
        }

        let slot = inner.slots.get_mut(key).map(|slot| {
            slot.entry.record_access(now);
            slot.touched = tick;
            slot.entry.value.clone()
        });
        self.stats.record_hit();
        Ok(slot)
    }

    async fn get_stale(&self, key: &K) -> CacheResult<Option<V>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let dead = match inner.slots.get(key) {
            Some(slot) => slot.entry.is_dead(now, self.max_stale),
            None => return Ok(None),
        };
        if dead {
            inner.slots.remove(key);
            self.stats.record_expirations(1);
            return Ok(None);
        }

        let value = inner.slots.get_mut(key).map(|slot| {
            let stale = slot.entry.is_expired(now);
            slot.entry.record_access(now);
            (slot.entry.value.clone(), stale)
        });

        Ok(value.map(|(value, stale)| {
            if stale {
                self.stats.record_stale_hit();
            } else {
                self.stats.record_hit();
            }
            value
        }))
    }

    async fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.insert(key, value, self.default_ttl);
        Ok(())
    }

    async fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.insert(key, value, Some(ttl));
        Ok(())
    }

    async fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        Ok(self
            .inner
            .lock()
            .slots
            .remove(key)
            .map(|slot| slot.entry.value))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.inner.lock().slots.clear();
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.inner.lock().slots.len())
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let len = self.inner.lock().slots.len();
        Ok(self.stats.get_stats(len))
    }
}

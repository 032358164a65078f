//! A bounded concurrent map shared by the parser memoization cache and the
//! operator result cache.
//!
//! Keys are hashed with FNV-1a, folded to 32 bits and taken modulo the shard
//! count. Reads take a shard read lock and bump the entry hit counter atomically;
//! a full LRU would have to write-lock on every read, which this design avoids.
//! Eviction on insert-over-capacity removes the entry with the fewest hits, ties
//! broken by oldest creation time.

mod metrics;

pub use metrics::{delta_report, human_report, one_line, prometheus_report, CacheMetrics};

use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    created: Instant,
    expires: Option<Instant>,
    hits: AtomicU64,
}

impl<V> Entry<V> {
    fn is_stale(&self, now: Instant) -> bool {
        self.expires.map_or(false, |expiry| now >= expiry)
    }
}

/// A sharded cache with TTL expiry and approximate LFU eviction.
pub struct ShardedCache<V: Clone> {
    name: String,
    shards: Vec<RwLock<HashMap<String, Entry<V>>>>,
    shard_capacity: usize,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

/// The default shard count.
pub const DEFAULT_SHARDS: usize = 16;

fn shard_index(key: &str, shards: usize) -> usize {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() as u32 as usize) % shards
}

impl<V: Clone> ShardedCache<V> {
    /// Create a cache with `shards` shards (rounded up to a power of two) holding
    /// `capacity` entries in total.
    pub fn new(name: &str, shards: usize, capacity: usize, default_ttl: Option<Duration>) -> Self {
        let shards = shards.max(1).next_power_of_two();
        let shard_capacity = (capacity / shards).max(1);
        Self {
            name: name.to_string(),
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            shard_capacity,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        let now = Instant::now();

        {
            let guard = shard.read().expect("cache shard lock");
            match guard.get(key) {
                Some(entry) if !entry.is_stale(now) => {
                    entry.hits.fetch_add(1, Ordering::Relaxed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // A stale entry is deleted and counted as both a miss and an eviction.
        let mut guard = shard.write().expect("cache shard lock");
        if guard.get(key).map_or(false, |entry| entry.is_stale(now)) {
            guard.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Option<Duration>) {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        let now = Instant::now();
        let mut guard = shard.write().expect("cache shard lock");

        if !guard.contains_key(key) && guard.len() >= self.shard_capacity {
            let victim = guard
                .iter()
                .min_by_key(|(_, entry)| (entry.hits.load(Ordering::Relaxed), entry.created))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                guard.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        guard.insert(
            key.to_string(),
            Entry {
                value,
                created: now,
                expires: ttl.map(|ttl| now + ttl),
                hits: AtomicU64::new(0),
            },
        );
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delete(&self, key: &str) -> bool {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        shard
            .write()
            .expect("cache shard lock")
            .remove(key)
            .is_some()
    }

    pub fn size(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().expect("cache shard lock").len())
            .sum()
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            name: self.name.clone(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            shard_sizes: self
                .shards
                .iter()
                .map(|shard| shard.read().expect("cache shard lock").len())
                .collect(),
            shard_capacity: self.shard_capacity,
        }
    }

    /// The `limit` most frequently hit keys across all shards.
    pub fn hot_keys(&self, limit: usize) -> Vec<(String, u64)> {
        let mut keys: Vec<(String, u64)> = self
            .shards
            .iter()
            .flat_map(|shard| {
                let guard = shard.read().expect("cache shard lock");
                guard
                    .iter()
                    .map(|(k, entry)| (k.clone(), entry.hits.load(Ordering::Relaxed)))
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        keys.truncate(limit);
        keys
    }
}

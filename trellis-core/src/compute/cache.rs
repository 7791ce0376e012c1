//! Value and Hash Caches
//!
//! Both caches are split into shards, each an LRU list behind its own
//! mutex, so unrelated keys rarely contend. Entries carry a cost and each
//! shard evicts least recently used entries once its share of the limit is
//! exceeded.
//!
//! # At most one compute per digest
//!
//! [`ComputeCache::get_or_compute`] registers an in-flight marker per
//! digest. The first thread to register becomes the leader and computes;
//! later threads block on the marker and receive the leader's result. The
//! leader publishes into the cache *before* removing the marker, so a
//! thread arriving in between finds the value instead of recomputing.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::{Condvar, Mutex};

use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::graph::PlugId;
use crate::hash::Digest;
use crate::value::Value;

struct Shard<K: Hash + Eq, V> {
    entries: LruCache<K, (V, usize)>,
    cost: usize,
    limit: usize,
}

impl<K: Hash + Eq, V> Shard<K, V> {
    fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.cost > self.limit {
            match self.entries.pop_lru() {
                Some((_, (_, cost))) => {
                    self.cost -= cost;
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

/// A cost-bounded LRU map split into independently locked shards.
pub struct ShardedLru<K: Hash + Eq, V> {
    shards: Box<[Mutex<Shard<K, V>>]>,
    hasher: RandomState,
}

impl<K: Hash + Eq, V: Clone> ShardedLru<K, V> {
    pub fn new(shards: usize, limit: usize) -> Self {
        let count = shards.max(1);
        let per_shard = limit.div_ceil(count);
        Self {
            shards: (0..count)
                .map(|_| {
                    Mutex::new(Shard {
                        entries: LruCache::unbounded(),
                        cost: 0,
                        limit: per_shard,
                    })
                })
                .collect(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<Shard<K, V>> {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.shard(key).lock().entries.get(key).map(|(v, _)| v.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).lock().entries.contains(key)
    }

    /// Insert `value`. Returns false if it is too costly to keep at all.
    pub fn insert(&self, key: K, value: V, cost: usize) -> bool {
        let mut shard = self.shard(&key).lock();
        if cost > shard.limit {
            if let Some((_, old_cost)) = shard.entries.pop(&key) {
                shard.cost -= old_cost;
            }
            return false;
        }
        if let Some((_, old_cost)) = shard.entries.put(key, (value, cost)) {
            shard.cost -= old_cost;
        }
        shard.cost += cost;
        let evicted = shard.trim();
        if evicted > 0 {
            tracing::trace!(evicted, "cache shard evicted entries");
        }
        true
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut shard = self.shard(key).lock();
        let (value, cost) = shard.entries.pop(key)?;
        shard.cost -= cost;
        Some(value)
    }

    /// Change the total limit, evicting as needed.
    pub fn set_limit(&self, limit: usize) {
        let per_shard = limit.div_ceil(self.shards.len());
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            shard.limit = per_shard;
            shard.trim();
        }
    }

    pub fn limit(&self) -> usize {
        self.shards.iter().map(|s| s.lock().limit).sum()
    }

    /// Total cost of the entries currently held.
    pub fn cost(&self) -> usize {
        self.shards.iter().map(|s| s.lock().cost).sum()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            shard.entries.clear();
            shard.cost = 0;
        }
    }
}

/// Key of the hash cache. The dirty count retires entries when the plug is
/// dirtied, without having to find and remove them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HashKey {
    pub plug: PlugId,
    pub dirty_count: u64,
    pub context: Digest,
}

struct InFlight {
    result: Mutex<Option<Result<Value>>>,
    ready: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, result: Result<Value>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<Value> {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut guard);
        }
    }
}

/// Publishes a failure to waiters if the leader unwinds without finishing.
struct LeaderGuard<'a> {
    cache: &'a ComputeCache,
    key: Digest,
    flight: Arc<InFlight>,
    finished: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, result: &Result<Value>) {
        self.cache.in_flight.remove(&self.key);
        self.flight.publish(result.clone());
        self.finished = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.in_flight.remove(&self.key);
            self.flight
                .publish(Err(Error::node("computation panicked")));
        }
    }
}

/// Digest to value cache, bounded by memory.
pub struct ComputeCache {
    entries: ShardedLru<Digest, Value>,
    in_flight: DashMap<Digest, Arc<InFlight>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ComputeCache {
    pub fn new(shards: usize, memory_limit: usize) -> Self {
        Self {
            entries: ShardedLru::new(shards, memory_limit),
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lookup(&self, key: Digest) -> Option<Value> {
        let value = self.entries.get(&key);
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// The cached value for `key`, computing it at most once concurrently.
    ///
    /// Failures are handed to the threads waiting at the time but never
    /// stored. Waiters that receive a cancellation caused by the leader's
    /// context retry, unless their own context is cancelled too.
    pub(crate) fn get_or_compute(
        &self,
        key: Digest,
        context: &Context,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        let flight = loop {
            if let Some(value) = self.lookup(key) {
                return Ok(value);
            }
            match self.in_flight.entry(key) {
                Entry::Occupied(e) => {
                    let flight = Arc::clone(e.get());
                    drop(e);
                    match flight.wait() {
                        Err(e) if e.is_cancellation() => {
                            context.check_cancellation()?;
                            continue;
                        }
                        result => return result,
                    }
                }
                Entry::Vacant(e) => {
                    let flight = Arc::new(InFlight::new());
                    e.insert(Arc::clone(&flight));
                    break flight;
                }
            }
        };

        let guard = LeaderGuard {
            cache: self,
            key,
            flight,
            finished: false,
        };

        // Another leader may have finished between our lookup and insert.
        let result = match self.lookup(key) {
            Some(value) => Ok(value),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let result = compute();
                if let Ok(value) = &result {
                    self.entries.insert(key, value.clone(), value.memory_usage());
                }
                result
            }
        };
        guard.finish(&result);
        result
    }

    pub fn get(&self, key: Digest) -> Option<Value> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: Digest) -> bool {
        self.entries.contains(&key)
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.cost()
    }

    pub fn memory_limit(&self) -> usize {
        self.entries.limit()
    }

    pub fn set_memory_limit(&self, bytes: usize) {
        self.entries.set_limit(bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// `(plug, dirty count, context)` to digest cache, bounded by entry count.
pub struct HashCache {
    entries: ShardedLru<HashKey, Digest>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HashCache {
    pub fn new(shards: usize, size_limit: usize) -> Self {
        Self {
            entries: ShardedLru::new(shards, size_limit),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, key: &HashKey) -> Option<Digest> {
        let digest = self.entries.get(key);
        if digest.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        digest
    }

    pub(crate) fn insert(&self, key: HashKey, digest: Digest) {
        self.entries.insert(key, digest, 1);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_limit(&self) -> usize {
        self.entries.limit()
    }

    pub fn set_size_limit(&self, entries: usize) {
        self.entries.set_limit(entries);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub compute_hits: u64,
    pub compute_misses: u64,
    pub compute_entries: usize,
    pub memory_usage: usize,
    pub hash_hits: u64,
    pub hash_misses: u64,
    pub hash_entries: usize,
}

/// The caches used by a graph. Graphs may share one instance.
pub struct Caches {
    pub compute: ComputeCache,
    pub hashes: HashCache,
}

impl Caches {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            compute: ComputeCache::new(config.cache_shards, config.compute_cache_memory_limit),
            hashes: HashCache::new(config.cache_shards, config.hash_cache_size_limit),
        }
    }

    pub fn clear(&self) {
        self.compute.clear();
        self.hashes.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            compute_hits: self.compute.hits(),
            compute_misses: self.compute.misses(),
            compute_entries: self.compute.len(),
            memory_usage: self.compute.memory_usage(),
            hash_hits: self.hashes.hits(),
            hash_misses: self.hashes.misses(),
            hash_entries: self.hashes.len(),
        }
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

//! TTL-bounded decision cache using SIEVE eviction.
//!
//! SIEVE (NSDI 2024) beats LRU on hit rate with O(1) operations and a much
//! simpler implementation:
//!
//! - On access (hit): set the entry's `visited` bit to `true`.
//! - On insert (miss + full): scan from the `hand` position:
//!   - If `visited == true` → reset to `false`, advance hand.
//!   - If `visited == false` → evict this entry, insert the new one here.
//!
//! The cache is a `Vec` circular buffer with a `HashMap` for O(1) lookups.
//! On top of plain SIEVE, every entry records when it was inserted: a read
//! past the ttl behaves as a miss and drops the entry, so a decision can
//! never outlive the staleness window the engine promised. Callers pass
//! `now` explicitly, which keeps expiry deterministic under test.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

// ============================================================================
// Stats
// ============================================================================

/// Running counters for cache effectiveness.
///
/// `misses` includes `expirations`: an expired read is a miss that also
/// removed the stale entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of reads served from cache, in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// SIEVE cache
// ============================================================================

/// A bounded TTL cache using the SIEVE eviction algorithm.
#[derive(Debug)]
pub(crate) struct SieveCache<K, V> {
    /// Circular buffer of cache entries.
    entries: Vec<Option<Entry<K, V>>>,
    /// Maps keys to their index in `entries`.
    index: HashMap<K, usize>,
    /// Current hand position for the SIEVE scan.
    hand: usize,
    /// Maximum number of entries.
    capacity: usize,
    /// Current number of live entries.
    len: usize,
    /// Entries older than this read as misses.
    ttl: Duration,
    stats: CacheStats,
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    visited: bool,
    inserted_at: Instant,
}

impl<K, V> SieveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache with the given capacity and entry lifetime.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        assert!(capacity > 0, "SIEVE cache capacity must be > 0");

        let entries = (0..capacity).map(|_| None).collect();

        Self {
            entries,
            index: HashMap::with_capacity(capacity),
            hand: 0,
            capacity,
            len: 0,
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Returns the value for `key` if it is present and younger than the
    /// ttl, marking it as recently used. An expired entry is removed and
    /// the read counts as a miss.
    pub(crate) fn get(&mut self, key: &K, now: Instant) -> Option<&V> {
        let Some(&idx) = self.index.get(key) else {
            self.stats.misses += 1;
            return None;
        };

        let expired = self.entries[idx]
            .as_ref()
            .is_some_and(|entry| now.duration_since(entry.inserted_at) >= self.ttl);
        if expired {
            self.index.remove(key);
            self.entries[idx] = None;
            self.len -= 1;
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        if let Some(entry) = &mut self.entries[idx] {
            entry.visited = true;
            self.stats.hits += 1;
            Some(&entry.value)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Inserts a key-value pair stamped with `now`, evicting if at capacity.
    /// Overwriting an existing key restarts its ttl.
    pub(crate) fn insert(&mut self, key: K, value: V, now: Instant) {
        // If key already exists, update in place
        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = &mut self.entries[idx] {
                entry.value = value;
                entry.visited = true;
                entry.inserted_at = now;
                return;
            }
        }

        // If not at capacity, find an empty slot
        if self.len < self.capacity {
            for i in 0..self.capacity {
                if self.entries[i].is_none() {
                    self.entries[i] = Some(Entry {
                        key: key.clone(),
                        value,
                        visited: false,
                        inserted_at: now,
                    });
                    self.index.insert(key, i);
                    self.len += 1;
                    return;
                }
            }
        }

        // At capacity: SIEVE eviction scan
        let evict_idx = self.find_eviction_target();
        self.stats.evictions += 1;

        // Remove old entry from index
        if let Some(old_entry) = &self.entries[evict_idx] {
            self.index.remove(&old_entry.key);
        }

        // Insert new entry
        self.entries[evict_idx] = Some(Entry {
            key: key.clone(),
            value,
            visited: false,
            inserted_at: now,
        });
        self.index.insert(key, evict_idx);
    }

    /// Returns the number of entries in the cache.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Counters accumulated since the cache was created.
    pub(crate) fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Scans from `hand` to find an entry with `visited == false`.
    /// Resets `visited` bits along the way.
    fn find_eviction_target(&mut self) -> usize {
        // Bounded loop: at most 2 full scans (first pass resets visited bits,
        // second pass finds a target).
        let max_iterations = self.capacity * 2;

        for _ in 0..max_iterations {
            if let Some(entry) = &mut self.entries[self.hand] {
                if entry.visited {
                    entry.visited = false;
                    self.hand = (self.hand + 1) % self.capacity;
                } else {
                    let target = self.hand;
                    self.hand = (self.hand + 1) % self.capacity;
                    return target;
                }
            } else {
                // Empty slot: claim it directly.
                let target = self.hand;
                self.hand = (self.hand + 1) % self.capacity;
                return target;
            }
        }

        // Fallback: evict at current hand position
        let target = self.hand;
        self.hand = (self.hand + 1) % self.capacity;
        target
    }
}

//! Memoization of intermediate Tutte polynomials, keyed by exact graph fingerprint.
//!
//! The store is a sharded concurrent map with insert-if-absent semantics, so parallel
//! branches that meet the same subgraph at worst compute it twice and store it once.
//!
//! Memory is governed by an approximate byte budget. When an insert finds less than
//! the low watermark available, one thread runs an eviction pass that drops each
//! entry independently with a fixed probability. Everyone else skips caching until
//! the pass finishes. The policy is coarse and global; it is not LRU.

use crate::graph::Fingerprint;
use crate::poly::FactoredPolynomial;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Fixed per-entry overhead charged on top of key and value sizes.
const ENTRY_OVERHEAD: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Cache parameters.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Master switch. A disabled cache misses on every lookup and stores nothing.
    pub enabled: bool,
    /// Graphs with fewer live vertices than this are never probed or stored.
    pub min_vertices: usize,
    /// Approximate byte budget for keys plus values.
    pub budget_bytes: usize,
    /// Evict when fewer than this many budget bytes remain.
    pub low_watermark_bytes: usize,
    /// Probability that an eviction pass drops any given entry.
    pub evict_probability: f64,
    /// Seed for the eviction coin flips.
    pub seed: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let budget_bytes = 512 << 20;
        Self {
            enabled: true,
            min_vertices: 5,
            budget_bytes,
            low_watermark_bytes: budget_bytes / 10,
            evict_probability: 0.5,
            seed: 0x7u64,
        }
    }
}

impl CacheConfig {
    /// A configuration that never caches.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups attempted.
    pub accesses: u64,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries stored.
    pub inserts: u64,
    /// Entries dropped by eviction passes.
    pub evicted: u64,
    /// Eviction passes run.
    pub eviction_passes: u64,
    /// Entries currently held.
    pub entries: usize,
    /// Estimated bytes currently held.
    pub used_bytes: usize,
}

// ============================================================================
// MemoCache
// ============================================================================

/// Concurrent fingerprint → polynomial store with probabilistic eviction.
pub struct MemoCache {
    config: CacheConfig,
    map: DashMap<Fingerprint, FactoredPolynomial>,
    used_bytes: AtomicUsize,
    evicting: AtomicBool,
    rng: Mutex<SmallRng>,
    accesses: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evicted: AtomicU64,
    eviction_passes: AtomicU64,
}

impl Default for MemoCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn entry_size(key: &Fingerprint, value: &FactoredPolynomial) -> usize {
    key.size_bytes() + value.size_bytes() + ENTRY_OVERHEAD
}

impl MemoCache {
    /// Creates an empty cache.
    ///
    /// # Panics
    /// Panics if `config.evict_probability` is NaN.
    pub fn new(config: CacheConfig) -> Self {
        assert!(
            !config.evict_probability.is_nan(),
            "cache eviction probability must be a number"
        );
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            map: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            evicting: AtomicBool::new(false),
            rng: Mutex::new(rng),
            accesses: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            eviction_passes: AtomicU64::new(0),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns `true` if graphs with `live_vertices` live vertices are worth caching.
    #[inline]
    pub fn admits(&self, live_vertices: usize) -> bool {
        self.config.enabled && live_vertices >= self.config.min_vertices
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Budget bytes not yet charged to entries.
    pub fn available_bytes(&self) -> usize {
        self.config
            .budget_bytes
            .saturating_sub(self.used_bytes.load(Ordering::Relaxed))
    }

    /// Looks up a polynomial. The returned value shares factors with the stored one.
    pub fn get(&self, key: &Fingerprint) -> Option<FactoredPolynomial> {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        let found = if self.config.enabled {
            self.map.get(key).map(|entry| entry.value().clone())
        } else {
            None
        };
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores `value` under `key` unless an entry already exists.
    ///
    /// Returns `true` if the value was stored. Storing is skipped while another thread
    /// is evicting, or if memory stays low after an eviction pass.
    pub fn add(&self, key: Fingerprint, value: &FactoredPolynomial) -> bool {
        if !self.config.enabled || self.evicting.load(Ordering::Acquire) {
            return false;
        }

        if self.available_bytes() < self.config.low_watermark_bytes {
            if self
                .evicting
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return false;
            }
            self.evict();
            self.evicting.store(false, Ordering::Release);

            if self.available_bytes() < self.config.low_watermark_bytes {
                warn!(
                    available = self.available_bytes(),
                    watermark = self.config.low_watermark_bytes,
                    "cache still short of memory after eviction; skipping insert"
                );
                return false;
            }
        }

        match self.map.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                // Charged under the shard lock, before eviction can see the entry.
                let size = entry_size(slot.key(), value);
                self.used_bytes.fetch_add(size, Ordering::Relaxed);
                slot.insert(value.clone());
                self.inserts.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    /// Drops each entry with the configured probability, then releases map storage.
    fn evict(&self) {
        let before = self.map.len();
        let mut freed = 0usize;
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let p = self.config.evict_probability.clamp(0.0, 1.0);
            self.map.retain(|key, value| {
                if rng.random_bool(p) {
                    freed += entry_size(key, value);
                    false
                } else {
                    true
                }
            });
        }
        self.map.shrink_to_fit();
        self.used_bytes.fetch_sub(freed, Ordering::Relaxed);

        let dropped = before.saturating_sub(self.map.len());
        self.evicted.fetch_add(dropped as u64, Ordering::Relaxed);
        self.eviction_passes.fetch_add(1, Ordering::Relaxed);
        info!(
            dropped,
            remaining = self.map.len(),
            freed_bytes = freed,
            "cache eviction pass"
        );
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&self) {
        self.map.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            accesses: self.accesses.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            eviction_passes: self.eviction_passes.load(Ordering::Relaxed),
            entries: self.map.len(),
            used_bytes: self.used_bytes.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Multigraph;
    use rayon::prelude::*;

    fn key(edges: &[(usize, usize)]) -> Fingerprint {
        let g: Multigraph = Multigraph::from_edges(edges.iter().copied());
        g.fingerprint()
    }

    fn path_key(n: usize) -> Fingerprint {
        let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, i + 1)).collect();
        key(&edges)
    }

    #[test]
    fn hit_after_insert_and_first_write_wins() {
        let cache = MemoCache::default();
        let k = key(&[(0, 1), (1, 2), (2, 0)]);
        assert_eq!(cache.get(&k), None);

        assert!(cache.add(k.clone(), &FactoredPolynomial::x(2)));
        assert!(!cache.add(k.clone(), &FactoredPolynomial::y(5)));
        assert_eq!(cache.get(&k), Some(FactoredPolynomial::x(2)));

        let s = cache.stats();
        assert_eq!((s.accesses, s.hits, s.misses, s.inserts), (2, 1, 1, 1));
        assert_eq!(s.entries, 1);
        assert!(s.used_bytes > 0);
    }

    #[test]
    fn disabled_cache_always_misses() {
        let cache = MemoCache::new(CacheConfig::disabled());
        let k = key(&[(0, 1)]);
        assert!(!cache.add(k.clone(), &FactoredPolynomial::one()));
        assert_eq!(cache.get(&k), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
        assert!(!cache.admits(100));
    }

    #[test]
    fn admission_threshold() {
        let cache = MemoCache::default();
        assert!(!cache.admits(4));
        assert!(cache.admits(5));
    }

    /// One bundle of multiplicity `m` on three vertices: equal-sized, distinct keys.
    fn bundle_key(m: u32) -> Fingerprint {
        let mut g = Multigraph::new(3);
        g.add_edge(0, 1, m).unwrap();
        g.fingerprint()
    }

    #[test]
    fn pressure_triggers_eviction_passes() {
        let probe = entry_size(&bundle_key(1), &FactoredPolynomial::one());
        let cache = MemoCache::new(CacheConfig {
            budget_bytes: probe * 20,
            low_watermark_bytes: probe * 4,
            evict_probability: 1.0,
            ..CacheConfig::default()
        });

        for m in 1..=200 {
            assert!(cache.add(bundle_key(m), &FactoredPolynomial::one()));
            assert!(cache.stats().used_bytes <= probe * 20);
        }
        let s = cache.stats();
        assert_eq!(s.inserts, 200);
        assert!(s.eviction_passes >= 10, "{s:?}");
        assert_eq!(s.evicted as usize + s.entries, 200);
    }

    #[test]
    #[should_panic(expected = "eviction probability")]
    fn nan_eviction_probability_is_rejected() {
        let _ = MemoCache::new(CacheConfig {
            evict_probability: f64::NAN,
            ..CacheConfig::default()
        });
    }

    #[test]
    fn byte_accounting_survives_concurrent_eviction() {
        let probe = entry_size(&bundle_key(1), &FactoredPolynomial::one());
        let cache = MemoCache::new(CacheConfig {
            budget_bytes: probe * 20,
            low_watermark_bytes: probe * 4,
            ..CacheConfig::default()
        });
        (1..=250u32).into_par_iter().for_each(|m| {
            let _ = cache.add(bundle_key(m), &FactoredPolynomial::one());
        });
        let s = cache.stats();
        assert!(s.eviction_passes > 0, "{s:?}");
        assert_eq!(s.used_bytes, s.entries * probe);
        assert!(s.used_bytes <= probe * 20 + probe * rayon::current_num_threads());
    }

    #[test]
    fn concurrent_inserts_store_each_key_once() {
        let cache = MemoCache::default();
        (0..256usize).into_par_iter().for_each(|i| {
            let _ = cache.add(path_key(i % 16 + 1), &FactoredPolynomial::x((i % 16) as u32));
        });
        let s = cache.stats();
        assert_eq!(s.entries, 16);
        assert_eq!(s.inserts, 16);
        for n in 1..=16 {
            let got = cache.get(&path_key(n)).unwrap();
            assert_eq!(got, FactoredPolynomial::x((n - 1) as u32));
        }
    }
}

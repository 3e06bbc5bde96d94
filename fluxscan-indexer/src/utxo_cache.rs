//! The cross-batch UTXO cache.
//!
//! The analytics store's asynchronous insert path gives only eventual
//! read-visibility, so a UTXO created in batch A and spent in batch A+1
//! may not be queryable at spend time. This cache exists solely to bridge
//! that gap: it is consulted after the current batch's output map and
//! before the store, and it is owned exclusively by the indexer worker.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fluxscan_chain::transparent::OutPoint;
use tracing::debug;

/// The resolved attributes of one unspent output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UtxoEntry {
    /// Display address, or the store's sentinel for outputs that pay no
    /// transparent address.
    pub address: String,
    pub value: i64,
    /// Hex script, empty for reconstructible standard types.
    pub script_pubkey: String,
    pub script_type: String,
    pub block_height: u32,
}

struct CachedUtxo {
    entry: UtxoEntry,
    inserted_at: Instant,
}

/// A bounded outpoint-to-UTXO map with age- and capacity-based eviction.
pub struct UtxoCache {
    entries: HashMap<OutPoint, CachedUtxo>,
    /// Soft capacity; eviction keeps the map at or under this.
    cap: usize,
    /// Entries older than this are expendable once the map is nearly full.
    max_age: Duration,
    hits: u64,
    misses: u64,
}

/// Fill fraction at which age-based eviction starts running.
const EVICTION_THRESHOLD: f64 = 0.9;

impl UtxoCache {
    /// The default soft capacity.
    pub const DEFAULT_CAP: usize = 500_000;

    /// The default maximum entry age.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

    pub fn new() -> Self {
        Self::with_settings(Self::DEFAULT_CAP, Self::DEFAULT_MAX_AGE)
    }

    pub fn with_settings(cap: usize, max_age: Duration) -> Self {
        UtxoCache {
            entries: HashMap::new(),
            cap,
            max_age,
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    pub fn get(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        match self.entries.get(outpoint) {
            Some(cached) => {
                self.hits += 1;
                Some(cached.entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Remove a spent entry immediately.
    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.entries.remove(outpoint).map(|cached| cached.entry)
    }

    pub fn insert(&mut self, outpoint: OutPoint, entry: UtxoEntry) {
        self.insert_at(outpoint, entry, Instant::now())
    }

    fn insert_at(&mut self, outpoint: OutPoint, entry: UtxoEntry, now: Instant) {
        if self.entries.len() + 1 >= (self.cap as f64 * EVICTION_THRESHOLD) as usize {
            self.evict(now);
        }
        self.entries.insert(
            outpoint,
            CachedUtxo {
                entry,
                inserted_at: now,
            },
        );
    }

    /// Age-based eviction, then oldest-first eviction down to the cap.
    fn evict(&mut self, now: Instant) {
        let before = self.entries.len();
        let max_age = self.max_age;
        self.entries
            .retain(|_, cached| now.duration_since(cached.inserted_at) < max_age);

        if self.entries.len() >= self.cap {
            let mut by_age: Vec<(OutPoint, Instant)> = self
                .entries
                .iter()
                .map(|(outpoint, cached)| (*outpoint, cached.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

            let excess = self.entries.len() + 1 - self.cap;
            for (outpoint, _) in by_age.into_iter().take(excess) {
                self.entries.remove(&outpoint);
            }
        }

        if before != self.entries.len() {
            debug!(
                evicted = before - self.entries.len(),
                remaining = self.entries.len(),
                "utxo cache eviction"
            );
        }
    }

    /// Drop everything. Required after a reorg: entries above the fork
    /// would resurrect invalidated outputs.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Publish size and hit-rate gauges.
    pub fn record_metrics(&self) {
        metrics::gauge!("indexer.utxo_cache.entries", self.len() as f64);
        metrics::gauge!("indexer.utxo_cache.hit_rate", self.hit_rate());
    }
}

impl Default for UtxoCache {
    fn default() -> Self {
        Self::new()
    }
}

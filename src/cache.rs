//! Caller-owned caches for work shared across analysis calls
//!
//! Nothing here is global: a batch run creates a cache, passes it to the
//! calls that want it and drops it afterwards.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::RwLock;

use crate::{Result, SignalError, TickSeries, WindowAggregator, WindowBucket};

#[derive(Debug)]
struct Entry<V> {
    inserted: Instant,
    value: V,
}

impl<V> Entry<V> {
    fn expired(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() >= ttl
    }
}

/// Read-mostly map with per-entry expiry and a size bound.
///
/// Expired entries are dropped when read; once full, inserting a new key
/// evicts the oldest entry.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(SignalError::InvalidConfig(
                "cache must hold at least one entry".into(),
            ));
        }
        Ok(Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.expired(self.ttl) => return Some(entry.value.clone()),
                Some(_) => {},
            }
        }
        let mut entries = self.entries.write();
        // Another writer may have refreshed it in between
        if entries.get(key).is_some_and(|e| e.expired(self.ttl)) {
            entries.remove(key);
        }
        entries
            .get(key)
            .filter(|e| !e.expired(self.ttl))
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| !e.expired(ttl));
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                inserted: Instant::now(),
                value,
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key).map(|e| e.value)
    }

    /// Drop every expired entry, returning how many went.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| !e.expired(ttl));
        before - entries.len()
    }

    /// Stored entries, expired ones included until they are read or purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Identifies one session's buckets. Bucket size is part of the key so
/// engines with different window sizes can share a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub instrument: String,
    pub day: String,
    pub size: usize,
}

/// Window buckets keyed by (instrument, day)
#[derive(Debug)]
pub struct BucketCache {
    inner: TtlCache<BucketKey, Arc<[WindowBucket]>>,
}

impl BucketCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Result<Self> {
        Ok(Self {
            inner: TtlCache::new(ttl, max_entries)?,
        })
    }

    /// Cached buckets for `(instrument, day)`, computed from `series` on a miss.
    pub fn get_or_compute(
        &self,
        instrument: &str,
        day: &str,
        series: &TickSeries,
        aggregator: WindowAggregator,
    ) -> Arc<[WindowBucket]> {
        let key = BucketKey {
            instrument: instrument.to_string(),
            day: day.to_string(),
            size: aggregator.size.get(),
        };
        if let Some(hit) = self.inner.get(&key) {
            return hit;
        }
        tracing::trace!(instrument, day, "bucket cache miss");
        let buckets: Arc<[WindowBucket]> = aggregator.buckets(series).into();
        self.inner.insert(key, Arc::clone(&buckets));
        buckets
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

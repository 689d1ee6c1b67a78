//! Bounded ETag store with batched least-recently-used eviction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Default configuration values.
pub mod defaults {
    /// Default number of entries the cache holds.
    pub const MAX_SIZE: usize = 500;

    /// Default fill fraction at which eviction starts.
    pub const EVICTION_THRESHOLD: f64 = 0.8;

    /// Default fraction of entries removed per eviction pass.
    pub const EVICTION_RATIO: f64 = 0.2;
}

/// Invalid cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheConfigError {
    #[error("max_size must be greater than zero")]
    ZeroCapacity,
    #[error("eviction_threshold must be in (0, 1]")]
    InvalidThreshold,
    #[error("eviction_ratio must be in (0, 1]")]
    InvalidRatio,
}

/// Capacity and eviction settings for an [`ETagCache`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ETagCacheConfig {
    /// Maximum number of entries.
    pub max_size: usize,
    /// Fraction of `max_size` at which an eviction pass runs before a write.
    pub eviction_threshold: f64,
    /// Fraction of current entries removed by one eviction pass.
    pub eviction_ratio: f64,
}

impl Default for ETagCacheConfig {
    fn default() -> Self {
        Self {
            max_size: defaults::MAX_SIZE,
            eviction_threshold: defaults::EVICTION_THRESHOLD,
            eviction_ratio: defaults::EVICTION_RATIO,
        }
    }
}

impl ETagCacheConfig {
    /// Default thresholds with the given capacity.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    /// Set the eviction threshold.
    pub fn eviction_threshold(mut self, threshold: f64) -> Self {
        self.eviction_threshold = threshold;
        self
    }

    /// Set the eviction ratio.
    pub fn eviction_ratio(mut self, ratio: f64) -> Self {
        self.eviction_ratio = ratio;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_size == 0 {
            return Err(CacheConfigError::ZeroCapacity);
        }
        if !(self.eviction_threshold > 0.0 && self.eviction_threshold <= 1.0) {
            return Err(CacheConfigError::InvalidThreshold);
        }
        if !(self.eviction_ratio > 0.0 && self.eviction_ratio <= 1.0) {
            return Err(CacheConfigError::InvalidRatio);
        }
        Ok(())
    }

    /// Entry count at which an eviction pass runs.
    pub fn threshold_count(&self) -> usize {
        (self.max_size as f64 * self.eviction_threshold).floor() as usize
    }
}

/// Point-in-time cache metrics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheStats {
    /// Current number of entries.
    pub count: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// `count / max_size`.
    pub usage_ratio: f64,
    /// Total entries removed by eviction since creation.
    pub evicted: u64,
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    last_accessed_at: Instant,
    /// Monotonic access order; breaks ties between equal instants.
    sequence: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    clock: u64,
    evicted: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// A bounded URL → ETag store.
///
/// All operations serialize on one lock, so an eviction scan and the write
/// that triggered it are atomic with respect to concurrent lookups.
///
/// # Example
///
/// ```
/// use netkit_client::{ETagCache, ETagCacheConfig};
///
/// let cache = ETagCache::new(ETagCacheConfig::with_max_size(100)).unwrap();
/// cache.set("https://api.example.com/items", "\"v1\"");
/// assert_eq!(cache.get("https://api.example.com/items").as_deref(), Some("\"v1\""));
/// ```
#[derive(Debug)]
pub struct ETagCache {
    config: ETagCacheConfig,
    state: Mutex<State>,
}

impl Default for ETagCache {
    fn default() -> Self {
        Self {
            config: ETagCacheConfig::default(),
            state: Mutex::new(State::default()),
        }
    }
}

impl ETagCache {
    /// Create a cache with a validated configuration.
    pub fn new(config: ETagCacheConfig) -> Result<Self, CacheConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(State::default()),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ETagCacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every operation leaves the map consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the ETag for `key`, marking it as recently used.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut state = self.lock();
        let sequence = state.tick();
        let entry = state.entries.get_mut(key)?;
        entry.last_accessed_at = Instant::now();
        entry.sequence = sequence;
        Some(entry.value.clone())
    }

    /// Look up the ETag for `key` without affecting recency.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// When `key` was last read or written.
    pub fn last_accessed_at(&self, key: &str) -> Option<Instant> {
        self.lock().entries.get(key).map(|entry| entry.last_accessed_at)
    }

    /// Store `value` for `key`, evicting old entries first if the cache is
    /// at or above its eviction threshold.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let mut state = self.lock();

        let evicted = self.evict(&mut state, &key);
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = state.entries.len(),
                max_size = self.config.max_size,
                "evicted least recently used etags"
            );
        }

        let sequence = state.tick();
        state.entries.insert(
            key,
            Entry {
                value: value.into(),
                last_accessed_at: Instant::now(),
                sequence,
            },
        );
    }

    /// Remove the least recently used entries ahead of a write for `key`.
    ///
    /// Removes `floor(n * eviction_ratio)` entries once `n` reaches the
    /// threshold, and never fewer than needed to keep `n <= max_size` after
    /// the write.
    fn evict(&self, state: &mut State, key: &str) -> usize {
        let count = state.entries.len();
        if count < self.config.threshold_count() {
            return 0;
        }

        let batch = (count as f64 * self.config.eviction_ratio).floor() as usize;
        let overflow = if state.entries.contains_key(key) {
            0
        } else {
            (count + 1).saturating_sub(self.config.max_size)
        };
        let to_remove = batch.max(overflow).min(count);
        if to_remove == 0 {
            return 0;
        }

        let mut by_age: Vec<(Instant, u64, String)> = state
            .entries
            .iter()
            .map(|(k, e)| (e.last_accessed_at, e.sequence, k.clone()))
            .collect();
        by_age.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (_, _, stale) in by_age.into_iter().take(to_remove) {
            state.entries.remove(&stale);
        }
        state.evicted += to_remove as u64;
        to_remove
    }

    /// Remove the entry for `key`, returning its ETag.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// `len / max_size`.
    pub fn usage_ratio(&self) -> f64 {
        self.len() as f64 / self.config.max_size as f64
    }

    /// Snapshot of the cache metrics.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let count = state.entries.len();
        CacheStats {
            count,
            max_size: self.config.max_size,
            usage_ratio: count as f64 / self.config.max_size as f64,
            evicted: state.evicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(max_size: usize, threshold: f64, ratio: f64) -> ETagCache {
        ETagCache::new(
            ETagCacheConfig::with_max_size(max_size)
                .eviction_threshold(threshold)
                .eviction_ratio(ratio),
        )
        .unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = ETagCacheConfig::default();
        assert_eq!(config.max_size, 500);
        assert!((config.eviction_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.eviction_ratio - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.threshold_count(), 400);
    }

    #[test]
    fn test_config_validate() {
        assert_eq!(
            ETagCacheConfig::with_max_size(0).validate(),
            Err(CacheConfigError::ZeroCapacity)
        );
        assert_eq!(
            ETagCacheConfig::default().eviction_threshold(0.0).validate(),
            Err(CacheConfigError::InvalidThreshold)
        );
        assert_eq!(
            ETagCacheConfig::default().eviction_ratio(1.5).validate(),
            Err(CacheConfigError::InvalidRatio)
        );
        assert!(ETagCache::new(ETagCacheConfig::with_max_size(0)).is_err());
    }

    #[test]
    fn test_get_set_remove_clear() {
        let cache = ETagCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        cache.set("a", "\"1\"");
        cache.set("b", "\"2\"");
        assert_eq!(cache.get("a").as_deref(), Some("\"1\""));
        assert_eq!(cache.len(), 2);

        cache.set("a", "\"3\"");
        assert_eq!(cache.peek("a").as_deref(), Some("\"3\""));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.remove("a").as_deref(), Some("\"3\""));
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_bumps_recency() {
        let cache = ETagCache::default();
        cache.set("a", "1");
        let written = cache.last_accessed_at("a").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.get("a");
        assert!(cache.last_accessed_at("a").unwrap() > written);
    }

    #[test]
    fn test_peek_does_not_bump_recency() {
        let cache = cache(3, 0.5, 0.5);
        cache.set("a", "1");
        cache.set("b", "2");
        cache.peek("a");
        // 2 >= floor(1.5): evicts floor(2 * 0.5) = 1, still "a".
        cache.set("c", "3");
        assert_eq!(cache.peek("a"), None);
        assert!(cache.peek("b").is_some());
    }

    #[test]
    fn test_eviction_bound() {
        let cache = cache(50, 0.8, 0.2);
        for i in 0..150 {
            cache.set(format!("https://x/{}", i), "v");
            assert!(cache.len() <= 50, "len {} after {} inserts", cache.len(), i + 1);
        }
        assert!(cache.stats().evicted > 0);
    }

    #[test]
    fn test_eviction_bound_small_capacity() {
        // floor(n * ratio) is 0 here; the overflow floor still keeps the bound.
        let cache = cache(3, 0.8, 0.2);
        for i in 0..9 {
            cache.set(i.to_string(), "v");
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn test_lru_evicts_least_recently_accessed() {
        let cache = cache(3, 0.8, 0.2);
        cache.set("A", "a");
        cache.set("B", "b");
        cache.set("C", "c");
        cache.get("A");
        cache.get("B");

        cache.set("D", "d");

        assert_eq!(cache.len(), 3);
        assert!(cache.peek("C").is_none());
        assert!(cache.peek("A").is_some());
        assert!(cache.peek("B").is_some());
        assert!(cache.peek("D").is_some());
    }

    #[test]
    fn test_threshold_triggers_batch_eviction() {
        let cache = cache(10, 0.8, 0.2);
        for i in 0..8 {
            cache.set(format!("k{}", i), "v");
        }
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.stats().evicted, 0);

        // 8 >= floor(10 * 0.8): floor(8 * 0.2) = 1 entry goes first.
        cache.set("k8", "v");
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.stats().evicted, 1);
        assert!(cache.peek("k0").is_none());
        assert!(cache.peek("k1").is_some());
    }

    #[test]
    fn test_overwrite_at_capacity_keeps_other_entries() {
        let cache = cache(2, 1.0, 0.5);
        cache.set("a", "1");
        cache.set("b", "2");
        // 2 >= 2: evicts floor(2 * 0.5) = 1, the oldest ("a"), then rewrites "b".
        cache.set("b", "3");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("b").as_deref(), Some("3"));
    }

    #[test]
    fn test_usage_ratio_and_stats() {
        let cache = cache(4, 1.0, 0.5);
        cache.set("a", "1");
        assert!((cache.usage_ratio() - 0.25).abs() < f64::EPSILON);
        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max_size, 4);
    }

    #[test]
    fn test_concurrent_writers_respect_bound() {
        let cache = Arc::new(cache(64, 0.8, 0.2));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("https://x/{}/{}", t, i);
                        cache.set(key.clone(), "v");
                        cache.get(&key);
                        assert!(cache.len() <= 64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}

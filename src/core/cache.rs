//! Bounded in-memory cache with per-entry TTL.
//!
//! Expired entries are purged lazily on `get`. When a `set` finds the store
//! full, the oldest tenth of the entries (by insertion, at least one) is
//! evicted first.

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::types::GenerationRequest;

pub const GEOCODE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const FORECAST_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const GENERATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const WEATHER_CACHE_SIZE: usize = 500;
pub const GENERATION_CACHE_SIZE: usize = 200;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    /// Insertion order; breaks ties between entries created in the same instant.
    sequence: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Store<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_sequence: u64,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Hits as a percentage of all lookups
    pub hit_rate: f64,
}

#[derive(Debug)]
pub struct ResponseCache<V> {
    name: &'static str,
    store: Mutex<Store<V>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(name: &'static str, max_size: usize) -> Self {
        Self {
            name,
            store: Mutex::new(Store {
                entries: HashMap::new(),
                next_sequence: 0,
            }),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut store = self.store.lock();

        let expired = match store.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            store.entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(target: "planner::cache", cache = self.name, key, "cache entry expired");
            return None;
        }

        let entry = store.entries.get(key)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "planner::cache",
            cache = self.name,
            key,
            age_secs = now.duration_since(entry.created_at).as_secs_f64(),
            "cache hit"
        );
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut store = self.store.lock();

        if store.entries.len() >= self.max_size && !store.entries.contains_key(&key) {
            self.evict_oldest(&mut store);
        }

        let sequence = store.next_sequence;
        store.next_sequence += 1;
        debug!(
            target: "planner::cache",
            cache = self.name,
            key = key.as_str(),
            ttl_secs = ttl.as_secs(),
            "cache set"
        );
        store.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                sequence,
            },
        );
    }

    fn evict_oldest(&self, store: &mut Store<V>) {
        let mut by_age: Vec<(Instant, u64, String)> = store
            .entries
            .iter()
            .map(|(key, entry)| (entry.created_at, entry.sequence, key.clone()))
            .collect();
        by_age.sort();

        let evict_count = (by_age.len() / 10).max(1);
        for (_, _, key) in by_age.into_iter().take(evict_count) {
            debug!(target: "planner::cache", cache = self.name, key = key.as_str(), "cache evicted");
            store.entries.remove(&key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> usize {
        let mut store = self.store.lock();
        let count = store.entries.len();
        store.entries.clear();
        info!(target: "planner::cache", cache = self.name, count, "cache cleared");
        count
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            hits as f64 / total_requests as f64 * 100.0
        };

        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            hits,
            misses,
            total_requests,
            hit_rate,
        }
    }
}

fn hashed_key(prefix: &str, canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{}:{:x}", prefix, hasher.finalize())
}

/// Key for a generation request.
///
/// Destination case, interest order and duplicate interests do not change the
/// key; duration, budget, currency and whether weather context was supplied do.
pub fn generation_key(request: &GenerationRequest, has_weather: bool) -> String {
    let mut interests: Vec<String> = request
        .interests()
        .iter()
        .map(|interest| interest.to_lowercase())
        .collect();
    interests.sort();
    interests.dedup();

    let canonical = serde_json::json!({
        "destination": request.destination().to_lowercase(),
        "duration": request.duration_days(),
        "budget": format!("{:.2}", request.budget()),
        "currency": request.currency(),
        "interests": interests,
        "weather": has_weather,
    });
    hashed_key("itinerary", &canonical.to_string())
}

pub fn geocode_key(destination: &str) -> String {
    format!("geocode:{}", destination.trim().to_lowercase())
}

pub fn forecast_key(latitude: f64, longitude: f64, start: &str, days: u32) -> String {
    format!("forecast:{latitude:.3},{longitude:.3}:{start}:{days}")
}

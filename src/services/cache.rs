use chrono::{DateTime, Utc};
use moka::Expiry;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::compatibility::normalize_tag;
use crate::models::{DiscoveryQuery, RankedRestaurant};

/// Upper bound on a single entry's lifetime
const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Redis key prefix for mirrored result sets
const REDIS_PREFIX: &str = "discover:";

/// Errors that can occur with the Redis mirror
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A cached result set with its lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub results: Vec<RankedRestaurant>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(results: Vec<RankedRestaurant>, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl.min(MAX_TTL))
            .unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            results,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Expiry is inclusive: an entry is gone at `expires_at`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Per-entry expiry so moka reclaims space at each entry's own deadline
struct EntryExpiry;

impl Expiry<String, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining_ttl(Utc::now()))
    }

    // Replacing an entry restarts its clock from the new value
    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining_ttl(Utc::now()))
    }
}

/// Discovery result cache
///
/// L1 is an in-process moka cache bounded by entry count (least recently
/// used entries are evicted first when full). L2 is an optional Redis
/// mirror so results survive restarts and are shared across instances.
///
/// Expired entries are misses. moka reclaims them at their own deadline
/// through `EntryExpiry`, and `purge_expired` forces a sweep.
pub struct ResultCache {
    l1_cache: moka::future::Cache<String, Arc<CacheEntry>>,
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create an in-memory cache
    pub fn new(max_entries: u64, default_ttl: Duration) -> Self {
        let l1_cache = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(moka::policy::EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();

        Self {
            l1_cache,
            redis: None,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache mirrored to Redis
    pub async fn with_redis(
        redis_url: &str,
        max_entries: u64,
        default_ttl: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        let mut cache = Self::new(max_entries, default_ttl);
        cache.redis = Some(Arc::new(tokio::sync::Mutex::new(redis)));
        Ok(cache)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a result set
    ///
    /// Absent and expired keys are both misses.
    pub async fn get(&self, fingerprint: &str) -> Option<Vec<RankedRestaurant>> {
        let now = Utc::now();

        if let Some(entry) = self.l1_cache.get(fingerprint).await {
            if !entry.is_expired_at(now) {
                tracing::trace!("L1 cache hit: {}", fingerprint);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.results.clone());
            }
            // Not removed here: a concurrent put may already have replaced it
            tracing::trace!("L1 cache entry expired: {}", fingerprint);
        }

        match self.get_from_redis(fingerprint).await {
            Ok(Some(entry)) if !entry.is_expired_at(now) => {
                tracing::trace!("L2 cache hit: {}", fingerprint);
                let results = entry.results.clone();
                self.l1_cache
                    .insert(fingerprint.to_string(), Arc::new(entry))
                    .await;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(results);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Redis lookup failed for {}: {}", fingerprint, e),
        }

        tracing::trace!("Cache miss: {}", fingerprint);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result set for `ttl`
    ///
    /// A zero ttl stores an entry that is already expired.
    pub async fn put(&self, fingerprint: &str, results: Vec<RankedRestaurant>, ttl: Duration) {
        let entry = CacheEntry::new(results, ttl);

        if let Err(e) = self.put_to_redis(fingerprint, &entry, ttl).await {
            tracing::warn!("Redis store failed for {}: {}", fingerprint, e);
        }

        self.l1_cache
            .insert(fingerprint.to_string(), Arc::new(entry))
            .await;

        tracing::trace!("Cache set: {} (ttl {:?})", fingerprint, ttl);
    }

    /// Store a result set with the default ttl
    pub async fn put_default(&self, fingerprint: &str, results: Vec<RankedRestaurant>) {
        self.put(fingerprint, results, self.default_ttl).await;
    }

    /// Remove a single result set from both tiers
    pub async fn invalidate(&self, fingerprint: &str) {
        self.l1_cache.invalidate(fingerprint).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let result: redis::RedisResult<()> = redis::cmd("DEL")
                .arg(redis_key(fingerprint))
                .query_async(&mut *conn)
                .await;
            if let Err(e) = result {
                tracing::warn!("Redis delete failed for {}: {}", fingerprint, e);
            }
        }

        tracing::debug!("Invalidated cache entry: {}", fingerprint);
    }

    /// Remove every result set from both tiers
    pub async fn clear(&self) {
        self.l1_cache.invalidate_all();

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let keys: Result<Vec<String>, _> = redis::cmd("KEYS")
                .arg(format!("{}*", REDIS_PREFIX))
                .query_async(&mut *conn)
                .await;

            match keys {
                Ok(keys) if !keys.is_empty() => {
                    let result: redis::RedisResult<()> = redis::cmd("DEL")
                        .arg(keys)
                        .query_async(&mut *conn)
                        .await;
                    if let Err(e) = result {
                        tracing::warn!("Redis clear failed: {}", e);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Redis key scan failed: {}", e),
            }
        }

        tracing::debug!("Cleared discovery cache");
    }

    /// Reclaim space held by expired entries
    pub async fn purge_expired(&self) {
        self.l1_cache.run_pending_tasks().await;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            entries: self.l1_cache.entry_count(),
            hits,
            misses,
            hit_rate: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
            redis_enabled: self.redis.is_some(),
        }
    }

    async fn get_from_redis(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(redis_key(fingerprint))
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_to_redis(
        &self,
        fingerprint: &str,
        entry: &CacheEntry,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };

        // SETEX rejects a zero ttl and the entry would be expired anyway
        if ttl.is_zero() {
            return Ok(());
        }

        let json = serde_json::to_string(entry)?;
        let ttl_secs = ttl.min(MAX_TTL).as_secs_f64().ceil().max(1.0) as u64;

        let mut conn = redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(redis_key(fingerprint))
            .arg(ttl_secs)
            .arg(json)
            .query_async(&mut *conn)
            .await?;

        Ok(())
    }
}

fn redis_key(fingerprint: &str) -> String {
    format!("{}{}", REDIS_PREFIX, fingerprint)
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    #[serde(rename = "hitRate")]
    pub hit_rate: f64,
    #[serde(rename = "redisEnabled")]
    pub redis_enabled: bool,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build the fingerprint of a discovery query
    ///
    /// Query text is lowercased with whitespace collapsed, the origin is
    /// rounded to `precision` decimal places so nearby requests share a
    /// bucket, and every filter that changes the result is included.
    pub fn discovery(
        query: &DiscoveryQuery,
        radius_km: Option<f64>,
        limit: usize,
        precision: u32,
    ) -> String {
        let text = query
            .query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        let location = match query.origin {
            Some(origin) => format!(
                "{}:{}",
                round_coordinate(origin.latitude, precision),
                round_coordinate(origin.longitude, precision)
            ),
            None => "none".to_string(),
        };

        let prefs = &query.preferences;

        format!(
            "q={}|loc={}|r={}|diet={}|avoid={}|rating={}|tier={}|budget={}-{}-{}|open={}|limit={}",
            text,
            location,
            radius_km.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string()),
            tag_list(&prefs.dietary_restrictions),
            tag_list(&prefs.allergens),
            prefs.minimum_rating,
            prefs.budget_level,
            prefs.budget.min,
            prefs.budget.preferred,
            prefs.budget.max,
            prefs.open_now,
            limit
        )
    }
}

/// Coordinate scaled to an integer grid of `precision` decimal places
fn round_coordinate(value: f64, precision: u32) -> i64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() as i64
}

/// Sorted, normalised, deduplicated tags joined by commas
fn tag_list(tags: &[String]) -> String {
    let mut normalized: Vec<String> = tags
        .iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Restaurant, SafetyLevel, UserPreferences};

    fn ranked(id: &str) -> RankedRestaurant {
        RankedRestaurant {
            restaurant: Restaurant {
                id: id.to_string(),
                name: format!("Restaurant {}", id),
                location: Some(GeoPoint::new(37.7749, -122.4194)),
                rating: Some(4.5),
                price_tier: Some(2),
                dietary_options: vec!["vegan".to_string()],
                allergens: vec![],
                average_cost: Some(20.0),
                is_open: true,
                dietary_verified: true,
                updated_at: Utc::now(),
            },
            distance_km: Some(0.4),
            compatibility: 1.0,
            safety: SafetyLevel::Ok,
            score: 0.9,
        }
    }

    fn query(text: &str, lat: f64, lon: f64) -> DiscoveryQuery {
        DiscoveryQuery {
            query: text.to_string(),
            origin: Some(GeoPoint::new(lat, lon)),
            radius_km: Some(5.0),
            limit: Some(10),
            preferences: UserPreferences::default(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        let results = vec![ranked("a"), ranked("b")];

        cache.put("fp", results.clone(), Duration::from_secs(60)).await;

        assert_eq!(cache.get("fp").await, Some(results));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediate_miss() {
        let cache = ResultCache::new(100, Duration::from_secs(60));

        cache.put("fp", vec![ranked("a")], Duration::ZERO).await;

        assert_eq!(cache.get("fp").await, None);
    }

    #[tokio::test]
    async fn test_expired_lookup_keeps_newer_entry() {
        let cache = ResultCache::new(100, Duration::from_secs(60));

        cache.put("fp", vec![ranked("stale")], Duration::ZERO).await;
        assert_eq!(cache.get("fp").await, None);

        cache.put("fp", vec![ranked("fresh")], Duration::from_secs(60)).await;

        for _ in 0..2 {
            let results = cache.get("fp").await.unwrap();
            assert_eq!(results[0].restaurant.id, "fresh");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_and_get() {
        let cache = Arc::new(ResultCache::new(1000, Duration::from_secs(60)));

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for i in 0..50 {
                        let key = format!("fp-{}-{}", w, i);
                        cache.put(&key, vec![ranked(&key)], Duration::from_secs(60)).await;
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..8)
            .map(|w| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for i in 0..50 {
                        let key = format!("fp-{}-{}", w, i);
                        // Either not written yet or the exact entry for this key
                        if let Some(results) = cache.get(&key).await {
                            assert_eq!(results.len(), 1);
                            assert_eq!(results[0].restaurant.id, key);
                        }
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.await.unwrap();
        }

        for w in 0..8 {
            for i in 0..50 {
                let key = format!("fp-{}-{}", w, i);
                let results = cache.get(&key).await.unwrap();
                assert_eq!(results[0].restaurant.id, key);
            }
        }

        let stats = cache.stats();
        assert!(stats.hits >= 400);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = ResultCache::new(100, Duration::from_secs(60));

        cache.put("fp", vec![ranked("a")], Duration::from_millis(50)).await;
        assert!(cache.get("fp").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("fp").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = ResultCache::new(100, Duration::from_secs(60));

        cache.put_default("one", vec![ranked("a")]).await;
        cache.put_default("two", vec![ranked("b")]).await;

        cache.invalidate("one").await;
        assert!(cache.get("one").await.is_none());
        assert!(cache.get("two").await.is_some());

        cache.clear().await;
        assert!(cache.get("two").await.is_none());
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        cache.put_default("fp", vec![ranked("a")]).await;

        cache.get("fp").await;
        cache.get("fp").await;
        cache.get("missing").await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(!stats.redis_enabled);
    }

    #[tokio::test]
    async fn test_purge_expired_reclaims_entries() {
        let cache = ResultCache::new(100, Duration::from_secs(60));
        cache.put("short", vec![ranked("a")], Duration::from_millis(10)).await;
        cache.put("long", vec![ranked("b")], Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.purge_expired().await;

        assert!(cache.get("short").await.is_none());
        assert!(cache.get("long").await.is_some());
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = CacheEntry::new(vec![], Duration::from_secs(10));
        assert!(entry.expires_at > entry.created_at);
        assert!(!entry.is_expired_at(entry.created_at));
        assert!(entry.is_expired_at(entry.expires_at));
        assert_eq!(entry.remaining_ttl(entry.expires_at), Duration::ZERO);
    }

    #[test]
    fn test_fingerprint_rounds_location() {
        let a = CacheKey::discovery(&query("Pizza", 37.77491, -122.41941), Some(5.0), 10, 3);
        let b = CacheKey::discovery(&query("pizza", 37.77489, -122.41939), Some(5.0), 10, 3);
        let c = CacheKey::discovery(&query("pizza", 37.7800, -122.4194), Some(5.0), 10, 3);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_normalizes_query_and_tags() {
        let mut first = query("  thai   noodles ", 37.7749, -122.4194);
        first.preferences.dietary_restrictions = vec!["Vegan".to_string(), "halal".to_string()];

        let mut second = query("Thai Noodles", 37.7749, -122.4194);
        second.preferences.dietary_restrictions = vec!["halal".to_string(), "vegan".to_string()];

        assert_eq!(
            CacheKey::discovery(&first, Some(5.0), 10, 3),
            CacheKey::discovery(&second, Some(5.0), 10, 3)
        );
    }

    #[test]
    fn test_fingerprint_includes_filters() {
        let base = query("sushi", 37.7749, -122.4194);
        let mut strict = base.clone();
        strict.preferences.minimum_rating = 4.0;

        assert_ne!(
            CacheKey::discovery(&base, Some(5.0), 10, 3),
            CacheKey::discovery(&strict, Some(5.0), 10, 3)
        );
        assert_ne!(
            CacheKey::discovery(&base, Some(5.0), 10, 3),
            CacheKey::discovery(&base, Some(10.0), 10, 3)
        );
    }
}

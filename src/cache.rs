//! Compiled validator caching
//!
//! Compiling a JSON Schema validator is far more expensive than running it,
//! and diagnostics run on every edit. This module provides an LRU cache of
//! compiled validators keyed by a fingerprint of the schema contents. The
//! cache is an explicit object owned by whoever loaded the schema; there is
//! no global instance.
//!
//! # Configuration
//!
//! Cache size can be configured via the `YAML_ASSIST_CACHE_SIZE` environment
//! variable (see [`crate::config`]):
//!
//! ```bash
//! # Keep more schemas compiled when switching between many documents
//! export YAML_ASSIST_CACHE_SIZE=64
//!
//! # Disable cache for debugging
//! export YAML_ASSIST_CACHE_SIZE=0
//! ```

use crate::error::ServiceError;
use jsonschema::Validator;
use lru::LruCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Schema self-identifiers removed before compiling
const IDENTIFIER_KEYS: [&str; 2] = ["$id", "id"];

/// Cache key: SHA-256 of the schema with its identifier stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
}

impl CacheKey {
    /// Create a key from schema contents
    ///
    /// Two schemas differing only in `$id` share a key.
    pub fn from_schema(schema: &Value) -> Self {
        let stripped = strip_identifier(schema);
        let digest = Sha256::digest(stripped.to_string().as_bytes());
        CacheKey {
            digest: format!("{:x}", digest),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }
}

/// Copy of the schema without a root `$id`/`id`
///
/// Reloading an edited schema under the same identifier would otherwise
/// collide inside the validator's resource registry.
pub fn strip_identifier(schema: &Value) -> Value {
    let mut stripped = schema.clone();
    if let Value::Object(map) = &mut stripped {
        for key in IDENTIFIER_KEYS {
            map.remove(key);
        }
    }
    stripped
}

/// Cache metrics for observability
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheMetrics {
    /// Cache hit rate (0.0 to 1.0); 0.0 before any request
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache metrics at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe LRU cache of compiled validators
///
/// Validators are shared as `Arc<Validator>`. A capacity of 0 disables
/// caching: every request compiles afresh.
///
/// # Example
///
/// ```
/// use yaml_assist::cache::ValidatorCache;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let cache = ValidatorCache::new(4);
/// let schema = json!({"type": "object"});
///
/// let first = cache.get_or_compile(&schema).unwrap();
/// let second = cache.get_or_compile(&schema).unwrap();
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(cache.metrics_snapshot().hits, 1);
/// ```
#[derive(Clone)]
pub struct ValidatorCache {
    cache: Option<Arc<Mutex<LruCache<CacheKey, Arc<Validator>>>>>,
    metrics: Arc<CacheMetrics>,
    capacity: usize,
}

impl ValidatorCache {
    /// Create a new cache holding at most `capacity` validators
    pub fn new(capacity: usize) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Arc::new(Mutex::new(LruCache::new(cap))));
        Self {
            cache,
            metrics: Arc::new(CacheMetrics::default()),
            capacity,
        }
    }

    /// Get a compiled validator, compiling the schema on a miss
    pub fn get_or_compile(&self, schema: &Value) -> Result<Arc<Validator>, ServiceError> {
        let key = CacheKey::from_schema(schema);

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = cache.get(&key) {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.as_str(), "Validator cache hit");
                return Ok(Arc::clone(validator));
            }
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.as_str(), "Validator cache miss, compiling");
        let validator = compile(schema)?;

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            // `push` also hands back the old value when the key was present
            if let Some((evicted, _)) = cache.push(key.clone(), Arc::clone(&validator)) {
                if evicted != key {
                    self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        Ok(validator)
    }

    /// Drop every cached validator
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Number of cached validators
    pub fn len(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

fn compile(schema: &Value) -> Result<Arc<Validator>, ServiceError> {
    let stripped = strip_identifier(schema);
    jsonschema::validator_for(&stripped)
        .map(Arc::new)
        .map_err(|err| ServiceError::SchemaCompile(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_ignores_identifier() {
        let a = json!({"$id": "https://example.com/a.json", "type": "object"});
        let b = json!({"$id": "https://example.com/b.json", "type": "object"});
        let c = json!({"type": "string"});

        assert_eq!(CacheKey::from_schema(&a), CacheKey::from_schema(&b));
        assert_ne!(CacheKey::from_schema(&a), CacheKey::from_schema(&c));
        assert_eq!(CacheKey::from_schema(&a).as_str().len(), 64);
    }

    #[test]
    fn test_strip_identifier_only_touches_root() {
        let schema = json!({"$id": "x", "properties": {"id": {"type": "string"}}});
        let stripped = strip_identifier(&schema);
        assert!(stripped.get("$id").is_none());
        assert!(stripped["properties"].get("id").is_some());
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = ValidatorCache::new(10);
        let schema = json!({"type": "object"});

        let v1 = cache.get_or_compile(&schema).unwrap();
        let v2 = cache.get_or_compile(&schema).unwrap();

        assert!(Arc::ptr_eq(&v1, &v2));
        let metrics = cache.metrics_snapshot();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hit_rate(), 0.5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = ValidatorCache::new(2);

        for ty in ["string", "integer", "boolean"] {
            cache.get_or_compile(&json!({ "type": ty })).unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.metrics_snapshot().evictions, 1);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ValidatorCache::new(0);
        let schema = json!({"type": "object"});

        let v1 = cache.get_or_compile(&schema).unwrap();
        let v2 = cache.get_or_compile(&schema).unwrap();

        assert!(!cache.is_enabled());
        assert!(!Arc::ptr_eq(&v1, &v2));
        assert_eq!(cache.metrics_snapshot().misses, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_schema_is_compile_error() {
        let cache = ValidatorCache::new(2);
        let result = cache.get_or_compile(&json!({"type": 12}));
        assert!(matches!(result, Err(ServiceError::SchemaCompile(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_and_reset() {
        let cache = ValidatorCache::new(2);
        cache.get_or_compile(&json!({"type": "object"})).unwrap();
        cache.clear();
        cache.reset_metrics();
        assert!(cache.is_empty());
        assert_eq!(cache.metrics_snapshot().total_requests(), 0);
    }
}

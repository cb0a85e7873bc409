//! TTL cache for archive responses and derived results.
//!
//! Values of any `Clone + Send + Sync` type share one cache; each entry
//! remembers the TTL class it was stored under. Expired entries are dropped
//! when looked up, by [`ResponseCache::sweep`], or by the optional sweeper task.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Duration, Utc};
use insidertrace_core::Clock;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Document class an entry is cached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// Ownership-event documents and anything derived from them.
    TransactionEvent,
    QuarterlyHoldings,
    Annual,
    /// The entity directory snapshot.
    Directory,
    Default,
}

impl TtlClass {
    pub fn ttl(self) -> Duration {
        match self {
            Self::TransactionEvent => Duration::hours(1),
            Self::QuarterlyHoldings => Duration::days(1),
            Self::Annual => Duration::days(7),
            Self::Directory => Duration::hours(12),
            Self::Default => Duration::hours(4),
        }
    }
}

/// Digest of an operation name and its named arguments.
///
/// Arguments are canonicalised by name, so the order they are added in
/// never changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn builder(operation: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation: operation.to_string(),
            args: BTreeMap::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: String,
    args: BTreeMap<String, Value>,
}

impl CacheKeyBuilder {
    pub fn arg<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.args.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> CacheKey {
        let canonical = serde_json::json!({ "op": self.operation, "args": self.args });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        CacheKey(format!("{digest:x}"))
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    created: DateTime<Utc>,
    ttl: Duration,
}

impl Entry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.created + self.ttl
    }
}

pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unexpired value stored under `key`, if it has type `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => entry.value.downcast_ref::<T>().cloned(),
            None => None,
        }
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&self, key: CacheKey, class: TtlClass, value: T) {
        let entry = Entry {
            value: Arc::new(value),
            created: self.clock.now(),
            ttl: class.ttl(),
        };
        self.lock().insert(key, entry);
    }

    /// Return the cached value or run `compute` and cache its success.
    ///
    /// Errors are returned as-is and never cached. Concurrent misses on the
    /// same key may each run `compute`; the last result stored wins.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        class: TtlClass,
        compute: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            debug!(key = key.as_str(), "cache hit");
            return Ok(hit);
        }
        debug!(key = key.as_str(), ?class, "cache miss");
        let value = compute().await?;
        self.insert(key.clone(), class, value.clone());
        Ok(value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every `period` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

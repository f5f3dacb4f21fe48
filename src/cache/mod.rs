use moka::future::Cache as MokaCache;
use moka::notification::RemovalCause;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Entity family a cache tag refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Organization,
    Project,
    Environment,
    User,
    Team,
    Contact,
    Segment,
    Survey,
    Integration,
    ApiKey,
}

impl CacheScope {
    fn as_str(&self) -> &'static str {
        match self {
            CacheScope::Organization => "organization",
            CacheScope::Project => "project",
            CacheScope::Environment => "environment",
            CacheScope::User => "user",
            CacheScope::Team => "team",
            CacheScope::Contact => "contact",
            CacheScope::Segment => "segment",
            CacheScope::Survey => "survey",
            CacheScope::Integration => "integration",
            CacheScope::ApiKey => "apiKey",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheTag {
    pub scope: CacheScope,
    pub id: Uuid,
}

impl CacheTag {
    pub fn new(scope: CacheScope, id: Uuid) -> Self {
        Self { scope, id }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.id)
    }
}

/// Which keys each tag covers, and which loads are still allowed to publish their result.
#[derive(Default)]
struct TagIndex {
    keys: HashMap<CacheTag, HashSet<String>>,
    tags_of: HashMap<String, Vec<CacheTag>>,
    pending: HashMap<String, u64>,
    next_load: u64,
}

impl TagIndex {
    /// Register a load of `key` under `tags` and return its ticket
    fn begin(&mut self, key: &str, tags: &[CacheTag]) -> u64 {
        self.next_load += 1;
        self.pending.insert(key.to_string(), self.next_load);
        for tag in tags {
            self.keys.entry(*tag).or_default().insert(key.to_string());
        }
        let known = self.tags_of.entry(key.to_string()).or_default();
        for tag in tags {
            if !known.contains(tag) {
                known.push(*tag);
            }
        }
        self.next_load
    }

    fn is_current(&self, key: &str, ticket: u64) -> bool {
        self.pending.get(key) == Some(&ticket)
    }

    fn finish(&mut self, key: &str, ticket: u64) {
        if self.is_current(key, ticket) {
            self.pending.remove(key);
        }
    }

    /// Forget `key` entirely unless a newer load has claimed it
    fn forget(&mut self, key: &str) {
        if self.pending.contains_key(key) {
            return;
        }
        for tag in self.tags_of.remove(key).unwrap_or_default() {
            if let Some(keys) = self.keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.keys.remove(&tag);
                }
            }
        }
    }

    /// Detach every key under `tag`, cancelling loads still in flight for them
    fn take(&mut self, tag: &CacheTag) -> HashSet<String> {
        let keys = self.keys.remove(tag).unwrap_or_default();
        for key in &keys {
            self.pending.remove(key);
            if let Some(tags) = self.tags_of.get_mut(key) {
                tags.retain(|t| t != tag);
                if tags.is_empty() {
                    self.tags_of.remove(key);
                }
            }
        }
        keys
    }
}

/// Read-through cache for derived lookups, invalidated by entity tag after writes.
/// Entries are JSON values so any serializable result can be cached.
///
/// A load that overlaps an invalidation of one of its tags does not publish its result.
/// Entries evicted or expired by moka are dropped from the tag index as well.
#[derive(Clone)]
pub struct CacheService {
    entries: MokaCache<String, Arc<Value>>,
    index: Arc<Mutex<TagIndex>>,
}

impl CacheService {
    pub fn new(max_capacity: u64, ttl_secs: u64) -> Self {
        let index = Arc::new(Mutex::new(TagIndex::default()));
        let listener_index = index.clone();
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .eviction_listener(move |key: Arc<String>, _value, cause: RemovalCause| {
                if matches!(cause, RemovalCause::Replaced) {
                    return;
                }
                if let Ok(mut index) = listener_index.lock() {
                    index.forget(&key);
                }
            })
            .build();
        Self { entries, index }
    }

    fn with_index<R>(&self, f: impl FnOnce(&mut TagIndex) -> R) -> R {
        let mut index = self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut index)
    }

    /// Return the cached value for `key`, or run `loader`, cache its result under `tags` and return it.
    /// Undecodable cache entries are treated as misses.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, tags: &[CacheTag], loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.entries.get(key).await {
            match serde_json::from_value::<T>((*hit).clone()) {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!("Dropping undecodable cache entry '{}': {}", key, e),
            }
        }

        let ticket = self.with_index(|index| index.begin(key, tags));
        let value = match loader().await {
            Ok(value) => value,
            Err(e) => {
                self.with_index(|index| {
                    index.finish(key, ticket);
                    index.forget(key);
                });
                return Err(e);
            }
        };

        match serde_json::to_value(&value) {
            Ok(json) if self.with_index(|index| index.is_current(key, ticket)) => {
                self.entries.insert(key.to_string(), Arc::new(json)).await;
                let still_current = self.with_index(|index| {
                    let current = index.is_current(key, ticket);
                    index.finish(key, ticket);
                    current
                });
                if !still_current {
                    self.entries.invalidate(key).await;
                }
            }
            Ok(_) => tracing::debug!("Not caching '{}': invalidated while loading", key),
            Err(e) => {
                tracing::warn!("Value for cache key '{}' is not serializable: {}", key, e);
                self.with_index(|index| {
                    index.finish(key, ticket);
                    index.forget(key);
                });
            }
        }

        Ok(value)
    }

    /// Drop every entry tagged with `(scope, id)`
    pub async fn invalidate(&self, scope: CacheScope, id: Uuid) {
        let tag = CacheTag::new(scope, id);
        let keys = self.with_index(|index| index.take(&tag));
        for key in &keys {
            self.entries.invalidate(key).await;
        }
        tracing::debug!("Invalidated {} cache entries for {}", keys.len(), tag);
    }

    pub async fn invalidate_all(&self, tags: &[CacheTag]) {
        for tag in tags {
            self.invalidate(tag.scope, tag.id).await;
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.get(key).await.is_some()
    }

    #[cfg(test)]
    fn tracked_tags(&self) -> usize {
        self.with_index(|index| index.keys.len())
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(10_000, 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loads_once_then_serves_from_cache() {
        let cache = CacheService::default();
        let calls = AtomicUsize::new(0);
        let tag = CacheTag::new(CacheScope::Environment, Uuid::new_v4());

        for _ in 0..3 {
            let value: Result<String, ()> = cache
                .get_or_load("env:key", &[tag], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("loaded".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "loaded");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_the_tag() {
        let cache = CacheService::default();
        let env_a = CacheTag::new(CacheScope::Environment, Uuid::new_v4());
        let env_b = CacheTag::new(CacheScope::Environment, Uuid::new_v4());

        let _: Result<u32, ()> = cache.get_or_load("a", &[env_a], || async { Ok(1) }).await;
        let _: Result<u32, ()> = cache.get_or_load("b", &[env_b], || async { Ok(2) }).await;

        cache.invalidate(env_a.scope, env_a.id).await;
        assert!(!cache.contains("a").await);
        assert!(cache.contains("b").await);
    }

    #[tokio::test]
    async fn a_load_overlapping_an_invalidation_is_not_cached() {
        let cache = CacheService::default();
        let tag = CacheTag::new(CacheScope::Team, Uuid::new_v4());

        let stale: Result<String, ()> = cache
            .get_or_load("team_details", &[tag], || async {
                cache.invalidate(tag.scope, tag.id).await;
                Ok("before write".to_string())
            })
            .await;
        assert_eq!(stale.unwrap(), "before write");
        assert!(!cache.contains("team_details").await);

        let fresh: Result<String, ()> = cache
            .get_or_load("team_details", &[tag], || async { Ok("after write".to_string()) })
            .await;
        assert_eq!(fresh.unwrap(), "after write");
        assert!(cache.contains("team_details").await);
    }

    #[tokio::test]
    async fn expired_entries_leave_the_tag_index() {
        let cache = CacheService::new(100, 1);
        let tag = CacheTag::new(CacheScope::Environment, Uuid::new_v4());
        let _: Result<u32, ()> = cache.get_or_load("short", &[tag], || async { Ok(1) }).await;
        assert_eq!(cache.tracked_tags(), 1);

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        cache.entries.run_pending_tasks().await;
        assert!(!cache.contains("short").await);
        assert_eq!(cache.tracked_tags(), 0);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = CacheService::default();
        let first: Result<u32, &str> = cache.get_or_load("k", &[], || async { Err("boom") }).await;
        assert_eq!(first, Err("boom"));
        let second: Result<u32, &str> = cache.get_or_load("k", &[], || async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
    }
}

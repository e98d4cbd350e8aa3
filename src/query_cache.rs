//! Remote data cache.
//!
//! Server state keyed by segment lists (`["projects", id]`). Reads go through
//! `fetch`, which de-duplicates concurrent loads of the same key and keeps
//! results for the stale time. Mutations call `invalidate(prefix)`; that drops
//! every matching entry and wakes every watcher registered under a matching
//! key, which is how a parked progress poller learns it should look again.
//!
//! Values are stored as `serde_json::Value` so one cache serves every
//! response type. Errors are never cached, and neither is a load that was
//! already running when an invalidation covered its key.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::ApiError;
use crate::config::{DEFAULT_STALE_TIME, QUERY_CACHE_CAPACITY};

// ═══════════════════════════════════════════════════════════
// QueryKey
// ═══════════════════════════════════════════════════════════

/// Ordered key segments. Prefix matching is segment-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Append the compact JSON of a parameter struct as one extra segment.
    pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Self {
        let encoded = serde_json::to_string(params).unwrap_or_default();
        self.0.push(encoded);
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn dashboard() -> Self {
        Self::new(["dashboard"])
    }

    pub fn clients() -> Self {
        Self::new(["clients"])
    }

    pub fn client(id: &str) -> Self {
        Self::new(["clients", id])
    }

    pub fn projects() -> Self {
        Self::new(["projects"])
    }

    /// Project detail lives under `projects` so list invalidation covers it.
    pub fn project(id: &str) -> Self {
        Self::new(["projects", id])
    }

    pub fn pipeline_progress(project_id: &str) -> Self {
        Self::new(["pipeline-progress", project_id])
    }

    pub fn project_files(project_id: &str) -> Self {
        Self::new(["project-files", project_id])
    }

    pub fn generated_files(project_id: &str) -> Self {
        Self::new(["generated-files", project_id])
    }

    pub fn review_queue() -> Self {
        Self::new(["review-queue"])
    }

    pub fn cma_rows() -> Self {
        Self::new(["cma-rows"])
    }

    pub fn me() -> Self {
        Self::new(["me"])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

// ═══════════════════════════════════════════════════════════
// QueryCache
// ═══════════════════════════════════════════════════════════

pub struct QueryCache {
    entries: Cache<QueryKey, Value>,
    watchers: Mutex<HashMap<QueryKey, Vec<Weak<Notify>>>>,
    /// Bumped on every invalidation.
    epoch: AtomicU64,
    /// Prefix → epoch of its latest invalidation.
    invalidated: Mutex<HashMap<QueryKey, u64>>,
}

impl QueryCache {
    pub fn new(capacity: u64, stale_time: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(stale_time)
                .build(),
            watchers: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            invalidated: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `key`, or the loader's result. Concurrent callers for
    /// the same key share a single loader run. A failed load is not stored,
    /// and a load overtaken by an invalidation of its key is returned to the
    /// caller but dropped from the cache.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, loader: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let started = self.epoch.load(Ordering::SeqCst);
        let loaded = self
            .entries
            .try_get_with(key.clone(), async move {
                let data = loader().await?;
                serde_json::to_value(&data).map_err(|e| ApiError::Decode(e.to_string()))
            })
            .await
            .map_err(|e: Arc<ApiError>| (*e).clone());

        if self.invalidated_since(key, started) {
            self.entries.invalidate(key).await;
            tracing::debug!(key = %key, "Discarded load overtaken by invalidation");
        }

        serde_json::from_value(loaded?).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn invalidated_since(&self, key: &QueryKey, epoch: u64) -> bool {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            return false;
        }
        let Ok(invalidated) = self.invalidated.lock() else {
            return true;
        };
        invalidated
            .iter()
            .any(|(prefix, at)| *at > epoch && key.starts_with(prefix))
    }

    fn record_invalidation(&self, prefix: &QueryKey) {
        let at = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut invalidated) = self.invalidated.lock() {
            invalidated.insert(prefix.clone(), at);
        }
    }

    /// Drop the entry for `key` and load it again. Watchers are not woken.
    pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, loader: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.entries.invalidate(key).await;
        self.fetch(key, loader).await
    }

    /// Currently cached value, if any and not expired.
    pub async fn peek(&self, key: &QueryKey) -> Option<Value> {
        self.entries.get(key).await
    }

    pub async fn is_cached(&self, key: &QueryKey) -> bool {
        self.peek(key).await.is_some()
    }

    /// Drop every entry whose key starts with `prefix` and wake the matching
    /// watchers.
    pub async fn invalidate(&self, prefix: &QueryKey) {
        self.record_invalidation(prefix);
        let doomed: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();
        for key in &doomed {
            self.entries.invalidate(key).await;
        }

        let woken = self.wake_watchers(prefix);
        tracing::debug!(prefix = %prefix, entries = doomed.len(), watchers = woken, "Cache invalidated");
    }

    pub async fn invalidate_all(&self) {
        self.record_invalidation(&QueryKey::new(Vec::<String>::new()));
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        let woken = self.wake_watchers(&QueryKey::new(Vec::<String>::new()));
        tracing::debug!(watchers = woken, "Cache cleared");
    }

    /// Notifier that fires whenever an invalidation covers `key`.
    ///
    /// Each watcher gets its own `Notify`, so a wake-up that lands while the
    /// watcher is busy is kept as a permit rather than lost.
    pub fn watch(&self, key: &QueryKey) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers
                .entry(key.clone())
                .or_default()
                .push(Arc::downgrade(&notify));
        }
        notify
    }

    fn wake_watchers(&self, prefix: &QueryKey) -> usize {
        let Ok(mut watchers) = self.watchers.lock() else {
            return 0;
        };
        let mut woken = 0;
        watchers.retain(|key, list| {
            list.retain(|weak| weak.strong_count() > 0);
            if key.starts_with(prefix) {
                for notify in list.iter().filter_map(Weak::upgrade) {
                    notify.notify_one();
                    woken += 1;
                }
            }
            !list.is_empty()
        });
        woken
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QUERY_CACHE_CAPACITY, DEFAULT_STALE_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: u64,
    ) -> impl FnOnce() -> std::future::Ready<Result<u64, ApiError>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[test]
    fn prefix_matching_is_segment_wise() {
        let key = QueryKey::project("proj-001");
        assert!(key.starts_with(&QueryKey::projects()));
        assert!(key.starts_with(&key));
        assert!(!QueryKey::new(["projects-archive"]).starts_with(&QueryKey::projects()));
        assert!(!QueryKey::projects().starts_with(&key));
        assert_eq!(key.to_string(), "projects/proj-001");
    }

    #[test]
    fn params_become_one_segment() {
        #[derive(Serialize)]
        struct P {
            page: u32,
        }
        let key = QueryKey::clients().with_params(&P { page: 2 });
        assert_eq!(key.segments(), &["clients".to_string(), r#"{"page":2}"#.to_string()]);
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::dashboard();

        let a: u64 = cache.fetch(&key, counting_loader(&calls, 3)).await.unwrap();
        let b: u64 = cache.fetch(&key, counting_loader(&calls, 99)).await.unwrap();

        assert_eq!((a, b), (3, 3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::default();
        let key = QueryKey::clients();

        let err = cache
            .fetch::<u64, _, _>(&key, || async { Err(ApiError::Timeout) })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Timeout);
        assert!(!cache.is_cached(&key).await);

        let ok: u64 = cache.fetch(&key, || async { Ok(5) }).await.unwrap();
        assert_eq!(ok, 5);
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_load() {
        let cache = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::pipeline_progress("proj-001");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (cache, calls, key) = (cache.clone(), calls.clone(), key.clone());
            handles.push(tokio::spawn(async move {
                cache
                    .fetch::<u64, _, _>(&key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(65)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 65);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_drops_prefix_matches_only() {
        let cache = QueryCache::default();
        let ok = |v: u64| move || async move { Ok::<_, ApiError>(v) };

        let _: u64 = cache.fetch(&QueryKey::clients(), ok(1)).await.unwrap();
        let _: u64 = cache.fetch(&QueryKey::client("c1"), ok(2)).await.unwrap();
        let _: u64 = cache.fetch(&QueryKey::dashboard(), ok(3)).await.unwrap();

        cache.invalidate(&QueryKey::clients()).await;

        assert!(!cache.is_cached(&QueryKey::clients()).await);
        assert!(!cache.is_cached(&QueryKey::client("c1")).await);
        assert!(cache.is_cached(&QueryKey::dashboard()).await);
    }

    #[tokio::test]
    async fn load_in_flight_during_invalidation_is_not_kept() {
        let cache = Arc::new(QueryCache::default());
        let key = QueryKey::project("proj-001");
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let load = {
            let (cache, key) = (cache.clone(), key.clone());
            tokio::spawn(async move {
                cache
                    .fetch::<u64, _, _>(&key, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(1)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        cache.invalidate(&QueryKey::projects()).await;
        release_tx.send(()).unwrap();

        assert_eq!(load.await.unwrap().unwrap(), 1);
        assert!(!cache.is_cached(&key).await);

        let fresh: u64 = cache.fetch(&key, || async { Ok(2) }).await.unwrap();
        assert_eq!(fresh, 2);
        assert!(cache.is_cached(&key).await);
    }

    #[tokio::test]
    async fn invalidation_of_other_prefix_keeps_in_flight_load() {
        let cache = Arc::new(QueryCache::default());
        let key = QueryKey::dashboard();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let load = {
            let (cache, key) = (cache.clone(), key.clone());
            tokio::spawn(async move {
                cache
                    .fetch::<u64, _, _>(&key, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(3)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        cache.invalidate(&QueryKey::clients()).await;
        release_tx.send(()).unwrap();

        assert_eq!(load.await.unwrap().unwrap(), 3);
        assert!(cache.is_cached(&key).await);
    }

    #[tokio::test]
    async fn refetch_bypasses_cached_value() {
        let cache = QueryCache::default();
        let key = QueryKey::pipeline_progress("p");
        let _: u64 = cache.fetch(&key, || async { Ok(10) }).await.unwrap();
        let fresh: u64 = cache.refetch(&key, || async { Ok(20) }).await.unwrap();
        assert_eq!(fresh, 20);
        assert_eq!(cache.peek(&key).await, Some(Value::from(20)));
    }

    #[tokio::test]
    async fn entries_expire_after_stale_time() {
        let cache = QueryCache::new(10, Duration::from_millis(50));
        let key = QueryKey::dashboard();
        let _: u64 = cache.fetch(&key, || async { Ok(1) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!cache.is_cached(&key).await);
    }

    #[tokio::test]
    async fn invalidation_wakes_matching_watchers() {
        let cache = QueryCache::default();
        let progress = cache.watch(&QueryKey::pipeline_progress("p1"));
        let other = cache.watch(&QueryKey::pipeline_progress("p2"));

        cache.invalidate(&QueryKey::pipeline_progress("p1")).await;

        tokio::time::timeout(Duration::from_millis(100), progress.notified())
            .await
            .expect("watcher for p1 should be woken");
        assert!(
            tokio::time::timeout(Duration::from_millis(50), other.notified())
                .await
                .is_err(),
            "watcher for p2 must stay parked"
        );
    }

    #[tokio::test]
    async fn dropped_watchers_are_pruned() {
        let cache = QueryCache::default();
        let notify = cache.watch(&QueryKey::dashboard());
        drop(notify);
        cache.invalidate(&QueryKey::dashboard()).await;
        assert!(cache.watchers.lock().unwrap().is_empty());
    }
}

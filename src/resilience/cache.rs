use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::retry::{retry_with_backoff, RetryPolicy};

/// How long an in-flight request may be shared with new callers before it is
/// considered stale and a fresh fetch is issued.
const INFLIGHT_SHARE_WINDOW: Duration = Duration::from_secs(5);
/// Pause before re-checking when the per-key rate limit is hit.
const RATE_LIMIT_SLEEP: Duration = Duration::from_millis(500);
/// Default proactive sweep cadence for expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default per-key request budget per second.
const MAX_REQUESTS_PER_SECOND: u32 = 2;

/// Failure classes surfaced by a cache fetcher. Only the rate-limit class is
/// retried with backoff; everything else propagates immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

struct CacheEntry<T> {
    data: T,
    written_at: Instant,
    ttl: Duration,
}

struct Pending<T> {
    started: Instant,
    fut: Shared<BoxFuture<'static, Result<T, FetchError>>>,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    pending: HashMap<String, Pending<T>>,
    last_request: HashMap<String, Instant>,
}

/// TTL cache with request coalescing, per-key rate limiting and
/// backoff-retry around an arbitrary async fetch.
///
/// Reads honor expiry lazily; a periodic sweep also deletes expired entries
/// proactively. Concurrent callers for the same key within the share window
/// join the in-flight request instead of issuing a duplicate call.
pub struct ResilientCache<T: Clone + Send + Sync + 'static> {
    inner: Mutex<CacheInner<T>>,
    max_rps: u32,
    retry: RetryPolicy,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

enum Step<T: Clone> {
    Hit(T),
    Join(Shared<BoxFuture<'static, Result<T, FetchError>>>),
    RateLimited,
    Fetch(Shared<BoxFuture<'static, Result<T, FetchError>>>),
}

impl<T: Clone + Send + Sync + 'static> ResilientCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                pending: HashMap::new(),
                last_request: HashMap::new(),
            }),
            max_rps: MAX_REQUESTS_PER_SECOND,
            retry: RetryPolicy::default(),
            sweeper: Mutex::new(None),
        }
    }

    /// Return the cached value for `key`, join a recent in-flight fetch, or
    /// execute `fetcher` (rate limited, retried on rate-limit failures) and
    /// cache the result under `ttl`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<T, FetchError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let fetcher = Arc::new(fetcher);

        loop {
            let step = self.next_step(key, Arc::clone(&fetcher));

            match step {
                Step::Hit(value) => return Ok(value),
                Step::Join(fut) => return fut.await,
                Step::RateLimited => {
                    sleep(RATE_LIMIT_SLEEP).await;
                    continue;
                }
                Step::Fetch(fut) => {
                    let result = fut.await;

                    // The in-flight marker is removed no matter how the
                    // fetch ended.
                    let mut inner = self.inner.lock().expect("cache lock poisoned");
                    inner.pending.remove(key);
                    if let Ok(ref value) = result {
                        inner.entries.insert(
                            key.to_string(),
                            CacheEntry {
                                data: value.clone(),
                                written_at: Instant::now(),
                                ttl,
                            },
                        );
                    }
                    return result;
                }
            }
        }
    }

    fn next_step<F, Fut>(&self, key: &str, fetcher: Arc<F>) -> Step<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();

        // 1. Fresh cached value
        if let Some(entry) = inner.entries.get(key) {
            if now.duration_since(entry.written_at) < entry.ttl {
                return Step::Hit(entry.data.clone());
            }
            inner.entries.remove(key);
        }

        // 2. Recent in-flight request for the same key
        if let Some(pending) = inner.pending.get(key) {
            if now.duration_since(pending.started) < INFLIGHT_SHARE_WINDOW {
                return Step::Join(pending.fut.clone());
            }
            inner.pending.remove(key);
        }

        // 3. Per-key rate limit
        let min_spacing = Duration::from_millis(1_000 / self.max_rps as u64);
        if let Some(last) = inner.last_request.get(key) {
            if now.duration_since(*last) < min_spacing {
                return Step::RateLimited;
            }
        }
        inner.last_request.insert(key.to_string(), now);

        // 4. Issue the fetch, retrying only rate-limit-class failures
        let retry = self.retry;
        let fut = async move {
            retry_with_backoff(
                retry,
                |e: &FetchError| matches!(e, FetchError::RateLimited(_)),
                move || fetcher(),
            )
            .await
        }
        .boxed()
        .shared();

        inner.pending.insert(
            key.to_string(),
            Pending {
                started: now,
                fut: fut.clone(),
            },
        );

        Step::Fetch(fut)
    }

    /// Drop the cached value and any in-flight marker for `key`, forcing the
    /// next read to fetch.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.remove(key);
        inner.pending.remove(key);
    }

    /// Delete expired entries and stale in-flight markers.
    pub fn sweep(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();
        inner
            .entries
            .retain(|_, e| now.duration_since(e.written_at) < e.ttl);
        inner
            .pending
            .retain(|_, p| now.duration_since(p.started) < INFLIGHT_SHARE_WINDOW);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweep task. Idempotent; a second call replaces the
    /// previous task.
    pub fn start_sweeper(self: Arc<Self>, interval: Duration) {
        let cache = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate tick
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        });

        let mut sweeper = self.sweeper.lock().expect("cache lock poisoned");
        if let Some(old) = sweeper.replace(handle) {
            old.abort();
        }
    }

    /// Cancel the sweep task. Safe to call multiple times.
    pub fn stop(&self) {
        let mut sweeper = self.sweeper.lock().expect("cache lock poisoned");
        if let Some(task) = sweeper.take() {
            task.abort();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ResilientCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_fetcher(
        calls: Arc<AtomicU32>,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32, FetchError>> + Send + Sync + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_value_served_until_ttl_elapses() {
        let cache = ResilientCache::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));
        let ttl = Duration::from_secs(60);

        let v1 = cache
            .get_or_fetch("k", ttl, counting_fetcher(Arc::clone(&calls)))
            .await
            .unwrap();
        assert_eq!(v1, 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        let v2 = cache
            .get_or_fetch("k", ttl, counting_fetcher(Arc::clone(&calls)))
            .await
            .unwrap();
        assert_eq!(v2, 1, "read before expiry must hit the cache");

        tokio::time::sleep(Duration::from_secs(2)).await;
        let v3 = cache
            .get_or_fetch("k", ttl, counting_fetcher(Arc::clone(&calls)))
            .await
            .unwrap();
        assert_eq!(v3, 2, "read at/after expiry must fetch fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_share_one_fetch() {
        let cache = Arc::new(ResilientCache::<u32>::new());
        let calls = Arc::new(AtomicU32::new(0));
        let ttl = Duration::from_secs(60);

        let slow_fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    sleep(Duration::from_millis(100)).await;
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", ttl, slow_fetcher.clone()),
            cache.get_or_fetch("k", ttl, slow_fetcher),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second caller must coalesce");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_delays_back_to_back_fetches() {
        let cache = ResilientCache::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));
        // Zero TTL so the second read cannot be served from cache.
        let ttl = Duration::from_secs(0);

        let start = Instant::now();
        let _ = cache
            .get_or_fetch("k", ttl, counting_fetcher(Arc::clone(&calls)))
            .await;
        let _ = cache
            .get_or_fetch("k", ttl, counting_fetcher(Arc::clone(&calls)))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(
            start.elapsed() >= RATE_LIMIT_SLEEP,
            "second fetch must wait out the rate limit"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_fetch_is_retried_with_backoff() {
        let cache = ResilientCache::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let flaky = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(FetchError::RateLimited("429".into()))
                    } else {
                        Ok(99)
                    }
                }
                .boxed()
            }
        };

        let v = cache
            .get_or_fetch("k", Duration::from_secs(60), flaky)
            .await
            .unwrap();
        assert_eq!(v, 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_propagates_without_retry() {
        let cache = ResilientCache::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let broken = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(FetchError::Upstream("500".into()))
                }
                .boxed()
            }
        };

        let err = cache
            .get_or_fetch("k", Duration::from_secs(60), broken)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Failed fetches must not poison the pending map.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries() {
        let cache = ResilientCache::<u32>::new();
        let calls = Arc::new(AtomicU32::new(0));

        let _ = cache
            .get_or_fetch("k", Duration::from_secs(10), counting_fetcher(calls))
            .await;
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        cache.sweep();
        assert!(cache.is_empty());
    }
}

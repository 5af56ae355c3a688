//! Keyed fetch cache for one value type.
//!
//! Per key the store keeps the last value and when it was fetched, the
//! in-flight fetch (if any), the last error, the consecutive failure count,
//! and a watch channel publishing every state change.
//!
//! The mutex is never held across an await: a read decides under the lock
//! whether to serve, join, or start a fetch, then awaits outside it. Fetches
//! run on spawned tasks and write their own outcome back, so a reader that
//! goes away does not cancel the request.

use super::keys::ResourceKey;
use super::policy::QueryPolicy;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use issue_portal_sdk::PortalError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, PortalError>>>;

/// Coarse state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing fetched since creation or the last invalidation.
    Empty,
    /// A fetch is running; `data` may still hold the previous value.
    Fetching,
    /// A value is available.
    Ready,
    /// The last fetch failed and there is no value to fall back on.
    Failed,
}

/// What subscribers of a key observe.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<V> {
    pub status: QueryStatus,
    pub data: Option<V>,
    pub error: Option<PortalError>,
    pub updated_at: Option<Instant>,
}

impl<V> QuerySnapshot<V> {
    fn empty() -> Self {
        Self {
            status: QueryStatus::Empty,
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

struct Entry<V> {
    value: Option<V>,
    fetched_at: Option<Instant>,
    error: Option<PortalError>,
    failures: u32,
    failed_at: Option<Instant>,
    in_flight: Option<(u64, SharedFetch<V>)>,
    tx: watch::Sender<QuerySnapshot<V>>,
}

impl<V: Clone> Entry<V> {
    fn new() -> Self {
        let (tx, _) = watch::channel(QuerySnapshot::empty());
        Self {
            value: None,
            fetched_at: None,
            error: None,
            failures: 0,
            failed_at: None,
            in_flight: None,
            tx,
        }
    }

    fn may_fetch_after_failure(&self, policy: QueryPolicy) -> bool {
        self.failures <= policy.retry_ceiling
    }

    /// A stale value past its retry ceiling is retried once a full freshness
    /// window has passed since the last failure.
    fn may_revalidate(&self, policy: QueryPolicy, now: Instant) -> bool {
        self.may_fetch_after_failure(policy)
            || self
                .failed_at
                .is_some_and(|at| !policy.freshness.is_fresh(now.saturating_duration_since(at)))
    }

    fn is_fresh(&self, policy: QueryPolicy, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|at| policy.freshness.is_fresh(now.saturating_duration_since(at)))
    }

    fn reset(&mut self) {
        self.value = None;
        self.fetched_at = None;
        self.error = None;
        self.failures = 0;
        self.failed_at = None;
        self.in_flight = None;
    }

    fn publish(&self) {
        let status = if self.in_flight.is_some() {
            QueryStatus::Fetching
        } else if self.value.is_some() {
            QueryStatus::Ready
        } else if self.error.is_some() {
            QueryStatus::Failed
        } else {
            QueryStatus::Empty
        };
        self.tx.send_replace(QuerySnapshot {
            status,
            data: self.value.clone(),
            error: self.error.clone(),
            updated_at: self.fetched_at,
        });
    }
}

struct Inner<V> {
    entries: HashMap<ResourceKey, Entry<V>>,
    next_generation: u64,
}

enum ReadPlan<V> {
    Serve(V),
    Join(SharedFetch<V>),
    Fail(PortalError),
}

/// Cache entries of one value type, keyed by [`ResourceKey`].
pub struct QueryStore<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for QueryStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryStore<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_generation: 0,
            })),
        }
    }
}

impl<V> QueryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key`, fetching with `fetch` when needed.
    ///
    /// - Fresh value: served, `fetch` is not called.
    /// - Stale value: served immediately, and a background refetch starts
    ///   unless one is running or the key has used up its retries.
    /// - No value: joins the running fetch or starts one. A failed key past
    ///   its retry ceiling returns the stored error until invalidated.
    ///
    /// # Errors
    /// The fetch error, shared by every reader that joined the same fetch.
    pub async fn read<F, Fut>(
        &self,
        key: &ResourceKey,
        policy: QueryPolicy,
        fetch: F,
    ) -> Result<V, PortalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        match self.plan(key, policy, fetch) {
            ReadPlan::Serve(value) => Ok(value),
            ReadPlan::Fail(err) => Err(err),
            ReadPlan::Join(fetch) => fetch.await,
        }
    }

    fn plan<F, Fut>(&self, key: &ResourceKey, policy: QueryPolicy, fetch: F) -> ReadPlan<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let Inner {
            entries,
            next_generation,
        } = &mut *guard;
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

        if let Some(value) = entry.value.clone() {
            if entry.is_fresh(policy, now) {
                tracing::debug!(key = %key, "cache hit");
                return ReadPlan::Serve(value);
            }
            if entry.in_flight.is_none() && entry.may_revalidate(policy, now) {
                tracing::debug!(key = %key, "stale; revalidating in background");
                *next_generation += 1;
                self.start_fetch(key, entry, *next_generation, fetch);
            }
            return ReadPlan::Serve(value);
        }

        if let Some((_, running)) = &entry.in_flight {
            tracing::debug!(key = %key, "joining in-flight fetch");
            return ReadPlan::Join(running.clone());
        }

        if let Some(err) = &entry.error
            && !entry.may_fetch_after_failure(policy)
        {
            tracing::debug!(key = %key, failures = entry.failures, "retry ceiling reached");
            return ReadPlan::Fail(err.clone());
        }

        *next_generation += 1;
        ReadPlan::Join(self.start_fetch(key, entry, *next_generation, fetch))
    }

    fn start_fetch<F, Fut>(
        &self,
        key: &ResourceKey,
        entry: &mut Entry<V>,
        generation: u64,
        fetch: F,
    ) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        tracing::debug!(key = %key, generation, "starting fetch");
        let store = self.clone();
        let task_key = key.clone();
        let fut = fetch();

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(PortalError::Transport {
                        message: "fetch panicked".to_owned(),
                    })
                });
            store.complete(&task_key, generation, &result);
            result
        });

        let shared = async move {
            handle.await.unwrap_or_else(|err| {
                Err(PortalError::Transport {
                    message: format!("fetch task failed: {err}"),
                })
            })
        }
        .boxed()
        .shared();

        entry.in_flight = Some((generation, shared.clone()));
        entry.publish();
        shared
    }

    fn complete(&self, key: &ResourceKey, generation: u64, result: &Result<V, PortalError>) {
        let mut guard = self.inner.lock();
        let Some(entry) = guard.entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.as_ref().map(|(g, _)| *g) != Some(generation) {
            tracing::debug!(key = %key, generation, "discarding superseded fetch result");
            return;
        }

        entry.in_flight = None;
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.fetched_at = Some(Instant::now());
                entry.error = None;
                entry.failures = 0;
                entry.failed_at = None;
            }
            Err(err) => {
                entry.failures = entry.failures.saturating_add(1);
                entry.failed_at = Some(Instant::now());
                tracing::debug!(key = %key, failures = entry.failures, error = %err, "fetch failed");
                entry.error = Some(err.clone());
            }
        }
        entry.publish();
    }

    /// Replace the value of `key` in one step, superseding any running fetch.
    pub fn set(&self, key: &ResourceKey, value: V) {
        let mut guard = self.inner.lock();
        let entry = guard.entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.value = Some(value);
        entry.fetched_at = Some(Instant::now());
        entry.error = None;
        entry.failures = 0;
        entry.failed_at = None;
        entry.in_flight = None;
        entry.publish();
    }

    /// Return `key` to empty. The next read fetches in the foreground.
    pub fn invalidate(&self, key: &ResourceKey) {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.entries.get_mut(key) {
            tracing::debug!(key = %key, "invalidated");
            entry.reset();
            entry.publish();
        }
    }

    /// Return every key to empty. Subscribers stay attached.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        for entry in guard.entries.values_mut() {
            entry.reset();
            entry.publish();
        }
    }

    /// Cached value of `key`, fresh or not.
    #[must_use]
    pub fn peek(&self, key: &ResourceKey) -> Option<V> {
        self.inner
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    /// Whether a read of `key` right now would be served without a fetch.
    #[must_use]
    pub fn is_fresh(&self, key: &ResourceKey, policy: QueryPolicy) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_some() && entry.is_fresh(policy, now))
    }

    /// Consecutive failed fetches of `key`.
    #[must_use]
    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.inner
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.failures)
    }

    /// Error of the last fetch of `key`, cleared by a success.
    #[must_use]
    pub fn last_error(&self, key: &ResourceKey) -> Option<PortalError> {
        self.inner
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.error.clone())
    }

    /// Watch state changes of `key`, starting from its current snapshot.
    #[must_use]
    pub fn subscribe(&self, key: &ResourceKey) -> watch::Receiver<QuerySnapshot<V>> {
        let mut guard = self.inner.lock();
        guard
            .entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .tx
            .subscribe()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoizing cache.

use std::{
    fmt::{self, Debug},
    panic::AssertUnwindSafe,
    sync::{Arc, Weak},
};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tick::Clock;

use crate::{
    CacheStats, ResolveOptions, Ttl,
    builder::MemoCacheBuilder,
    flight::{Flight, Outcome, Resolve, panic_message},
    table::{Lookup, Table},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Type alias for cache names used in telemetry.
pub type CacheName = &'static str;

/// An async result cache that runs each keyed operation at most once per validity window.
///
/// Each call to [`resolve`](Self::resolve) takes a key and a producer. The first
/// caller for an absent key starts the producer; callers that arrive while it is in
/// flight attach to the same operation and observe the same value or error. A
/// successful value is kept until its [`Ttl`] runs out, it is invalidated, or it is
/// pushed out by newer values once the cache holds `max_size` of them. Failures
/// are handed to every attached caller and then forgotten, so the next call retries.
///
/// The cache is cheap to clone; clones share the same entries.
///
/// # Examples
///
/// ```
/// use memoflight::MemoCache;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = MemoCache::builder::<String, std::io::ErrorKind>(Clock::new_frozen())
///     .max_size(50)
///     .build();
///
/// let lectures = cache
///     .resolve("lectures:major", || async { Ok("CS101, CS102".to_string()) })
///     .await?;
/// assert_eq!(lectures, "CS101, CS102");
///
/// // The second call is served from the cache; the producer is not invoked.
/// let again = cache
///     .resolve("lectures:major", || async { Ok("never fetched".to_string()) })
///     .await?;
/// assert_eq!(again, lectures);
/// # Ok::<(), std::io::ErrorKind>(())
/// # });
/// ```
pub struct MemoCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

struct Inner<V, E> {
    name: CacheName,
    clock: Clock,
    default_ttl: Ttl,
    telemetry: CacheTelemetry,
    table: Mutex<Table<V, Flight<V, E>>>,
}

impl MemoCache<(), ()> {
    /// Creates a new cache builder.
    ///
    /// The clock drives entry expiry. Use `Clock::new_tokio()` (or any other clock)
    /// in production and a `ClockControl` clock in tests.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use memoflight::MemoCache;
    /// use tick::Clock;
    ///
    /// let cache = MemoCache::builder::<String, String>(Clock::new_frozen())
    ///     .name("lectures")
    ///     .default_ttl(Duration::from_secs(60))
    ///     .build();
    /// assert_eq!(cache.name(), "lectures");
    /// ```
    #[must_use]
    pub fn builder<V, E>(clock: Clock) -> MemoCacheBuilder<V, E> {
        MemoCacheBuilder::new(clock)
    }
}

impl<V, E> MemoCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: CacheName, clock: Clock, max_size: usize, default_ttl: Ttl, telemetry: CacheTelemetry) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                clock,
                default_ttl,
                telemetry,
                table: Mutex::new(Table::new(max_size)),
            }),
        }
    }

    /// Returns the value for `key`, running `producer` only if no usable entry exists.
    ///
    /// Uses the cache's default TTL. See [`resolve_with`](Self::resolve_with) for
    /// the full contract.
    pub fn resolve<F, Fut>(&self, key: &str, producer: F) -> Resolve<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.resolve_with(key, producer, ResolveOptions::new())
    }

    /// Returns the value for `key`, running `producer` only if no usable entry exists.
    ///
    /// The lookup happens when this method is called, not when the returned future is
    /// first polled:
    ///
    /// 1. A fresh stored value is returned without invoking `producer` (a hit).
    /// 2. If an operation for `key` is in flight, the returned future attaches to it
    ///    and `producer` is dropped unused.
    /// 3. Otherwise a new operation is registered for `key` and `producer` is invoked
    ///    once, when the operation is first polled. A stale value is discarded first.
    ///
    /// On success the value is stored with the TTL from `options` (or the cache
    /// default). On failure the entry is removed and the producer's error is returned
    /// to every attached caller unchanged.
    ///
    /// The returned future does not borrow the cache and can be moved to another task.
    pub fn resolve_with<F, Fut>(&self, key: &str, producer: F, options: ResolveOptions) -> Resolve<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner = &self.inner;
        let now = inner.clock.instant();
        let mut table = inner.table.lock();

        match table.lookup(key, now) {
            Lookup::Hit(value) => {
                drop(table);
                inner.record(CacheActivity::Hit, key);
                Resolve::hit(value)
            }
            Lookup::InFlight(flight) => {
                drop(table);
                inner.record(CacheActivity::Coalesced, key);
                Resolve::joined(flight)
            }
            Lookup::Absent { stale } => {
                let id = table.next_id();
                let flight = self.launch(key.to_owned(), id, producer);
                let replaced = table.insert_pending(key.to_owned(), id, options.ttl_or(inner.default_ttl), flight.clone());
                drop(table);
                drop(replaced);

                if stale.is_some() {
                    inner.record(CacheActivity::Expired, key);
                }
                inner.record(CacheActivity::Miss, key);
                Resolve::joined(flight)
            }
        }
    }

    /// Wraps `producer` into the shared operation for pending slot `id`.
    ///
    /// The producer runs outside the table lock. Its completion commits the slot
    /// before any attached caller observes the outcome.
    fn launch<F, Fut>(&self, key: String, id: u64, producer: F) -> Flight<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let cache = Arc::downgrade(&self.inner);
        async move {
            let outcome = match AssertUnwindSafe(async move { producer().await }).catch_unwind().await {
                Ok(Ok(value)) => Outcome::Value(value),
                Ok(Err(error)) => Outcome::Failed(error),
                Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
            };
            settle(&cache, &key, id, &outcome);
            outcome
        }
        .boxed()
        .shared()
    }

    /// Returns the stored value for `key` if it is ready and fresh.
    ///
    /// Never invokes a producer and does not count as a hit or miss. A stale value
    /// is not returned; it is removed by the next `resolve` or [`purge_expired`](Self::purge_expired).
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.instant();
        self.inner.table.lock().peek(key, now)
    }

    /// Removes the entry for `key`, whether ready or in flight.
    ///
    /// Callers already attached to an in-flight operation still receive its outcome,
    /// but the outcome is not stored. Returns `false` if there was no entry.
    pub fn invalidate(&self, key: &str) -> bool {
        let (removed, size) = {
            let mut table = self.inner.table.lock();
            (table.remove(key), table.len())
        };
        let found = removed.is_some();

        if found {
            self.inner
                .telemetry
                .record(self.inner.name, CacheOperation::Invalidate, CacheActivity::Invalidated, key);
            self.inner.telemetry.record_size(self.inner.name, size);
        }
        found
    }

    /// Removes every entry whose key starts with `prefix` and returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let (removed, size) = {
            let mut table = self.inner.table.lock();
            (table.remove_prefix(prefix), table.len())
        };

        if !removed.is_empty() {
            self.inner
                .record_bulk(CacheOperation::InvalidatePrefix, CacheActivity::Invalidated, removed.len());
            self.inner.telemetry.record_size(self.inner.name, size);
        }
        removed.len()
    }

    /// Removes all entries.
    ///
    /// In-flight operations keep running for the callers attached to them, but their
    /// outcomes are no longer stored.
    pub fn clear(&self) {
        let removed = self.inner.table.lock().clear();

        if !removed.is_empty() {
            self.inner.record_bulk(CacheOperation::Clear, CacheActivity::Cleared, removed.len());
            self.inner.telemetry.record_size(self.inner.name, 0);
        }
    }

    /// Drops every stored value whose TTL has run out and returns how many were dropped.
    ///
    /// Expiry is otherwise checked lazily on lookup; call this periodically to release
    /// memory held by keys that are no longer requested.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.instant();
        let (removed, size) = {
            let mut table = self.inner.table.lock();
            (table.purge_expired(now), table.len())
        };

        if !removed.is_empty() {
            self.inner.record_bulk(CacheOperation::Purge, CacheActivity::Expired, removed.len());
            self.inner.telemetry.record_size(self.inner.name, size);
        }
        removed.len()
    }

    /// Returns a snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.table.lock().stats()
    }

    /// Returns the number of entries, in-flight ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.table.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of stored values.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.inner.table.lock().max_size()
    }

    /// Returns the TTL applied when a call does not override it.
    #[must_use]
    pub fn default_ttl(&self) -> Ttl {
        self.inner.default_ttl
    }
}

impl<V, E> MemoCache<V, E> {
    /// Returns the name of this cache for telemetry identification.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// Returns the clock used for expiry checks.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

impl<V, E> Inner<V, E> {
    fn record(&self, activity: CacheActivity, key: &str) {
        self.telemetry.record(self.name, CacheOperation::Resolve, activity, key);
    }

    fn record_bulk(&self, operation: CacheOperation, activity: CacheActivity, count: usize) {
        self.telemetry.record_bulk(self.name, operation, activity, count);
    }
}

/// Commits the outcome of pending slot `id`, unless the cache is gone or the slot
/// was invalidated or replaced in the meantime.
fn settle<V, E>(cache: &Weak<Inner<V, E>>, key: &str, id: u64, outcome: &Outcome<V, E>)
where
    V: Clone,
    E: Clone,
{
    let Some(inner) = cache.upgrade() else {
        return;
    };

    match outcome {
        Outcome::Value(value) => {
            let now = inner.clock.instant();
            let (committed, size) = {
                let mut table = inner.table.lock();
                let committed = table.complete(key, id, value.clone(), now);
                (committed, table.len())
            };

            if committed.stored {
                inner.record(CacheActivity::Inserted, key);
                for (evicted, _) in &committed.evicted {
                    inner.record(CacheActivity::Evicted, evicted);
                }
                inner.telemetry.record_size(inner.name, size);
            }
        }
        Outcome::Failed(_) | Outcome::Panicked(_) => {
            let (abandoned, size) = {
                let mut table = inner.table.lock();
                (table.abandon(key, id), table.len())
            };
            let activity = if matches!(outcome, Outcome::Failed(_)) {
                CacheActivity::Failed
            } else {
                CacheActivity::Panicked
            };
            inner.record(activity, key);
            if abandoned.is_some() {
                inner.telemetry.record_size(inner.name, size);
            }
        }
    }
}

impl<V, E> Clone for MemoCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Debug for MemoCache<V, E>
where
    V: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("name", &self.inner.name)
            .field("default_ttl", &self.inner.default_ttl)
            .field("stats", &self.inner.table.lock().stats())
            .finish_non_exhaustive()
    }
}

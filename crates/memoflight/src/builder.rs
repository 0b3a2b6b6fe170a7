// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`MemoCache`].

use std::{fmt::Debug, marker::PhantomData};

use tick::Clock;

use crate::{MemoCache, Ttl, cache::CacheName, telemetry::CacheTelemetry};

/// Number of stored values a cache keeps unless configured otherwise.
pub const DEFAULT_MAX_SIZE: usize = 100;

const DEFAULT_NAME: CacheName = "memoflight";

/// Builder for constructing a [`MemoCache`].
///
/// Created by calling [`MemoCache::builder`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::MemoCache;
/// use tick::Clock;
///
/// let cache = MemoCache::builder::<u64, String>(Clock::new_frozen())
///     .name("departures")
///     .max_size(10)
///     .default_ttl(Duration::from_secs(30))
///     .build();
/// assert_eq!(cache.max_size(), 10);
/// ```
#[derive(Debug)]
pub struct MemoCacheBuilder<V, E> {
    name: CacheName,
    clock: Clock,
    max_size: usize,
    default_ttl: Ttl,
    telemetry: CacheTelemetry,
    _phantom: PhantomData<fn() -> (V, E)>,
}

impl<V, E> MemoCacheBuilder<V, E> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: DEFAULT_NAME,
            clock,
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: Ttl::Unbounded,
            telemetry: CacheTelemetry::default(),
            _phantom: PhantomData,
        }
    }

    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Sets how many completed values the cache keeps before evicting the oldest.
    ///
    /// In-flight operations do not count against this limit.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        assert!(max_size > 0, "max_size must be at least 1");
        self.max_size = max_size;
        self
    }

    /// Sets the TTL applied to values whose `resolve` call does not override it.
    ///
    /// Accepts a [`Ttl`] or a [`Duration`](std::time::Duration).
    #[must_use]
    pub fn default_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    /// Emits a `tracing` event for every cache activity.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn logs(mut self) -> Self {
        self.telemetry = self.telemetry.with_logs();
        self
    }

    /// Records cache activity and size through OpenTelemetry instruments.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        let meter = crate::telemetry::metrics::create_meter(meter_provider);
        self.telemetry = self.telemetry.with_meter(&meter);
        self
    }
}

impl<V, E> MemoCacheBuilder<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> MemoCache<V, E> {
        MemoCache::new(self.name, self.clock, self.max_size, self.default_ttl, self.telemetry)
    }
}

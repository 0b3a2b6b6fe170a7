// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry.
//!
//! With the `logs` feature, cache activity is emitted as structured `tracing` events.
//! With the `metrics` feature, it is also counted through OpenTelemetry instruments.
//! Both are opt-in per cache through the builder; a cache built without them records
//! nothing.

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

use crate::cache::CacheName;

#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetry {
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Resolve,
    Invalidate,
    InvalidatePrefix,
    Clear,
    Purge,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "cache.resolve",
            Self::Invalidate => "cache.invalidate",
            Self::InvalidatePrefix => "cache.invalidate_prefix",
            Self::Clear => "cache.clear",
            Self::Purge => "cache.purge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Coalesced,
    Expired,
    Inserted,
    Evicted,
    Failed,
    Panicked,
    Invalidated,
    Cleared,
}

#[cfg(any(feature = "logs", test))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Coalesced => "cache.coalesced",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Evicted => "cache.evicted",
            Self::Failed => "cache.failed",
            Self::Panicked => "cache.panicked",
            Self::Invalidated => "cache.invalidated",
            Self::Cleared => "cache.cleared",
        }
    }

    #[cfg(any(feature = "logs", test))]
    pub fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Coalesced => Severity::Debug,
            Self::Expired | Self::Inserted | Self::Evicted | Self::Invalidated | Self::Cleared => Severity::Info,
            Self::Failed | Self::Panicked => Severity::Error,
        }
    }
}

impl CacheTelemetry {
    /// Enables structured `tracing` events.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn with_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Enables OpenTelemetry instruments created from `meter`.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn with_meter(self, meter: &opentelemetry::metrics::Meter) -> Self {
        Self {
            instruments: Some(metrics::Instruments::new(meter)),
            ..self
        }
    }

    /// Records one activity concerning a single key.
    #[allow(unused_variables, reason = "No-op when telemetry is disabled")]
    pub fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, key: &str) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments.record(cache_name, operation, activity, 1);
        }

        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            Self::emit(cache_name, operation, activity, Subject::Key(key));
        }
    }

    /// Records an activity that affected `count` entries at once.
    #[allow(unused_variables, reason = "No-op when telemetry is disabled")]
    pub fn record_bulk(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments.record(cache_name, operation, activity, count as u64);
        }

        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            Self::emit(cache_name, operation, activity, Subject::Count(count));
        }
    }

    /// Records the current number of entries.
    #[allow(unused_variables, reason = "No-op when telemetry is disabled")]
    pub fn record_size(&self, cache_name: CacheName, size: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments.record_size(cache_name, size as u64);
        }
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, subject: Subject<'_>) {
        let op = operation.as_str();
        let act = activity.as_str();

        // Tracing levels must be constant, so the macro picks the level per arm.
        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                match subject {
                    Subject::Key(key) => tracing::$level!(
                        cache.name = cache_name,
                        cache.operation = op,
                        cache.activity = act,
                        cache.key = key,
                        "cache.event"
                    ),
                    Subject::Count(count) => tracing::$level!(
                        cache.name = cache_name,
                        cache.operation = op,
                        cache.activity = act,
                        cache.count = count,
                        "cache.event"
                    ),
                }
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

#[cfg(any(feature = "logs", test))]
#[derive(Debug, Clone, Copy)]
enum Subject<'a> {
    Key(&'a str),
    Count(usize),
}

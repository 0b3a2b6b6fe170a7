// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expiry budgets and per-call resolve options.

use std::time::{Duration, Instant};

/// How long a resolved value stays fresh.
///
/// A value is fresh while `now - created_at < ttl`. [`Ttl::Unbounded`] values never
/// expire and leave the cache only through invalidation or eviction.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::Ttl;
///
/// let ttl: Ttl = Duration::from_secs(30).into();
/// assert_eq!(ttl, Ttl::After(Duration::from_secs(30)));
/// assert_eq!(Ttl::default(), Ttl::Unbounded);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ttl {
    /// The value never expires.
    #[default]
    Unbounded,
    /// The value expires once it is at least this old.
    After(Duration),
}

impl Ttl {
    /// Returns `true` if a value created at `created_at` is stale at `now`.
    #[must_use]
    pub fn is_expired(self, created_at: Instant, now: Instant) -> bool {
        match self {
            Self::Unbounded => false,
            Self::After(ttl) => now.saturating_duration_since(created_at) >= ttl,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(value: Duration) -> Self {
        Self::After(value)
    }
}

/// Options for a single [`resolve_with`](crate::MemoCache::resolve_with) call.
///
/// Options only apply when the call starts a new operation. Callers that hit a
/// cached value or attach to an in-flight operation inherit the settings of the
/// caller that created the entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    ttl: Option<Ttl>,
}

impl ResolveOptions {
    /// Creates options that defer to the cache defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cache's default TTL for the entry this call creates.
    #[must_use]
    pub fn ttl(self, ttl: impl Into<Ttl>) -> Self {
        Self { ttl: Some(ttl.into()) }
    }

    pub(crate) fn ttl_or(&self, default: Ttl) -> Ttl {
        self.ttl.unwrap_or(default)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A point-in-time snapshot of cache counters.
///
/// `hits` counts `resolve` calls answered from a fresh stored value. Every other
/// `resolve` call is a miss, including callers that attached to an operation
/// already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries, pending ones included.
    pub size: usize,
    /// Number of entries whose operation is still in flight.
    pub pending: usize,
    /// Number of `resolve` calls served from a stored value.
    pub hits: u64,
    /// Number of `resolve` calls that started or joined an operation.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of `resolve` calls that were hits, or `None` before the first call.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "ratio does not need full u64 precision")]
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

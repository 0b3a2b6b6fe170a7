// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! An async memoizing cache with request coalescing.
//!
//! [`MemoCache`] stores the results of keyed async operations. It guarantees that
//! for any key at most one operation is in flight at a time: concurrent callers for
//! the same key share the one operation and all observe its value or its error.
//!
//! - Successful values are kept until their [`Ttl`] runs out, they are invalidated,
//!   or the cache holds more completed values than its `max_size`, at which point the
//!   oldest completed values are evicted first.
//! - Failures are never stored. Every caller attached to the failing operation gets
//!   the producer's error unchanged and the next call starts a fresh operation.
//! - Invalidation works per key, per key prefix (see [`CacheKey`]), or for the whole
//!   cache. An in-flight operation removed this way still completes for its callers,
//!   but its outcome is not stored.
//!
//! Time is read from an injected [`tick::Clock`], so expiry can be tested
//! deterministically with `tick::ClockControl`.
//!
//! # Examples
//!
//! ```
//! use std::sync::{
//!     Arc,
//!     atomic::{AtomicUsize, Ordering},
//! };
//!
//! use memoflight::MemoCache;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let cache = MemoCache::builder::<Vec<String>, String>(Clock::new_frozen()).build();
//! let fetches = Arc::new(AtomicUsize::new(0));
//!
//! let fetch = |fetches: Arc<AtomicUsize>| {
//!     move || async move {
//!         fetches.fetch_add(1, Ordering::SeqCst);
//!         Ok(vec!["Algorithms".to_string(), "Compilers".to_string()])
//!     }
//! };
//!
//! // Both calls are issued before either completes; the fetch runs once.
//! let first = cache.resolve("lectures:major", fetch(Arc::clone(&fetches)));
//! let second = cache.resolve("lectures:major", fetch(Arc::clone(&fetches)));
//! let (first, second) = futures::join!(first, second);
//!
//! assert_eq!(first, second);
//! assert_eq!(fetches.load(Ordering::SeqCst), 1);
//! assert_eq!(cache.stats().size, 1);
//! # });
//! ```
//!
//! # Features
//!
//! - `logs` (default): enables [`MemoCacheBuilder::logs`], which emits a `tracing`
//!   event for every cache activity.
//! - `metrics`: enables `MemoCacheBuilder::metrics`, which counts cache activity and
//!   reports the cache size through OpenTelemetry.

pub mod builder;
pub mod cache;
mod flight;
mod key;
mod options;
mod stats;
mod table;
mod telemetry;

#[doc(inline)]
pub use builder::{DEFAULT_MAX_SIZE, MemoCacheBuilder};
#[doc(inline)]
pub use cache::{CacheName, MemoCache};
pub use flight::Resolve;
pub use key::CacheKey;
pub use options::{ResolveOptions, Ttl};
pub use stats::CacheStats;

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for value expiry.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memoflight::{MemoCache, ResolveOptions, Ttl};
use tick::ClockControl;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

/// Returns a producer that counts its invocations and yields the new count.
fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<Result<usize, String>> + Send + 'static {
    let counter = Arc::clone(counter);
    move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
}

#[test]
fn value_is_reused_within_ttl_and_refetched_after() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock())
        .default_ttl(Duration::from_millis(100))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));

    control.advance(Duration::from_millis(50));
    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    control.advance(Duration::from_millis(100));
    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.size, 1);
}

#[test]
fn value_expires_exactly_at_ttl() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock())
        .default_ttl(Duration::from_millis(100))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));
    control.advance(Duration::from_millis(99));
    assert_eq!(cache.peek("timetable"), Some(1));
    control.advance(Duration::from_millis(1));
    assert_eq!(cache.peek("timetable"), None);
}

#[test]
fn ttl_counts_from_completion() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock())
        .default_ttl(Duration::from_millis(100))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    // Registered now, but the producer only completes when polled 80ms later.
    let pending = cache.resolve("timetable", counting(&calls));
    control.advance(Duration::from_millis(80));
    assert_eq!(block_on(pending), Ok(1));

    control.advance(Duration::from_millis(80));
    assert_eq!(cache.peek("timetable"), Some(1));
}

#[test]
fn unbounded_values_never_expire() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock()).build();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));
    control.advance(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));
}

#[test]
fn per_call_ttl_overrides_default() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock())
        .default_ttl(Duration::from_secs(60))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    let short = ResolveOptions::new().ttl(Duration::from_millis(10));
    let forever = ResolveOptions::new().ttl(Ttl::Unbounded);

    assert_eq!(block_on(cache.resolve_with("short", counting(&calls), short)), Ok(1));
    assert_eq!(block_on(cache.resolve_with("forever", counting(&calls), forever)), Ok(2));
    assert_eq!(block_on(cache.resolve("default", counting(&calls))), Ok(3));

    control.advance(Duration::from_millis(10));
    assert_eq!(cache.peek("short"), None);
    assert_eq!(cache.peek("default"), Some(3));

    control.advance(Duration::from_secs(60));
    assert_eq!(cache.peek("default"), None);
    assert_eq!(cache.peek("forever"), Some(2));
}

#[test]
fn expired_entry_is_replaced_by_fresh_operation() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock())
        .default_ttl(Duration::from_millis(100))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(block_on(cache.resolve("timetable", counting(&calls))), Ok(1));
    control.advance(Duration::from_millis(150));

    let refetch = cache.resolve("timetable", counting(&calls));
    assert!(!refetch.is_hit());
    assert_eq!(cache.stats().pending, 1);
    assert_eq!(block_on(refetch), Ok(2));
}

#[test]
fn purge_drops_only_stale_values() {
    let control = ClockControl::new();
    let cache = MemoCache::builder::<usize, String>(control.to_clock()).build();
    let calls = Arc::new(AtomicUsize::new(0));

    let short = ResolveOptions::new().ttl(Duration::from_millis(10));
    assert_eq!(block_on(cache.resolve_with("a", counting(&calls), short)), Ok(1));
    assert_eq!(block_on(cache.resolve_with("b", counting(&calls), short)), Ok(2));
    assert_eq!(block_on(cache.resolve("c", counting(&calls))), Ok(3));
    let pending = cache.resolve_with("d", counting(&calls), short);

    control.advance(Duration::from_millis(20));
    assert_eq!(cache.purge_expired(), 2);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().pending, 1);
    assert_eq!(cache.purge_expired(), 0);

    assert_eq!(block_on(pending), Ok(4));
    assert_eq!(cache.peek("d"), Some(4));
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A timetable data layer that loads major and liberal-arts lecture lists in
//! parallel through one cache. Several screens asking for the same list at the
//! same time trigger a single backend request per list.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use memoflight::{CacheKey, MemoCache, Resolve};
use tick::Clock;

#[ohno::error]
#[display("failed to load lectures from {endpoint}")]
struct LectureError {
    endpoint: String,
}

type Lectures = Arc<Vec<String>>;
type LectureCache = MemoCache<Lectures, Arc<LectureError>>;

/// Stands in for the HTTP client; counts requests so the effect of caching is visible.
#[derive(Debug, Clone)]
struct Backend {
    requests: Arc<AtomicU32>,
    clock: Clock,
}

impl Backend {
    async fn fetch(&self, endpoint: &str) -> Result<Lectures, Arc<LectureError>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.clock.delay(Duration::from_millis(50)).await;

        match endpoint {
            "/lectures/major" => Ok(Arc::new(vec!["Algorithms".to_string(), "Compilers".to_string()])),
            "/lectures/liberal-arts" => Ok(Arc::new(vec!["Philosophy".to_string(), "Art History".to_string()])),
            _ => Err(Arc::new(LectureError::new(endpoint))),
        }
    }
}

fn lectures(cache: &LectureCache, backend: &Backend, kind: &'static str) -> Resolve<Lectures, Arc<LectureError>> {
    let key = CacheKey::new("lectures").segment(kind);
    let backend = backend.clone();
    cache.resolve(key.as_str(), move || async move { backend.fetch(&format!("/lectures/{kind}")).await })
}

/// Loads both lecture lists in parallel; each list is requested at most once.
async fn all_lectures(cache: &LectureCache, backend: &Backend) -> Result<Vec<String>, Arc<LectureError>> {
    let (major, liberal_arts) = tokio::join!(
        lectures(cache, backend, "major"),
        lectures(cache, backend, "liberal-arts"),
    );
    Ok(major?.iter().chain(liberal_arts?.iter()).cloned().collect())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Clock::new_tokio();
    let backend = Backend {
        requests: Arc::new(AtomicU32::new(0)),
        clock: clock.clone(),
    };
    let cache: LectureCache = MemoCache::builder(clock)
        .name("timetable")
        .default_ttl(Duration::from_secs(300))
        .logs()
        .build();

    // Three screens open at once and all ask for the full lecture list.
    let screens: Vec<_> = (0..3)
        .map(|_| {
            let cache = cache.clone();
            let backend = backend.clone();
            tokio::spawn(async move { all_lectures(&cache, &backend).await })
        })
        .collect();

    for screen in screens {
        match screen.await {
            Ok(Ok(lectures)) => println!("screen loaded {} lectures", lectures.len()),
            Ok(Err(error)) => println!("screen failed: {error}"),
            Err(error) => println!("screen task failed: {error}"),
        }
    }
    println!("backend requests: {}", backend.requests.load(Ordering::Relaxed));

    // Failures are not cached: both calls below reach the backend.
    for _ in 0..2 {
        if let Err(error) = lectures(&cache, &backend, "unknown").await {
            println!("lookup failed: {error}");
        }
    }
    println!("backend requests: {}", backend.requests.load(Ordering::Relaxed));

    // Dropping the lecture family forces the next screen to refetch.
    let dropped = cache.invalidate_prefix(&CacheKey::new("lectures").prefix());
    println!("invalidated {dropped} entries, stats: {:?}", cache.stats());
}

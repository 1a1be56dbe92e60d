//! Bot-list fetcher and update coordinator (§4.2), at the contract level.
//!
//! The actual network calls (AWS/GCP/Azure IP ranges, isbot, Matomo, Cloudflare,
//! scanner-UA lists, ...) are an external collaborator's concern; this module
//! defines the `ListSource` trait those collaborators implement, plus the
//! coordinator that fans out to them, merges results, and feeds the compile
//! cache — fail-safe, so the engine always has a non-empty pattern set even
//! if every external source is down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::PatternCache;

/// One external bot/IP list source.
///
/// Implementors perform the actual HTTP fetch; this crate only defines the
/// contract and the merge/backoff policy around it.
pub trait ListSource: Send + Sync {
    /// Stable name used in logs and health reporting.
    fn name(&self) -> &str;

    /// Fetch and return newline-delimited UA patterns or CIDR strings,
    /// depending on `kind()`. Implementors should themselves honor
    /// `request_timeout_ms`; the coordinator additionally enforces a total
    /// fan-out budget.
    fn fetch(&self) -> Result<Vec<String>, String>;

    fn kind(&self) -> ListKind;
}

/// What a source's fetched lines represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    UaPattern,
    Cidr,
}

/// Embedded fallback list, always merged in after remote fetches so
/// canonical tools are represented even with every external source down.
pub struct EmbeddedListSource {
    name: &'static str,
    kind: ListKind,
    entries: Vec<String>,
}

impl EmbeddedListSource {
    #[must_use]
    pub fn new(name: &'static str, kind: ListKind, entries: Vec<String>) -> Self {
        Self { name, kind, entries }
    }
}

impl ListSource for EmbeddedListSource {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch(&self) -> Result<Vec<String>, String> {
        Ok(self.entries.clone())
    }

    fn kind(&self) -> ListKind {
        self.kind
    }
}

/// Per-source health tracking: consecutive-failure counter drives
/// exponential backoff (×1.5) up to the configured update interval.
struct SourceHealth {
    consecutive_failures: AtomicU32,
}

impl SourceHealth {
    fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) < 3
    }

    fn backoff(&self, base: Duration, cap: Duration) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        let factor = 1.5f64.powi(failures as i32);
        let scaled = base.mul_f64(factor);
        scaled.min(cap)
    }
}

/// Periodic parallel download-and-merge coordinator.
///
/// Deduplication is case-insensitive for both UA patterns and CIDR strings.
/// `update_all_lists_parallel` always updates `last_successful_update` if at
/// least one source of a given kind succeeded, even when others failed.
pub struct ListCoordinator {
    sources: Vec<Box<dyn ListSource>>,
    health: Vec<SourceHealth>,
    last_successful_update_unix_ms: AtomicU64,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl ListCoordinator {
    #[must_use]
    pub fn new(sources: Vec<Box<dyn ListSource>>, update_interval: Duration) -> Self {
        let health = sources.iter().map(|_| SourceHealth::new()).collect();
        Self {
            sources,
            health,
            last_successful_update_unix_ms: AtomicU64::new(0),
            base_backoff: Duration::from_secs(1),
            max_backoff: update_interval,
        }
    }

    /// Health snapshot keyed by source name.
    #[must_use]
    pub fn health_report(&self) -> Vec<(String, bool)> {
        self.sources
            .iter()
            .zip(&self.health)
            .map(|(source, health)| (source.name().to_string(), health.is_healthy()))
            .collect()
    }

    /// Current backoff a source would currently observe, given its health.
    #[must_use]
    pub fn current_backoff(&self, source_index: usize) -> Option<Duration> {
        self.health
            .get(source_index)
            .map(|h| h.backoff(self.base_backoff, self.max_backoff))
    }

    /// Run every source's fetch concurrently (one thread per source, scoped
    /// to this call), merge deduplicated (case-insensitively) results into
    /// the compile cache, and update health counters. Partial failures —
    /// including a source that panics — are counted, not propagated.
    pub fn update_all_lists_parallel(&self, cache: &PatternCache, unix_ms_now: u64) -> UpdateSummary {
        let fetched: Vec<(usize, Result<Vec<String>, String>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .sources
                .iter()
                .enumerate()
                .map(|(index, source)| {
                    scope.spawn(move || {
                        let outcome = catch_unwind(AssertUnwindSafe(|| source.fetch()));
                        (index, outcome.unwrap_or_else(|_| Err("list source fetch panicked".to_string())))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("list-source fetch thread itself panicked"))
                .collect()
        });

        let mut ua_patterns: Vec<String> = Vec::new();
        let mut cidrs: Vec<String> = Vec::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for (index, outcome) in fetched {
            let source = &self.sources[index];
            match outcome {
                Ok(entries) => {
                    self.health[index].record_success();
                    succeeded += 1;
                    match source.kind() {
                        ListKind::UaPattern => ua_patterns.extend(entries),
                        ListKind::Cidr => cidrs.extend(entries),
                    }
                }
                Err(error) => {
                    self.health[index].record_failure();
                    failed += 1;
                    tracing::warn!(source = source.name(), %error, "list source fetch failed");
                }
            }
        }

        let ua_patterns = dedup_case_insensitive(ua_patterns);
        let cidrs = dedup_case_insensitive(cidrs);

        cache.update_downloaded_patterns(
            ua_patterns
                .iter()
                .cloned()
                .map(|pattern| (pattern.clone(), pattern)),
        );
        cache.update_downloaded_cidr_ranges(cidrs.iter().cloned());

        if succeeded > 0 {
            self.last_successful_update_unix_ms
                .store(unix_ms_now, Ordering::Relaxed);
        }

        UpdateSummary {
            sources_succeeded: succeeded,
            sources_failed: failed,
            ua_patterns_merged: ua_patterns.len(),
            cidrs_merged: cidrs.len(),
        }
    }

    #[must_use]
    pub fn last_successful_update_unix_ms(&self) -> u64 {
        self.last_successful_update_unix_ms.load(Ordering::Relaxed)
    }
}

/// Outcome of one `update_all_lists_parallel` pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateSummary {
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub ua_patterns_merged: usize,
    pub cidrs_merged: usize,
}

fn dedup_case_insensitive(entries: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let key = entry.to_ascii_lowercase();
        if seen.insert(key) {
            out.push(entry);
        }
    }
    out
}

/// TTL-cached result wrapper used by `get_bot_patterns`/`get_datacenter_ip_ranges`/etc.
pub struct CachedResult<T> {
    inner: RwLock<Option<(T, std::time::Instant)>>,
    ttl: Duration,
}

impl<T: Clone> CachedResult<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(None),
            ttl,
        }
    }

    /// Return the cached value if still within TTL, else compute, cache, and
    /// return a fresh one.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> T {
        if let Some((value, fetched_at)) = self.inner.read().as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return value.clone();
            }
        }
        let value = compute();
        *self.inner.write() = Some((value.clone(), std::time::Instant::now()));
        value
    }
}

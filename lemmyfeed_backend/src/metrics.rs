//! Counters for data-integrity anomalies.
//!
//! The store tolerates duplicate rows where at most one was expected (the
//! first match wins), but each occurrence is counted here so the condition
//! stays observable instead of silently absorbed.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct IntegrityMetrics {
    pub duplicate_instances: AtomicU64,
    pub duplicate_sites: AtomicU64,
    pub duplicate_accounts: AtomicU64,
    pub duplicate_persons: AtomicU64,
    pub duplicate_posts: AtomicU64,
    pub duplicate_comments: AtomicU64,
    pub skipped_malformed_urls: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegritySnapshot {
    pub duplicate_instances: u64,
    pub duplicate_sites: u64,
    pub duplicate_accounts: u64,
    pub duplicate_persons: u64,
    pub duplicate_posts: u64,
    pub duplicate_comments: u64,
    pub skipped_malformed_urls: u64,
}

impl IntegrityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IntegritySnapshot {
        IntegritySnapshot {
            duplicate_instances: self.duplicate_instances.load(Ordering::Relaxed),
            duplicate_sites: self.duplicate_sites.load(Ordering::Relaxed),
            duplicate_accounts: self.duplicate_accounts.load(Ordering::Relaxed),
            duplicate_persons: self.duplicate_persons.load(Ordering::Relaxed),
            duplicate_posts: self.duplicate_posts.load(Ordering::Relaxed),
            duplicate_comments: self.duplicate_comments.load(Ordering::Relaxed),
            skipped_malformed_urls: self.skipped_malformed_urls.load(Ordering::Relaxed),
        }
    }
}

/// Records a duplicate-key anomaly: warn, assert in debug builds, count.
pub fn note_duplicates(counter: &AtomicU64, entity: &str, key: &str, found: usize) {
    debug_assert!(found <= 1, "duplicate {entity} rows for {key}");
    if found > 1 {
        tracing::warn!(entity, key, found, "duplicate rows where one was expected; using first");
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

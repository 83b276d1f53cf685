//! Request statistics: concurrency-safe path hit counters with top-N
//! reporting.
//!
//! Best-effort telemetry on the hot path: recording is a constant-time
//! bookkeeping operation and never fails. The counter set grows for the
//! process lifetime and is only ever queried through top-N projections.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

struct StatsEntry {
    count: AtomicU64,
    /// First-seen order, used as the tie-break in reports
    seq: u64,
}

/// One row of a top-N report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsRow {
    pub path: String,
    pub count: u64,
}

/// Concurrency-safe counter of path hits.
pub struct StatsRecorder {
    entries: DashMap<String, StatsEntry>,
    next_seq: AtomicU64,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Increment the counter for a normalized request path.
    pub fn record(&self, path: &str) {
        if let Some(entry) = self.entries.get(path) {
            entry.count.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.entries
            .entry(path.to_string())
            .or_insert_with(|| StatsEntry {
                count: AtomicU64::new(0),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            })
            .count
            .fetch_add(1, Ordering::Relaxed);
    }

    /// The `limit` highest-count entries in non-increasing count order.
    ///
    /// Paths whose extension is in `excluded_extensions` are skipped; this
    /// hides checksum/metadata noise (`md5`, `sha1`) from human-facing
    /// reports. Ties are broken by first-seen order.
    pub fn top_entries(&self, limit: usize, excluded_extensions: &[&str]) -> Vec<StatsRow> {
        let mut rows: Vec<(String, u64, u64)> = self
            .entries
            .iter()
            .filter(|entry| {
                let ext = extension_of(entry.key());
                !excluded_extensions.contains(&ext)
            })
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().count.load(Ordering::Relaxed),
                    entry.value().seq,
                )
            })
            .collect();

        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
        rows.truncate(limit);
        rows.into_iter()
            .map(|(path, count, _)| StatsRow { path, count })
            .collect()
    }

    /// Total number of recorded hits across all paths.
    pub fn total_hits(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.value().count.load(Ordering::Relaxed))
            .sum()
    }
}

/// Extension of the final path segment, empty when there is none.
fn extension_of(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

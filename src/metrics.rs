use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Route label shared by every request that matched no route, so scans of
/// random paths add to one row.
pub const UNMATCHED_ROUTE: &str = "(unmatched)";

/// Response marker set by the fallback handler.
#[derive(Debug, Clone, Copy)]
pub struct UnmatchedRoute;

/// One row of the error metrics table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMetric {
    pub status: u16,
    pub path: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// ErrorMetrics
///
/// Counts error responses (status >= 400) per (status, path) since startup.
/// Shared by the recording middleware and the admin error-metrics page.
#[derive(Clone, Default)]
pub struct ErrorMetrics {
    entries: Arc<DashMap<(u16, String), (u64, DateTime<Utc>)>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one response. Statuses below 400 are ignored.
    pub fn record(&self, status: u16, path: &str) {
        if status < 400 {
            return;
        }
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry((status, path.to_string()))
            .or_insert((0, now));
        entry.0 += 1;
        entry.1 = now;
    }

    /// snapshot
    ///
    /// All recorded rows, most frequent first.
    pub fn snapshot(&self) -> Vec<ErrorMetric> {
        let mut rows: Vec<ErrorMetric> = self
            .entries
            .iter()
            .map(|item| {
                let ((status, path), (count, last_seen)) = (item.key(), item.value());
                ErrorMetric {
                    status: *status,
                    path: path.clone(),
                    count: *count,
                    last_seen: *last_seen,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.status.cmp(&b.status))
                .then(a.path.cmp(&b.path))
        });
        rows
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|item| item.value().0).sum()
    }
}

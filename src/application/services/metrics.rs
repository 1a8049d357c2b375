use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-guarded request/upload/download/error counters exposed at
/// `/metrics` (spec.md §4.12). Atomics stand in for "per-counter locks" —
/// the observable behavior (a consistent point-in-time snapshot per
/// counter) is the same, and it is the idiom the corpus's own hot-path
/// counters use.
#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    uploads_total: AtomicU64,
    downloads_total: AtomicU64,
    bytes_uploaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    rate_limited_total: AtomicU64,
    concurrency_rejected_total: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub uploads_total: u64,
    pub downloads_total: u64,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
    pub rate_limited_total: u64,
    pub concurrency_rejected_total: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploads_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: u64) {
        self.downloads_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_concurrency_rejected(&self) {
        self.concurrency_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            uploads_total: self.uploads_total.load(Ordering::Relaxed),
            downloads_total: self.downloads_total.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            concurrency_rejected_total: self.concurrency_rejected_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.record_request();
        m.record_request();
        m.record_upload(100);
        m.record_download(50);
        m.record_error();

        let snap = m.snapshot();
        assert_eq!(snap.requests_total, 2);
        assert_eq!(snap.uploads_total, 1);
        assert_eq!(snap.bytes_uploaded, 100);
        assert_eq!(snap.downloads_total, 1);
        assert_eq!(snap.bytes_downloaded, 50);
        assert_eq!(snap.errors_total, 1);
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use walkdir::WalkDir;

use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::share::Share;

#[derive(Debug, Clone, Copy)]
struct CachedUsage {
    bytes: u64,
    last_walk: Instant,
}

struct ShareCache {
    root: PathBuf,
    // Wrapped in its own Arc (rather than borrowed through ShareCache) so
    // `lock_owned()` can hand out a guard with no lifetime tied to the
    // `shares` map, letting callers hold it across an `.await`ed write.
    cached: Arc<AsyncMutex<Option<CachedUsage>>>,
}

/// Cached share-usage accounting with async refresh and enforcement
/// (spec.md §4.5). Each share gets its own async mutex so walks across
/// different shares run concurrently, while only one walker runs per share
/// at a time — waiters that arrive while a walk is in flight simply block
/// on the same mutex and then observe its freshly written result.
pub struct QuotaManager {
    shares: StdMutex<HashMap<String, Arc<ShareCache>>>,
}

impl QuotaManager {
    pub fn new() -> Self {
        Self { shares: StdMutex::new(HashMap::new()) }
    }

    fn entry(&self, share: &Share) -> Arc<ShareCache> {
        let mut shares = self.shares.lock().expect("quota lock poisoned");
        shares
            .entry(share.name.clone())
            .or_insert_with(|| Arc::new(ShareCache { root: share.path.clone(), cached: Arc::new(AsyncMutex::new(None)) }))
            .clone()
    }

    /// Begins a write against `share`: walks (if uncached) and returns a
    /// [`QuotaGuard`] holding the per-share lock. The lock stays held across
    /// the caller's stream-write and is only released when the guard is
    /// dropped or [`QuotaGuard::commit`] is called, so a concurrent upload to
    /// the same share can't read the same stale usage, pass its own check,
    /// and overrun the quota — the lock covers the read-check-write-update
    /// sequence as one critical section (spec.md §4.5).
    pub async fn begin_write(&self, share: &Share) -> Result<QuotaGuard, DomainError> {
        let entry = self.entry(share);
        let mutex = entry.cached.clone();
        let mut guard = mutex.lock_owned().await;

        let current = match *guard {
            Some(cached) => cached.bytes,
            None => {
                let root = entry.root.clone();
                let bytes = tokio::task::spawn_blocking(move || walk_size(&root))
                    .await
                    .map_err(|e| DomainError::internal_error("quota_manager", e.to_string()))?;
                *guard = Some(CachedUsage { bytes, last_walk: Instant::now() });
                bytes
            }
        };

        Ok(QuotaGuard { guard, share_name: share.name.clone(), limit: share.quota_limit(), current })
    }

    /// Returns the cached usage for `share`, or performs a full recursive
    /// size walk (off the request thread) if `force` is set or no cache
    /// exists yet.
    pub async fn get_usage(&self, share: &Share, force: bool) -> Result<u64, DomainError> {
        let entry = self.entry(share);
        let mut guard = entry.cached.lock().await;

        if !force {
            if let Some(cached) = *guard {
                return Ok(cached.bytes);
            }
        }

        let root = entry.root.clone();
        let bytes = tokio::task::spawn_blocking(move || walk_size(&root))
            .await
            .map_err(|e| DomainError::internal_error("quota_manager", e.to_string()))?;

        *guard = Some(CachedUsage { bytes, last_walk: Instant::now() });
        debug!(share = %share.name, bytes, "quota usage refreshed");
        Ok(bytes)
    }

    /// Drops the cached entry for a share; called after rename/delete
    /// instead of recomputing inline (spec.md §4.5).
    pub fn invalidate(&self, share_name: &str) {
        if let Some(entry) = self.shares.lock().expect("quota lock poisoned").get(share_name) {
            if let Ok(mut guard) = entry.cached.try_lock() {
                *guard = None;
            }
        }
    }

    /// Atomically adds `delta` (positive or negative) to the cached usage
    /// without a full walk, used right after a write completes.
    pub async fn adjust(&self, share: &Share, delta: i64) {
        let entry = self.entry(share);
        let mut guard = entry.cached.lock().await;
        if let Some(cached) = guard.as_mut() {
            cached.bytes = cached.bytes.saturating_add_signed(delta);
        }
    }

    pub fn ensure_within(&self, share: &Share, projected_usage: u64) -> Result<(), DomainError> {
        if let Some(limit) = share.quota_limit() {
            if projected_usage > limit {
                return Err(DomainError::new(
                    ErrorKind::QuotaExceeded,
                    "quota_manager",
                    format!("share '{}' quota exceeded: {projected_usage} > {limit}", share.name),
                ));
            }
        }
        Ok(())
    }

    pub fn describe(&self, share: &Share, usage: u64) -> QuotaStatus {
        match share.quota_limit() {
            Some(limit) => QuotaStatus {
                limit: Some(limit),
                used: usage,
                remaining: Some(limit.saturating_sub(usage)),
                percent: Some((usage as f64 / limit as f64) * 100.0),
                over: usage > limit,
            },
            None => QuotaStatus { limit: None, used: usage, remaining: None, percent: None, over: false },
        }
    }
}

impl Default for QuotaManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a share's write lock from the pre-write usage read through the
/// post-write commit. Dropping it without calling [`commit`](Self::commit)
/// (e.g. because the write failed) releases the lock without changing the
/// cached usage.
pub struct QuotaGuard {
    guard: OwnedMutexGuard<Option<CachedUsage>>,
    share_name: String,
    limit: Option<u64>,
    current: u64,
}

impl QuotaGuard {
    /// Usage observed when the write began (from cache, or a fresh walk).
    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn ensure_within(&self, projected_usage: u64) -> Result<(), DomainError> {
        if let Some(limit) = self.limit {
            if projected_usage > limit {
                return Err(DomainError::new(
                    ErrorKind::QuotaExceeded,
                    "quota_manager",
                    format!("share '{}' quota exceeded: {projected_usage} > {limit}", self.share_name),
                ));
            }
        }
        Ok(())
    }

    /// Applies `delta` to the cached usage and releases the lock.
    pub fn commit(mut self, delta: i64) {
        if let Some(cached) = self.guard.as_mut() {
            cached.bytes = cached.bytes.saturating_add_signed(delta);
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QuotaStatus {
    pub limit: Option<u64>,
    pub used: u64,
    pub remaining: Option<u64>,
    pub percent: Option<f64>,
    pub over: bool,
}

fn walk_size(root: &std::path::Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn walk_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let share = Share::new("t", dir.path().to_path_buf(), None);
        let qm = QuotaManager::new();
        let usage = qm.get_usage(&share, false).await.unwrap();
        assert_eq!(usage, 5);

        fs::write(dir.path().join("b.txt"), b"world!").unwrap();
        // Cached value is stale until forced.
        let cached = qm.get_usage(&share, false).await.unwrap();
        assert_eq!(cached, 5);
        let fresh = qm.get_usage(&share, true).await.unwrap();
        assert_eq!(fresh, 11);
    }

    #[test]
    fn ensure_within_respects_quota() {
        let share = Share::new("t", PathBuf::from("/tmp"), Some(100));
        let qm = QuotaManager::new();
        assert!(qm.ensure_within(&share, 100).is_ok());
        assert!(qm.ensure_within(&share, 101).is_err());
    }

    #[test]
    fn unlimited_share_never_exceeds() {
        let share = Share::new("t", PathBuf::from("/tmp"), None);
        let qm = QuotaManager::new();
        assert!(qm.ensure_within(&share, u64::MAX).is_ok());
    }

    #[tokio::test]
    async fn begin_write_serializes_concurrent_uploads_to_one_share() {
        let dir = tempfile::tempdir().unwrap();
        let share = Share::new("t", dir.path().to_path_buf(), Some(10));
        let qm = Arc::new(QuotaManager::new());

        // Both uploads see the same starting usage (0) but only one may
        // reserve the remaining budget; the second must fail once it
        // observes the first's committed usage, never both succeeding.
        let qm1 = qm.clone();
        let share1 = Share::new("t", dir.path().to_path_buf(), Some(10));
        let first = tokio::spawn(async move {
            let guard = qm1.begin_write(&share1).await.unwrap();
            guard.ensure_within(guard.current() + 6)?;
            tokio::task::yield_now().await;
            guard.commit(6);
            Ok::<(), DomainError>(())
        });

        // Give `first` a chance to take the lock before `second` starts.
        tokio::task::yield_now().await;

        let qm2 = qm.clone();
        let share2 = Share::new("t", dir.path().to_path_buf(), Some(10));
        let second = tokio::spawn(async move {
            let guard = qm2.begin_write(&share2).await.unwrap();
            let res = guard.ensure_within(guard.current() + 6);
            guard.commit(0);
            res
        });

        first.await.unwrap().unwrap();
        let second_result = second.await.unwrap();
        assert!(second_result.is_err(), "second writer must see first's committed usage, not a stale 0");
    }
}

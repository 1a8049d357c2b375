use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::file_info::{self, FileInfo};
use crate::domain::entities::http_range::{resolve, HttpRange, ResolvedRange};
use crate::domain::entities::share::Share;
use crate::domain::services::path_resolver;

use super::quota_manager::QuotaManager;

const DOWNLOAD_CHUNK: usize = 64 * 1024;

/// Safe listing, mkdir, rename, delete, streamed upload and ranged
/// download (spec.md §4.4). Every operation resolves `(share, rel)`
/// through the Path Resolver before touching the filesystem.
pub struct StorageGateway {
    quota: Arc<QuotaManager>,
}

pub struct DownloadResponse {
    pub stream: std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>,
    pub range: ResolvedRange,
}

impl StorageGateway {
    pub fn new(quota: Arc<QuotaManager>) -> Self {
        Self { quota }
    }

    fn resolve(&self, share: &Share, rel: &str) -> Result<PathBuf, DomainError> {
        path_resolver::resolve(&share.path, rel).map_err(DomainError::from)
    }

    pub async fn list(&self, share: &Share, rel: &str) -> Result<Vec<FileInfo>, DomainError> {
        let abs = self.resolve(share, rel)?;
        let mut read_dir = tokio::fs::read_dir(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::not_found("storage_gateway", format!("'{rel}' not found"))
            } else {
                DomainError::from(e)
            }
        })?;

        let meta = tokio::fs::metadata(&abs).await?;
        if !meta.is_dir() {
            return Err(DomainError::new(ErrorKind::BadRequest, "storage_gateway", format!("'{rel}' is not a directory")));
        }

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(DomainError::from)? {
            let name = entry.file_name().to_string_lossy().to_string();
            let entry_meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(name, error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let is_dir = entry_meta.is_dir();
            let modified = entry_meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            entries.push(FileInfo {
                path: join_rel(rel, &name),
                mime_type: file_info::guess_mime(&name, is_dir),
                name,
                size: if is_dir { 0 } else { entry_meta.len() },
                is_dir,
                modified,
            });
        }

        file_info::sort_listing(&mut entries);
        Ok(entries)
    }

    pub async fn mkdir(&self, share: &Share, rel: &str) -> Result<(), DomainError> {
        let abs = self.resolve(share, rel)?;
        if abs.exists() {
            return Err(DomainError::conflict("storage_gateway", format!("'{rel}' already exists")));
        }
        let parent = abs.parent().ok_or_else(|| DomainError::bad_request("storage_gateway", "invalid path"))?;
        if !parent.exists() {
            return Err(DomainError::new(ErrorKind::NotFound, "storage_gateway", "parent directory missing"));
        }
        tokio::fs::create_dir(&abs).await.map_err(DomainError::from)?;
        Ok(())
    }

    pub async fn rename(&self, share: &Share, rel: &str, new_name: &str) -> Result<(), DomainError> {
        validate_filename(new_name)?;
        let abs = self.resolve(share, rel)?;
        if !abs.exists() {
            return Err(DomainError::not_found("storage_gateway", format!("'{rel}' not found")));
        }
        let parent = abs.parent().ok_or_else(|| DomainError::bad_request("storage_gateway", "invalid path"))?;
        let target = parent.join(new_name);
        if target.exists() {
            return Err(DomainError::conflict("storage_gateway", format!("'{new_name}' already exists")));
        }
        tokio::fs::rename(&abs, &target).await.map_err(DomainError::from)?;
        self.quota.invalidate(&share.name);
        Ok(())
    }

    pub async fn delete(&self, share: &Share, rel: &str) -> Result<(), DomainError> {
        let abs = self.resolve(share, rel)?;
        let meta = tokio::fs::metadata(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::not_found("storage_gateway", format!("'{rel}' not found"))
            } else {
                DomainError::from(e)
            }
        })?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&abs).await.map_err(DomainError::from)?;
        } else {
            tokio::fs::remove_file(&abs).await.map_err(DomainError::from)?;
        }
        self.quota.invalidate(&share.name);
        Ok(())
    }

    /// Streams an upload in bounded chunks, aborting and deleting the
    /// partial file if `max_size` is exceeded or the share quota would be
    /// exceeded. Parent directories are created first. Rejects if the
    /// target already exists.
    pub async fn upload<S>(
        &self,
        share: &Share,
        rel_dir: &str,
        filename: &str,
        mut stream: S,
        declared_length: Option<u64>,
        max_size: Option<u64>,
    ) -> Result<u64, DomainError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        validate_filename(filename)?;
        let dir_abs = self.resolve(share, rel_dir)?;
        tokio::fs::create_dir_all(&dir_abs).await.map_err(DomainError::from)?;

        let target = dir_abs.join(filename);
        if target.exists() {
            return Err(DomainError::conflict("storage_gateway", format!("'{filename}' already exists")));
        }

        // Held for the whole read-check-write-update sequence below so a
        // concurrent upload to the same share can't slip in between the
        // pre-write check and the post-write commit (spec.md §4.5).
        let quota = self.quota.begin_write(share).await?;
        if let Some(declared) = declared_length {
            quota.ensure_within(quota.current().saturating_add(declared))?;
        }

        let mut file = tokio::fs::File::create(&target).await.map_err(DomainError::from)?;
        let mut written: u64 = 0;
        let mut failed = false;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    warn!(filename, error = %e, "upload stream error");
                    failed = true;
                    break;
                }
            };
            written += chunk.len() as u64;
            if let Some(max) = max_size {
                if written > max {
                    failed = true;
                    break;
                }
            }
            if file.write_all(&chunk).await.is_err() {
                failed = true;
                break;
            }
        }

        if !failed {
            if let Err(e) = file.flush().await {
                warn!(filename, error = %e, "flush failed");
                failed = true;
            }
        }
        drop(file);

        if failed {
            let _ = tokio::fs::remove_file(&target).await;
            if max_size.is_some_and(|m| written > m) {
                return Err(DomainError::new(ErrorKind::PayloadTooLarge, "storage_gateway", "upload exceeds max_size"));
            }
            return Err(DomainError::internal_error("storage_gateway", "upload failed"));
        }

        if let Err(e) = quota.ensure_within(quota.current() + written) {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }

        quota.commit(written as i64);
        debug!(filename, written, "upload completed");
        Ok(written)
    }

    /// Computes the byte range (§3) and returns a cancellable chunked
    /// stream over it. The file handle lives inside the stream and is
    /// dropped (closing it) whenever the stream itself is dropped, so an
    /// aborted client connection never leaks a dangling handle.
    pub async fn download(&self, share: &Share, rel: &str, range: Option<HttpRange>) -> Result<DownloadResponse, DomainError> {
        let abs = self.resolve(share, rel)?;
        let meta = tokio::fs::metadata(&abs).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::not_found("storage_gateway", format!("'{rel}' not found"))
            } else {
                DomainError::from(e)
            }
        })?;
        if meta.is_dir() {
            return Err(DomainError::new(ErrorKind::BadRequest, "storage_gateway", "cannot download a directory"));
        }
        let total = meta.len();
        let resolved = match range {
            Some(r) => resolve(r, total),
            None => resolve(HttpRange::Start { start: 0 }, total),
        };

        if resolved.is_empty() {
            return Ok(DownloadResponse { stream: Box::pin(futures::stream::empty()), range: resolved });
        }

        let mut file = tokio::fs::File::open(&abs).await.map_err(DomainError::from)?;
        file.seek(std::io::SeekFrom::Start(resolved.start)).await.map_err(DomainError::from)?;
        let limited = file.take(resolved.len());
        let stream = ReaderStream::with_capacity(limited, DOWNLOAD_CHUNK);
        Ok(DownloadResponse { stream: Box::pin(stream), range: resolved })
    }
}

fn join_rel(rel: &str, name: &str) -> String {
    let base = rel.trim_end_matches('/');
    if base.is_empty() || base == "." {
        format!("/{name}")
    } else if base.starts_with('/') {
        format!("{base}/{name}")
    } else {
        format!("/{base}/{name}")
    }
}

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Shared by upload/rename (spec.md §4.4): rejects empty, `.`, `..`, any of
/// `<>:"/\|?*`, or any control character.
pub fn validate_filename(name: &str) -> Result<(), DomainError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(DomainError::new(ErrorKind::BadRequest, "filename", "invalid filename"));
    }
    if name.len() > 255 {
        return Err(DomainError::new(ErrorKind::BadRequest, "filename", "filename too long"));
    }
    if name.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || (c as u32) < 0x20 || (c as u32) == 0x7F) {
        return Err(DomainError::new(ErrorKind::BadRequest, "filename", "filename contains forbidden characters"));
    }
    Ok(())
}

/// Replaces offending glyphs with `_`, trims trailing spaces/dots,
/// truncates to 255 bytes preserving the extension, substitutes `unnamed`
/// for an empty result.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) || (c as u32) < 0x20 || (c as u32) == 0x7F { '_' } else { c })
        .collect();

    while sanitized.ends_with(' ') || sanitized.ends_with('.') {
        sanitized.pop();
    }

    if sanitized.len() > 255 {
        let path = Path::new(&sanitized);
        let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let keep = 255usize.saturating_sub(ext.len());
        let truncated_stem: String = stem.chars().take(keep).collect();
        sanitized = format!("{truncated_stem}{ext}");
    }

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        sanitized = "unnamed".to_string();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn share_at(dir: &Path) -> Share {
        Share::new("t", dir.to_path_buf(), None)
    }

    #[tokio::test]
    async fn list_sorts_dirs_first_then_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Zeta")).unwrap();
        fs::write(dir.path().join("alpha.txt"), b"x").unwrap();
        fs::write(dir.path().join("Beta.txt"), b"x").unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let listing = gw.list(&share_at(dir.path()), "").await.unwrap();
        let names: Vec<_> = listing.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["Zeta", "alpha.txt", "Beta.txt"]);
    }

    #[tokio::test]
    async fn mkdir_rejects_existing() {
        let dir = tempfile::tempdir().unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());
        gw.mkdir(&share, "sub").await.unwrap();
        assert!(gw.mkdir(&share, "sub").await.is_err());
    }

    #[tokio::test]
    async fn rename_to_existing_target_fails_and_leaves_both_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());
        let err = gw.rename(&share, "a.txt", "b.txt").await;
        assert!(err.is_err());
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn rename_rejects_traversal_in_new_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());
        let err = gw.rename(&share, "a.txt", "../x").await;
        assert!(err.is_err());
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn upload_exactly_max_size_succeeds_one_more_byte_fails() {
        let dir = tempfile::tempdir().unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());

        let data = vec![b'x'; 10];
        let stream = futures::stream::iter(vec![Ok(Bytes::from(data))]);
        let written = gw.upload(&share, "", "ok.bin", stream, None, Some(10)).await.unwrap();
        assert_eq!(written, 10);

        let data = vec![b'y'; 11];
        let stream = futures::stream::iter(vec![Ok(Bytes::from(data))]);
        let err = gw.upload(&share, "", "bad.bin", stream, None, Some(10)).await;
        assert!(err.is_err());
        assert!(!dir.path().join("bad.bin").exists());
    }

    #[tokio::test]
    async fn upload_rejects_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.txt"), b"old").unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());
        let stream = futures::stream::iter(vec![Ok(Bytes::from_static(b"new"))]);
        let err = gw.upload(&share, "", "x.txt", stream, None, None).await;
        assert!(err.is_err());
        assert_eq!(fs::read(dir.path().join("x.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn download_range_returns_requested_bytes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hi.txt"), b"hello").unwrap();
        let gw = StorageGateway::new(Arc::new(QuotaManager::new()));
        let share = share_at(dir.path());
        let resp = gw
            .download(&share, "hi.txt", Some(HttpRange::StartEnd { start: 0, end: 3 }))
            .await
            .unwrap();
        assert_eq!((resp.range.start, resp.range.end, resp.range.total), (0, 3, 5));
        let bytes: Vec<u8> = resp
            .stream
            .map(|c| c.unwrap().to_vec())
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(bytes, b"hell");
    }

    #[test]
    fn filename_validation_rejects_separators_and_dotdot() {
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("ok.txt").is_ok());
    }

    #[test]
    fn sanitize_replaces_forbidden_glyphs() {
        assert_eq!(sanitize_filename("a:b*c"), "a_b_c");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("trailing. "), "trailing");
    }
}

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::Stream;
use rand::distr::{Alphanumeric, SampleString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::direct_transfer::{DeleteAction, DirectTransfer, TransferDirection};
use crate::infrastructure::stores::transfer_store::TransferStore;

const ID_LEN: usize = 12;
const ID_COLLISION_RETRIES: usize = 64;

pub struct CreatedTransfer {
    pub id: String,
    pub size: u64,
}

pub struct DownloadPayload {
    pub filename: String,
    pub content_type: String,
    pub stream: std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>,
}

/// Single-node mediated file drop between users (spec.md §4.11). A single
/// store-wide mutex guards metadata and stored-filename allocation; payload
/// bytes are streamed outside that lock.
pub struct DirectTransferService {
    store: TransferStore,
    lock: tokio::sync::Mutex<()>,
}

impl DirectTransferService {
    pub fn new(store: TransferStore) -> Self {
        Self { store, lock: tokio::sync::Mutex::new(()) }
    }

    /// Streams `stream` into a temp file honoring `max_size`, then takes the
    /// store lock to prune, allocate an id, rename the payload into place,
    /// and atomically rewrite the metadata.
    pub async fn create<S>(
        &self,
        sender: &str,
        recipient: &str,
        filename: &str,
        content_type: &str,
        mut stream: S,
        max_size: Option<u64>,
        expires_in: Option<i64>,
        known_recipients: &[String],
    ) -> Result<CreatedTransfer, DomainError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        if sender == recipient {
            return Err(DomainError::bad_request("direct_transfer", "cannot send a transfer to yourself"));
        }
        if !known_recipients.iter().any(|r| r == recipient) {
            return Err(DomainError::not_found("direct_transfer", format!("unknown recipient '{recipient}'")));
        }

        tokio::fs::create_dir_all(&self.store.payload_dir).await.map_err(DomainError::from)?;
        let tmp_path = self.store.payload_dir.join(format!(".upload-{}.tmp", uuid::Uuid::new_v4()));
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await.map_err(DomainError::from)?;

        let mut written: u64 = 0;
        let mut failed = false;
        while let Some(chunk) = futures::StreamExt::next(&mut stream).await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(_) => {
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
            if tmp_file.write_all(&chunk).await.is_err() {
                failed = true;
                break;
            }
        }
        if !failed {
            failed = tmp_file.flush().await.is_err();
        }
        drop(tmp_file);

        if failed {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(DomainError::new(ErrorKind::PayloadTooLarge, "direct_transfer", "upload exceeds max_size"));
        }

        let ext = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let _guard = self.lock.lock().await;
        let mut transfers = self.store.load().await;
        prune_expired(&mut transfers);

        let mut allocated = None;
        for _ in 0..ID_COLLISION_RETRIES {
            let id = Alphanumeric.sample_string(&mut rand::rng(), ID_LEN);
            let stored_filename = format!("{id}{ext}");
            if !transfers.iter().any(|t| t.stored_filename == stored_filename) {
                allocated = Some((id, stored_filename));
                break;
            }
        }
        let (id, stored_filename) = allocated.ok_or_else(|| {
            DomainError::internal_error("direct_transfer", "failed to allocate a unique transfer id")
        })?;

        let final_path = self.store.payload_path(&stored_filename);
        tokio::fs::rename(&tmp_path, &final_path).await.map_err(DomainError::from)?;

        let now = Utc::now();
        let entry = DirectTransfer {
            id: id.clone(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            filename: filename.to_string(),
            stored_filename,
            size: written,
            content_type: content_type.to_string(),
            created_at: now,
            expires_at: expires_in.map(|secs| now + ChronoDuration::seconds(secs)),
        };
        transfers.push(entry);

        if let Err(e) = self.store.save(&transfers).await {
            let _ = tokio::fs::remove_file(&final_path).await;
            return Err(DomainError::from(e));
        }

        Ok(CreatedTransfer { id, size: written })
    }

    /// Lists transfers for `principal` in the given direction, pruning
    /// expired entries first.
    pub async fn list(&self, principal: &str, direction: TransferDirection) -> Vec<DirectTransfer> {
        let _guard = self.lock.lock().await;
        let mut transfers = self.store.load().await;
        if prune_expired(&mut transfers) {
            let _ = self.store.save(&transfers).await;
        }

        transfers
            .into_iter()
            .filter(|t| match direction {
                TransferDirection::Incoming => t.recipient == principal,
                TransferDirection::Outgoing => t.sender == principal,
            })
            .collect()
    }

    /// At-most-once delivery: the metadata entry is removed and persisted
    /// before any payload byte is streamed. The payload file is deleted once
    /// the stream completes, whether it succeeded or failed.
    pub async fn download(&self, principal: &str, id: &str) -> Result<DownloadPayload, DomainError> {
        let entry = {
            let _guard = self.lock.lock().await;
            let mut transfers = self.store.load().await;
            prune_expired(&mut transfers);

            let idx = transfers
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| DomainError::not_found("direct_transfer", format!("transfer '{id}' not found")))?;
            if transfers[idx].recipient != principal {
                return Err(DomainError::forbidden("direct_transfer", "not the recipient of this transfer"));
            }
            let entry = transfers.remove(idx);
            self.store.save(&transfers).await.map_err(DomainError::from)?;
            entry
        };

        let payload_path = self.store.payload_path(&entry.stored_filename);
        let file = tokio::fs::File::open(&payload_path).await.map_err(DomainError::from)?;
        let stream = cleanup_on_completion(ReaderStream::new(file), payload_path);

        Ok(DownloadPayload {
            filename: entry.filename,
            content_type: entry.content_type,
            stream: Box::pin(stream),
        })
    }

    /// Sender or recipient only. Returns the action label (`cancelled` for
    /// the sender, `dismissed` for the recipient).
    pub async fn delete(&self, principal: &str, id: &str) -> Result<DeleteAction, DomainError> {
        let _guard = self.lock.lock().await;
        let mut transfers = self.store.load().await;
        let idx = transfers
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| DomainError::not_found("direct_transfer", format!("transfer '{id}' not found")))?;

        let action = if transfers[idx].sender == principal {
            DeleteAction::Cancelled
        } else if transfers[idx].recipient == principal {
            DeleteAction::Dismissed
        } else {
            return Err(DomainError::forbidden("direct_transfer", "not a party to this transfer"));
        };

        let entry = transfers.remove(idx);
        self.store.save(&transfers).await.map_err(DomainError::from)?;
        let _ = tokio::fs::remove_file(self.store.payload_path(&entry.stored_filename)).await;
        Ok(action)
    }
}

fn prune_expired(transfers: &mut Vec<DirectTransfer>) -> bool {
    let now: DateTime<Utc> = Utc::now();
    let before = transfers.len();
    transfers.retain(|t| !t.is_expired(now));
    transfers.len() != before
}

/// Wraps a reader stream so the payload file is unlinked once the stream is
/// fully drained or dropped early (aborted client connection), never leaving
/// an orphaned payload behind.
fn cleanup_on_completion<S>(inner: S, path: std::path::PathBuf) -> impl Stream<Item = std::io::Result<Bytes>>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    async_stream_cleanup::CleanupStream::new(inner, path)
}

mod async_stream_cleanup {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    pub struct CleanupStream<S> {
        inner: S,
        path: std::path::PathBuf,
        done: bool,
    }

    impl<S> CleanupStream<S> {
        pub fn new(inner: S, path: std::path::PathBuf) -> Self {
            Self { inner, path, done: false }
        }
    }

    impl<S: Stream<Item = std::io::Result<Bytes>> + Unpin> Stream for CleanupStream<S> {
        type Item = std::io::Result<Bytes>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let poll = Pin::new(&mut self.inner).poll_next(cx);
            if let Poll::Ready(None) = &poll {
                self.done = true;
                let path = self.path.clone();
                tokio::spawn(async move {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %path.display(), error = %e, "failed to remove delivered transfer payload");
                    }
                });
            }
            poll
        }
    }

    impl<S> Drop for CleanupStream<S> {
        fn drop(&mut self) {
            if self.done {
                return;
            }
            let path = self.path.clone();
            tokio::spawn(async move {
                let _ = tokio::fs::remove_file(&path).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn service() -> (DirectTransferService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TransferStore::new(dir.path());
        (DirectTransferService::new(store), dir)
    }

    fn body(data: &'static [u8]) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        futures::stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    #[tokio::test]
    async fn create_rejects_self_transfer() {
        let (svc, _dir) = service();
        let err = svc
            .create("alice", "alice", "f.txt", "text/plain", body(b"hi"), None, None, &["alice".into()])
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn create_rejects_unknown_recipient() {
        let (svc, _dir) = service();
        let err = svc
            .create("alice", "ghost", "f.txt", "text/plain", body(b"hi"), None, None, &["alice".into()])
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn create_then_list_then_download_is_at_most_once() {
        let (svc, _dir) = service();
        let created = svc
            .create("alice", "bob", "f.txt", "text/plain", body(b"hello"), None, None, &["bob".into()])
            .await
            .unwrap();
        assert_eq!(created.size, 5);

        let incoming = svc.list("bob", TransferDirection::Incoming).await;
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, created.id);

        let mut payload = svc.download("bob", &created.id).await.unwrap();
        let mut bytes = Vec::new();
        while let Some(chunk) = payload.stream.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(bytes, b"hello");

        // Second download attempt finds nothing: metadata was removed up front.
        assert!(svc.download("bob", &created.id).await.is_err());
    }

    #[tokio::test]
    async fn only_sender_or_recipient_can_delete() {
        let (svc, _dir) = service();
        let created = svc
            .create("alice", "bob", "f.txt", "text/plain", body(b"hi"), None, None, &["bob".into()])
            .await
            .unwrap();

        let err = svc.delete("mallory", &created.id).await;
        assert!(err.is_err());

        let action = svc.delete("alice", &created.id).await.unwrap();
        assert_eq!(action, DeleteAction::Cancelled);
    }

    #[tokio::test]
    async fn upload_exceeding_max_size_fails_and_leaves_no_file() {
        let (svc, dir) = service();
        let err = svc
            .create("alice", "bob", "f.txt", "text/plain", body(b"0123456789"), Some(5), None, &["bob".into()])
            .await;
        assert!(err.is_err());
        let remaining: Vec<_> = std::fs::read_dir(dir.path().join("direct_transfers"))
            .map(|rd| rd.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(remaining.is_empty());
    }
}

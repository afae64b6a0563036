//! Filesystem-backed job store.
//!
//! Grounded on `oxcrypt-core`'s `fs`/`vault` modules for the "filesystem
//! is the only source of truth, mutate via owned async helpers" shape,
//! and on `original_source/nlpipe/clients/FSClient.py` for the exact
//! state machine this type must reproduce (spec.md §3, §4.2).
//!
//! Every (module, bucket) directory is created lazily on first write.
//! Concurrency safety comes entirely from [`std::fs::rename`]'s atomicity
//! (spec.md §5) — no in-process lock guards any of these operations,
//! because two processes on the same host (or over NFS) must be safe to
//! race here, not just two threads in one binary.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, instrument, warn};

use crate::bucket::{Bucket, TaskStatus};
use crate::error::StoreError;
use crate::fingerprint::fingerprint;

/// A content-addressed, filesystem-backed task store.
///
/// Cheap to clone: it's a single `PathBuf` under the hood, shared freely
/// between the REST facade's request handlers and the worker pool's
/// polling loops.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a store rooted at `root`. Does not touch the filesystem —
    /// directories are created lazily per spec.md §4.2.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, module: &str, bucket: Bucket) -> PathBuf {
        self.root.join(module).join(bucket.dirname())
    }

    fn task_path(&self, module: &str, bucket: Bucket, id: &str) -> PathBuf {
        self.bucket_dir(module, bucket).join(id)
    }

    async fn ensure_bucket_dir(&self, module: &str, bucket: Bucket) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_dir(module, bucket);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                module: module.to_owned(),
                id: String::new(),
                source,
            })?;
        Ok(dir)
    }

    fn io_err(module: &str, id: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            module: module.to_owned(),
            id: id.to_owned(),
            source,
        }
    }

    /// Cheap existence check across buckets, in the priority order
    /// `queue, inprogress, results, errors` (spec.md §4.2). No locking;
    /// a stale read only races with a concurrent transition that would
    /// be observed on the next call.
    #[instrument(skip(self), fields(module, id))]
    pub async fn status(&self, module: &str, id: &str) -> Result<TaskStatus, StoreError> {
        for bucket in Bucket::ALL {
            let path = self.task_path(module, bucket, id);
            match tokio::fs::try_exists(&path).await {
                Ok(true) => return Ok(bucket.status()),
                Ok(false) => continue,
                Err(source) => return Err(Self::io_err(module, id, source)),
            }
        }
        Ok(TaskStatus::Unknown)
    }

    /// Add a document to the queue, or no-op / reset per spec.md §4.2.
    ///
    /// Returns the task id (computed via [`fingerprint`] when `id` is
    /// `None`). Prior state wins except for the explicit reset cases.
    #[instrument(skip(self, doc), fields(module, id))]
    pub async fn enqueue(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<String>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<String, StoreError> {
        let id = id.unwrap_or_else(|| fingerprint(doc));
        let status = self.status(module, &id).await?;
        match status {
            TaskStatus::Unknown => {
                self.write_bucket(module, Bucket::Queue, &id, doc).await?;
                debug!(module, id, "enqueued new task");
            }
            TaskStatus::Error if reset_error => {
                self.remove_bucket(module, Bucket::Errors, &id).await?;
                self.write_bucket(module, Bucket::Queue, &id, doc).await?;
                debug!(module, id, "reset errored task to queue");
            }
            TaskStatus::Started if reset_pending => {
                self.remove_bucket(module, Bucket::InProgress, &id).await?;
                self.write_bucket(module, Bucket::Queue, &id, doc).await?;
                debug!(module, id, "reset in-progress task to queue");
            }
            other => {
                debug!(module, id, status = %other, "enqueue is a no-op, prior state wins");
            }
        }
        Ok(id)
    }

    async fn write_bucket(
        &self,
        module: &str,
        bucket: Bucket,
        id: &str,
        contents: &[u8],
    ) -> Result<(), StoreError> {
        self.ensure_bucket_dir(module, bucket).await?;
        let path = self.task_path(module, bucket, id);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| Self::io_err(module, id, source))
    }

    async fn remove_bucket(&self, module: &str, bucket: Bucket, id: &str) -> Result<(), StoreError> {
        let path = self.task_path(module, bucket, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Self::io_err(module, id, source)),
        }
    }

    /// Atomically claim the oldest queued task for `module`, if any.
    ///
    /// Picks the queue entry with the smallest modification time
    /// (approximate FIFO, spec.md §5), attempts an atomic rename into
    /// `inprogress/`, and retries against the next-oldest candidate if
    /// another claimant won the race (the file vanished from under us).
    /// Returns `Ok(None)` on an empty queue — never spins.
    #[instrument(skip(self), fields(module))]
    pub async fn claim(&self, module: &str) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        let queue_dir = self.ensure_bucket_dir(module, Bucket::Queue).await?;
        self.ensure_bucket_dir(module, Bucket::InProgress).await?;

        let mut candidates = self.oldest_first(module, &queue_dir).await?;
        while let Some(id) = candidates.pop() {
            let from = self.task_path(module, Bucket::Queue, &id);
            let to = self.task_path(module, Bucket::InProgress, &id);
            match tokio::fs::rename(&from, &to).await {
                Ok(()) => {
                    let doc = tokio::fs::read(&to)
                        .await
                        .map_err(|source| Self::io_err(module, &id, source))?;
                    debug!(module, id, bytes = doc.len(), "claimed task");
                    return Ok(Some((id, doc)));
                }
                Err(source) if source.kind() == ErrorKind::NotFound => {
                    // Another claimant won the race for this id; try the
                    // next-oldest candidate instead of recursing.
                    warn!(module, id, "lost claim race, trying next candidate");
                    continue;
                }
                Err(source) => return Err(Self::io_err(module, &id, source)),
            }
        }
        Ok(None)
    }

    /// List queued task ids oldest-first (returned in reverse so callers
    /// can `pop()` the oldest off the end).
    async fn oldest_first(&self, module: &str, queue_dir: &Path) -> Result<Vec<String>, StoreError> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(queue_dir)
            .await
            .map_err(|source| Self::io_err(module, "", source))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|source| Self::io_err(module, "", source))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let modified = entry
                .metadata()
                .await
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, name));
        }
        // Sort newest-first so `pop()` yields oldest-first.
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    /// Store a successful result. Precondition: current state is in
    /// `{STARTED, DONE, ERROR}` (spec.md §4.2); anything else is
    /// `InvalidState`.
    ///
    /// Writes into `results/` first, then deletes the prior bucket's
    /// file if it differs — no window exists where the task is absent
    /// from every bucket. Called again on an already-`DONE` task, this
    /// overwrites (see `DESIGN.md` Open Question 1).
    #[instrument(skip(self, result), fields(module, id))]
    pub async fn store_result(&self, module: &str, id: &str, result: &[u8]) -> Result<(), StoreError> {
        let status = self.status(module, id).await?;
        if !matches!(status, TaskStatus::Started | TaskStatus::Done | TaskStatus::Error) {
            return Err(StoreError::InvalidState {
                module: module.to_owned(),
                id: id.to_owned(),
                found: status,
            });
        }
        self.write_bucket(module, Bucket::Results, id, result).await?;
        if status != TaskStatus::Done {
            if let Some(prior) = status.bucket() {
                self.remove_bucket(module, prior, id).await?;
            }
        }
        Ok(())
    }

    /// Store a processing error, same preconditions as [`Self::store_result`].
    #[instrument(skip(self, message), fields(module, id))]
    pub async fn store_error(&self, module: &str, id: &str, message: &[u8]) -> Result<(), StoreError> {
        let status = self.status(module, id).await?;
        if !matches!(status, TaskStatus::Started | TaskStatus::Done | TaskStatus::Error) {
            return Err(StoreError::InvalidState {
                module: module.to_owned(),
                id: id.to_owned(),
                found: status,
            });
        }
        self.write_bucket(module, Bucket::Errors, id, message).await?;
        if status != TaskStatus::Error {
            if let Some(prior) = status.bucket() {
                self.remove_bucket(module, prior, id).await?;
            }
        }
        Ok(())
    }

    /// Fetch the raw terminal payload for a task: the result bytes if
    /// `DONE`, or `ProcessingFailed` (carrying the stored error bytes as
    /// its message) if `ERROR`. Any other status is `NotReady`.
    ///
    /// Format conversion (spec.md §4.3's `Convert`) is not performed
    /// here — `Store` has no knowledge of the processor registry; see
    /// [`crate::service::Service::result`] for the combined operation.
    #[instrument(skip(self), fields(module, id))]
    pub async fn read_result(&self, module: &str, id: &str) -> Result<Vec<u8>, StoreError> {
        let status = self.status(module, id).await?;
        match status {
            TaskStatus::Done => {
                let path = self.task_path(module, Bucket::Results, id);
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| Self::io_err(module, id, source))
            }
            TaskStatus::Error => {
                let path = self.task_path(module, Bucket::Errors, id);
                let message = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| Self::io_err(module, id, source))?;
                Err(StoreError::ProcessingFailed {
                    module: module.to_owned(),
                    id: id.to_owned(),
                    message,
                })
            }
            other => Err(StoreError::NotReady {
                module: module.to_owned(),
                id: id.to_owned(),
                status: other,
            }),
        }
    }

    /// Count files in each bucket for `module`.
    pub async fn statistics(&self, module: &str) -> Result<HashMap<TaskStatus, usize>, StoreError> {
        let mut counts = HashMap::new();
        for bucket in Bucket::ALL {
            let dir = self.bucket_dir(module, bucket);
            let n = match tokio::fs::read_dir(&dir).await {
                Ok(mut read_dir) => {
                    let mut n = 0usize;
                    while read_dir
                        .next_entry()
                        .await
                        .map_err(|source| Self::io_err(module, "", source))?
                        .is_some()
                    {
                        n += 1;
                    }
                    n
                }
                Err(source) if source.kind() == ErrorKind::NotFound => 0,
                Err(source) => return Err(Self::io_err(module, "", source)),
            };
            counts.insert(bucket.status(), n);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Store::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_on_identical_bytes() {
        let (store, _dir) = store();
        let id1 = store.enqueue("upper", b"hello", None, false, false).await.unwrap();
        let id2 = store.enqueue("upper", b"hello", None, false, false).await.unwrap();
        assert_eq!(id1, id2);
        let stats = store.statistics("upper").await.unwrap();
        assert_eq!(stats[&TaskStatus::Pending], 1);
    }

    #[tokio::test]
    async fn full_happy_path_lifecycle() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"hello", None, false, false).await.unwrap();
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Pending);

        let (claimed_id, doc) = store.claim("upper").await.unwrap().unwrap();
        assert_eq!(claimed_id, id);
        assert_eq!(doc, b"hello");
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Started);

        store.store_result("upper", &id, b"HELLO").await.unwrap();
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Done);
        assert_eq!(store.read_result("upper", &id).await.unwrap(), b"HELLO");
    }

    #[tokio::test]
    async fn error_path_reports_processing_failed() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"doc", None, false, false).await.unwrap();
        store.claim("upper").await.unwrap();
        store.store_error("upper", &id, b"boom").await.unwrap();
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Error);

        let err = store.read_result("upper", &id).await.unwrap_err();
        match err {
            StoreError::ProcessingFailed { message, .. } => assert_eq!(message, "boom"),
            other => panic!("expected ProcessingFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_on_empty_queue_returns_none() {
        let (store, _dir) = store();
        assert!(store.claim("upper").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_never_return_the_same_id() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"only one task", None, false, false).await.unwrap();

        let store2 = store.clone();
        let (a, b) = tokio::join!(
            async { store.claim("upper").await.unwrap() },
            async { store2.claim("upper").await.unwrap() },
        );
        let winners: Vec<_> = [a, b].into_iter().flatten().collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].0, id);
    }

    #[tokio::test]
    async fn reset_error_moves_task_back_to_queue() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"doc", None, false, false).await.unwrap();
        store.claim("upper").await.unwrap();
        store.store_error("upper", &id, b"boom").await.unwrap();

        // Without reset_error, re-enqueue is a no-op.
        store.enqueue("upper", b"doc", Some(id.clone()), false, false).await.unwrap();
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Error);

        store.enqueue("upper", b"doc", Some(id.clone()), true, false).await.unwrap();
        assert_eq!(store.status("upper", &id).await.unwrap(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn store_result_on_unknown_or_pending_is_invalid_state() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"doc", None, false, false).await.unwrap();
        let err = store.store_result("upper", &id, b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn store_result_on_done_task_overwrites() {
        let (store, _dir) = store();
        let id = store.enqueue("upper", b"doc", None, false, false).await.unwrap();
        store.claim("upper").await.unwrap();
        store.store_result("upper", &id, b"first").await.unwrap();
        store.store_result("upper", &id, b"second").await.unwrap();
        assert_eq!(store.read_result("upper", &id).await.unwrap(), b"second");
    }
}

//! # Serialized Disk Store
//!
//! Persistent byte store: one file per key in a dedicated directory,
//! `<root>/<cache_folder_name>/<escaped key>`. There is no index file; the
//! directory listing and each file's creation time are authoritative.
//!
//! ## Architecture
//!
//! ```text
//!   DiskStore (cheap to clone)                      worker thread
//!   ┌──────────────────────────────┐   FIFO queue   ┌───────────────────────────┐
//!   │ save / load / delete / ...   │ ─────────────► │ DiskWorker                │
//!   │ submit_write_back (try_send) │   (bounded)    │  one request at a time    │
//!   │ flush / shutdown             │ ◄───────────── │  std::fs on the directory │
//!   └──────────────────────────────┘   oneshot /    └───────────────────────────┘
//!                                      callback
//! ```
//!
//! ## Failure policy
//!
//! | Operation             | On failure                          |
//! |-----------------------|-------------------------------------|
//! | `save`                | logged, entry simply not written    |
//! | `load`                | logged, treated as absent           |
//! | `delete`              | `Err` (missing file is an error)    |
//! | `delete_all`          | `Err`, partial sweep not rolled back |
//! | `enforce_count_limit` | `Err`                               |
//! | `check_and_enforce_count_limit` | logged and swallowed      |
//!
//! ## Calling conventions
//!
//! - `async fn` variants suspend until the worker has finished the request.
//! - `*_blocking` variants block the current thread; calling them from inside
//!   an async runtime panics (tokio's `blocking_*` rules).
//! - `load_with` never blocks: the callback runs on the worker thread, or
//!   immediately with `None` if the queue is full or closed.
//!
//! ## Example
//!
//! ```no_run
//! use tiercache::config::DiskPolicy;
//! use tiercache::store::disk::DiskStore;
//!
//! # async fn demo() -> tiercache::error::Result<()> {
//! let disk = DiskStore::open(&DiskPolicy::new("Thumbnails").with_count_limit(500))?;
//! disk.save("k", vec![1, 2, 3]).await;
//! assert_eq!(disk.load("k").await, Some(vec![1, 2, 3]));
//! disk.delete("k").await?;
//! disk.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod key;
pub mod root;
mod worker;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::config::DiskPolicy;
use crate::error::{CacheError, Result};
use crate::store::traits::{DiskCounters, DiskMetrics};
use worker::{DiskWorker, Request, Responder};

fn reply_to<T: Send + 'static>(tx: oneshot::Sender<T>) -> Responder<T> {
    Box::new(move |value| {
        let _ = tx.send(value);
    })
}

struct Shared {
    folder: String,
    directory: PathBuf,
    count_limit: usize,
    requests: mpsc::Sender<Request>,
    counters: Arc<DiskCounters>,
    pending_write_backs: Arc<AtomicUsize>,
}

/// Handle to a serialized disk store. Clones share one worker.
///
/// The worker drains its queue and exits once every handle is dropped or
/// [`DiskStore::shutdown`] completes.
#[derive(Clone)]
pub struct DiskStore {
    shared: Arc<Shared>,
}

impl DiskStore {
    /// Validates `policy`, resolves its directory and starts the worker.
    ///
    /// The worker trims the directory to `count_limit` before serving
    /// requests.
    pub fn open(policy: &DiskPolicy) -> Result<Self> {
        policy.validate()?;
        let directory = policy.directory()?;
        std::fs::create_dir_all(&directory).map_err(|err| CacheError::io(&directory, err))?;

        let (tx, rx) = mpsc::channel(policy.queue_capacity);
        let counters = Arc::new(DiskCounters::default());
        let pending_write_backs = Arc::new(AtomicUsize::new(0));
        let worker = DiskWorker {
            directory: directory.clone(),
            count_limit: policy.count_limit,
            counters: Arc::clone(&counters),
            pending_write_backs: Arc::clone(&pending_write_backs),
        };
        thread::Builder::new()
            .name(format!("tiercache-disk-{}", policy.cache_folder_name))
            .spawn(move || worker.run(rx))
            .map_err(|err| CacheError::io(&directory, err))?;

        Ok(Self {
            shared: Arc::new(Shared {
                folder: policy.cache_folder_name.clone(),
                directory,
                count_limit: policy.count_limit,
                requests: tx,
                counters,
                pending_write_backs,
            }),
        })
    }

    /// Directory holding the cached files.
    pub fn directory(&self) -> &Path {
        &self.shared.directory
    }

    pub fn count_limit(&self) -> usize {
        self.shared.count_limit
    }

    pub fn metrics(&self) -> DiskMetrics {
        self.shared.counters.snapshot()
    }

    /// Write-backs accepted but not yet persisted (or dropped).
    pub fn pending_write_backs(&self) -> usize {
        self.shared.pending_write_backs.load(Ordering::Acquire)
    }

    /// `true` once the worker has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.shared.requests.is_closed()
    }

    // -- async -----------------------------------------------------------

    async fn call<T: Send + 'static>(
        &self,
        make: impl FnOnce(Responder<T>) -> Request,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .requests
            .send(make(reply_to(tx)))
            .await
            .map_err(|_| CacheError::Closed)?;
        rx.await.map_err(|_| CacheError::Closed)
    }

    /// Writes `bytes` for `key`. Failures are swallowed.
    pub async fn save(&self, key: &str, bytes: Vec<u8>) {
        let key = key.to_string();
        if self
            .call(|done| Request::Save { key, bytes, done })
            .await
            .is_err()
        {
            warn!(folder = %self.shared.folder, "save dropped: disk store closed");
        }
    }

    /// Reads the bytes for `key`; absent on a miss or any failure.
    pub async fn load(&self, key: &str) -> Option<Vec<u8>> {
        let key = key.to_string();
        self.call(|reply| Request::Load { key, reply })
            .await
            .ok()
            .flatten()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let key = key.to_string();
        self.call(|reply| Request::Contains { key, reply })
            .await
            .unwrap_or(false)
    }

    /// Removes the file for `key`. A missing file is
    /// [`CacheError::NotFound`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.call(|reply| Request::Delete { key, reply }).await?
    }

    /// Removes every file in the directory.
    pub async fn delete_all(&self) -> Result<()> {
        self.call(|reply| Request::DeleteAll { reply }).await?
    }

    /// Keeps the `limit` oldest files and removes the rest.
    pub async fn enforce_count_limit(&self, limit: usize) -> Result<()> {
        self.call(|reply| Request::EnforceCountLimit { limit, reply })
            .await?
    }

    /// Applies the configured count limit; no-op when it is `0`.
    pub async fn check_and_enforce_count_limit(&self) {
        let _ = self.call(|done| Request::CheckCountLimit { done }).await;
    }

    /// Keys currently on disk, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.call(|reply| Request::Keys { reply }).await?
    }

    pub async fn file_count(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    /// Completes once every request queued before it has been handled.
    pub async fn flush(&self) -> Result<()> {
        self.call(|done| Request::Flush { done }).await
    }

    /// Finishes queued requests, then stops the worker. Requests queued after
    /// the shutdown are dropped.
    pub async fn shutdown(&self) {
        let _ = self.call(|done| Request::Shutdown { done }).await;
    }

    // -- blocking ----------------------------------------------------------

    fn call_blocking<T: Send + 'static>(
        &self,
        make: impl FnOnce(Responder<T>) -> Request,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .requests
            .blocking_send(make(reply_to(tx)))
            .map_err(|_| CacheError::Closed)?;
        rx.blocking_recv().map_err(|_| CacheError::Closed)
    }

    pub fn save_blocking(&self, key: &str, bytes: Vec<u8>) {
        let key = key.to_string();
        let _ = self.call_blocking(|done| Request::Save { key, bytes, done });
    }

    pub fn load_blocking(&self, key: &str) -> Option<Vec<u8>> {
        let key = key.to_string();
        self.call_blocking(|reply| Request::Load { key, reply })
            .ok()
            .flatten()
    }

    pub fn delete_blocking(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.call_blocking(|reply| Request::Delete { key, reply })?
    }

    pub fn delete_all_blocking(&self) -> Result<()> {
        self.call_blocking(|reply| Request::DeleteAll { reply })?
    }

    pub fn flush_blocking(&self) -> Result<()> {
        self.call_blocking(|done| Request::Flush { done })
    }

    // -- non-blocking ------------------------------------------------------

    /// Loads `key` and hands the result to `callback` on the worker thread.
    pub fn load_with<F>(&self, key: &str, callback: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        let request = Request::Load {
            key: key.to_string(),
            reply: Box::new(callback),
        };
        if let Err(err) = self.shared.requests.try_send(request) {
            warn!(folder = %self.shared.folder, "load queued as miss: request queue unavailable");
            if let Request::Load { reply, .. } = err.into_inner() {
                reply(None);
            }
        }
    }

    /// Queues a write-back without waiting. `encode` runs on the worker
    /// thread; returning `None` drops the write-back.
    ///
    /// Returns `false` when the queue is full or closed; the write-back is
    /// dropped and counted in [`DiskMetrics::dropped_write_backs`].
    pub fn submit_write_back<E>(&self, key: String, encode: E) -> bool
    where
        E: FnOnce() -> Option<Vec<u8>> + Send + 'static,
    {
        self.shared
            .pending_write_backs
            .fetch_add(1, Ordering::AcqRel);
        let request = Request::WriteBack {
            key,
            encode: Box::new(encode),
        };
        match self.shared.requests.try_send(request) {
            Ok(()) => true,
            Err(err) => {
                self.shared
                    .pending_write_backs
                    .fetch_sub(1, Ordering::AcqRel);
                self.shared.counters.inc_dropped_write_back();
                if let Request::WriteBack { key, .. } = err.into_inner() {
                    warn!(folder = %self.shared.folder, key = %key, "write-back dropped: request queue unavailable");
                }
                false
            },
        }
    }
}

impl fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskStore")
            .field("directory", &self.shared.directory)
            .field("count_limit", &self.shared.count_limit)
            .field("pending_write_backs", &self.pending_write_backs())
            .finish_non_exhaustive()
    }
}

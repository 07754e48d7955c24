//! Serialized disk worker.
//!
//! One OS thread per [`DiskStore`](super::DiskStore) drains a FIFO request
//! queue and performs the filesystem work. Requests are handled strictly in
//! submission order, so no two filesystem mutations on one store interleave
//! and a write-back queued before a delete always lands before it.

use std::cmp::Ordering as CmpOrdering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::store::disk::key::{decode_key, encode_key};
use crate::store::traits::DiskCounters;

/// Completion callback run on the worker thread.
pub(crate) type Responder<T> = Box<dyn FnOnce(T) + Send>;

/// Deferred encoder for a write-back; `None` drops the write-back.
pub(crate) type Encoder = Box<dyn FnOnce() -> Option<Vec<u8>> + Send>;

pub(crate) enum Request {
    Save {
        key: String,
        bytes: Vec<u8>,
        done: Responder<()>,
    },
    WriteBack {
        key: String,
        encode: Encoder,
    },
    Load {
        key: String,
        reply: Responder<Option<Vec<u8>>>,
    },
    Contains {
        key: String,
        reply: Responder<bool>,
    },
    Delete {
        key: String,
        reply: Responder<Result<()>>,
    },
    DeleteAll {
        reply: Responder<Result<()>>,
    },
    EnforceCountLimit {
        limit: usize,
        reply: Responder<Result<()>>,
    },
    CheckCountLimit {
        done: Responder<()>,
    },
    Keys {
        reply: Responder<Result<Vec<String>>>,
    },
    Flush {
        done: Responder<()>,
    },
    Shutdown {
        done: Responder<()>,
    },
}

/// A cached file and the timestamp used for retention ordering.
#[derive(Debug)]
struct StoredFile {
    path: PathBuf,
    name: String,
    created: SystemTime,
}

pub(crate) struct DiskWorker {
    pub(crate) directory: PathBuf,
    pub(crate) count_limit: usize,
    pub(crate) counters: Arc<DiskCounters>,
    pub(crate) pending_write_backs: Arc<AtomicUsize>,
}

impl DiskWorker {
    /// Runs until every sender is gone or a shutdown request arrives.
    pub(crate) fn run(self, mut requests: mpsc::Receiver<Request>) {
        info!(directory = %self.directory.display(), "disk worker started");
        self.check_and_enforce_count_limit();

        while let Some(request) = requests.blocking_recv() {
            if let Request::Shutdown { done } = request {
                requests.close();
                while let Ok(rest) = requests.try_recv() {
                    self.abandon(rest);
                }
                done(());
                break;
            }
            self.handle(request);
        }

        info!(directory = %self.directory.display(), "disk worker stopped");
    }

    fn handle(&self, request: Request) {
        match request {
            Request::Save { key, bytes, done } => {
                self.save(&key, &bytes);
                done(());
            },
            Request::WriteBack { key, encode } => {
                match encode() {
                    Some(bytes) => {
                        if self.save(&key, &bytes) {
                            self.counters.inc_write_back();
                            debug!(key = %key, bytes = bytes.len(), "write-back persisted");
                        }
                    },
                    None => debug!(key = %key, "write-back skipped: nothing to persist"),
                }
                self.pending_write_backs.fetch_sub(1, Ordering::AcqRel);
            },
            Request::Load { key, reply } => reply(self.load(&key)),
            Request::Contains { key, reply } => reply(self.contains(&key)),
            Request::Delete { key, reply } => reply(self.delete(&key)),
            Request::DeleteAll { reply } => reply(self.delete_all()),
            Request::EnforceCountLimit { limit, reply } => reply(self.enforce_count_limit(limit)),
            Request::CheckCountLimit { done } => {
                self.check_and_enforce_count_limit();
                done(());
            },
            Request::Keys { reply } => reply(self.keys()),
            Request::Flush { done } => done(()),
            Request::Shutdown { done } => done(()),
        }
    }

    /// Answers requests still queued behind a shutdown without touching the
    /// disk: loads miss, fallible requests see [`CacheError::Closed`].
    fn abandon(&self, request: Request) {
        match request {
            Request::WriteBack { key, .. } => {
                self.pending_write_backs.fetch_sub(1, Ordering::AcqRel);
                self.counters.inc_dropped_write_back();
                warn!(key = %key, "write-back abandoned at shutdown");
            },
            Request::Load { reply, .. } => reply(None),
            Request::Contains { reply, .. } => reply(false),
            Request::Delete { reply, .. }
            | Request::DeleteAll { reply }
            | Request::EnforceCountLimit { reply, .. } => reply(Err(CacheError::Closed)),
            Request::Keys { reply } => reply(Err(CacheError::Closed)),
            Request::Save { done, .. }
            | Request::CheckCountLimit { done }
            | Request::Flush { done }
            | Request::Shutdown { done } => done(()),
        }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        encode_key(key).map(|name| self.directory.join(name))
    }

    /// Writes `bytes` for `key`. Failures are logged and swallowed.
    fn save(&self, key: &str, bytes: &[u8]) -> bool {
        let Some(path) = self.path_for(key) else {
            self.counters.inc_save_failure();
            warn!("save skipped: empty key");
            return false;
        };
        let result =
            fs::create_dir_all(&self.directory).and_then(|()| fs::write(&path, bytes));
        match result {
            Ok(()) => {
                self.counters.inc_save();
                true
            },
            Err(err) => {
                self.counters.inc_save_failure();
                warn!(key = %key, path = %path.display(), error = %err, "save failed");
                false
            },
        }
    }

    /// Reads the file for `key`; missing or unreadable files are a miss.
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key = %key, path = %path.display(), error = %err, "load failed");
                None
            },
        };
        self.counters.record_load(bytes.is_some());
        bytes
    }

    fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_some_and(|path| path.is_file())
    }

    /// Removes the file for `key`; a missing file is reported as an error.
    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key).ok_or(CacheError::InvalidKey)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.counters.inc_delete();
                Ok(())
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound {
                key: key.to_string(),
            }),
            Err(err) => Err(CacheError::io(path, err)),
        }
    }

    /// Removes every entry in the directory. Stops at the first failure;
    /// entries removed before it stay removed.
    fn delete_all(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CacheError::io(&self.directory, err)),
        };
        let mut removed = 0u64;
        for entry in entries {
            let entry = entry.map_err(|err| CacheError::io(&self.directory, err))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|err| CacheError::io(&path, err))?;
            let result = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|err| CacheError::io(&path, err))?;
            removed += 1;
        }
        debug!(directory = %self.directory.display(), removed, "cleared disk tier");
        Ok(())
    }

    /// Runs [`Self::enforce_count_limit`] with the configured limit, logging
    /// and swallowing any failure. A limit of `0` disables retention.
    fn check_and_enforce_count_limit(&self) {
        if self.count_limit == 0 {
            return;
        }
        if let Err(err) = self.enforce_count_limit(self.count_limit) {
            warn!(limit = self.count_limit, error = %err, "count limit enforcement failed");
        }
    }

    /// Leaves at most `limit` files in the directory.
    ///
    /// Files are ordered by creation time, oldest first (ties broken by
    /// filename), and everything after the first `limit` is removed: the
    /// oldest files are kept and recently written entries go first.
    fn enforce_count_limit(&self, limit: usize) -> Result<()> {
        let mut files = self.list_files()?;
        if files.len() <= limit {
            return Ok(());
        }
        files.sort_by(|a, b| match a.created.cmp(&b.created) {
            CmpOrdering::Equal => a.name.cmp(&b.name),
            other => other,
        });

        let mut removed = 0u64;
        let result = files.iter().skip(limit).try_for_each(|file| {
            fs::remove_file(&file.path).map_err(|err| CacheError::io(&file.path, err))?;
            removed += 1;
            Ok::<(), CacheError>(())
        });
        self.counters.add_retention_removals(removed);
        debug!(limit, removed, "count limit enforced");
        result
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .list_files()?
            .into_iter()
            .filter_map(|file| decode_key(&file.name))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn list_files(&self) -> Result<Vec<StoredFile>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CacheError::io(&self.directory, err)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CacheError::io(&self.directory, err))?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|err| CacheError::io(&path, err))?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                created: creation_time(&path, &metadata)?,
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
        Ok(files)
    }
}

/// Birth time where the filesystem records it, modification time otherwise.
fn creation_time(path: &Path, metadata: &fs::Metadata) -> Result<SystemTime> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|err| CacheError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn worker(dir: &TempDir, count_limit: usize) -> DiskWorker {
        DiskWorker {
            directory: dir.path().join("cache"),
            count_limit,
            counters: Arc::new(DiskCounters::default()),
            pending_write_backs: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn save_creates_directory_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        assert!(worker.save("k", &[1, 2, 3]));
        assert!(worker.directory.is_dir());
        assert_eq!(worker.load("k"), Some(vec![1, 2, 3]));
        assert_eq!(worker.load("missing"), None);
    }

    #[test]
    fn delete_reports_missing_key() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        worker.save("k", b"v");
        assert!(worker.delete("k").is_ok());
        assert!(matches!(worker.delete("k"), Err(CacheError::NotFound { .. })));
        assert!(matches!(worker.delete(""), Err(CacheError::InvalidKey)));
    }

    #[test]
    fn delete_all_on_missing_directory_is_ok() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        assert!(worker.delete_all().is_ok());
    }

    #[test]
    fn enforce_keeps_the_oldest_files() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        for key in ["first", "second", "third", "fourth"] {
            worker.save(key, key.as_bytes());
            sleep(Duration::from_millis(20));
        }
        worker.enforce_count_limit(2).unwrap();
        assert_eq!(worker.keys().unwrap(), vec!["first", "second"]);
        assert_eq!(worker.counters.snapshot().retention_removals, 2);
    }

    #[test]
    fn enforce_under_limit_removes_nothing() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        worker.save("a", b"1");
        worker.enforce_count_limit(5).unwrap();
        assert_eq!(worker.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn zero_limit_disables_check() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        for i in 0..3 {
            worker.save(&format!("k{i}"), b"x");
        }
        worker.check_and_enforce_count_limit();
        assert_eq!(worker.keys().unwrap().len(), 3);
    }

    #[test]
    fn keys_are_decoded_and_foreign_files_skipped() {
        let dir = TempDir::new().unwrap();
        let worker = worker(&dir, 0);
        worker.save("a/b", b"1");
        fs::write(worker.directory.join("not a key"), b"x").unwrap();
        assert_eq!(worker.keys().unwrap(), vec!["a/b"]);
    }
}

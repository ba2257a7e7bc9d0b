//! File-backed [`ResultsStore`]: one JSON array guarded by a sidecar lock.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::merge::{apply_upsert, typed_rows, UpsertOutcome};
use crate::record::{ResultRecord, ScoreUpsert};
use crate::store::ResultsStore;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Leaderboard persisted as one pretty-printed JSON array.
///
/// Writers take an exclusive advisory lock on a sidecar `<file>.lock` for the
/// whole read-modify-write cycle, then replace the data file by renaming a
/// fully written temp file over it. Readers without the lock therefore see
/// either the old or the new array, never a partial one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Option<Duration>,
}

/// Held lock; released on drop.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!(error = %e, "failed to release leaderboard lock");
        }
    }
}

impl JsonFileStore {
    /// Store backed by `path`; the lock file is `<path>.lock`. Nothing is
    /// created until the first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
            lock_timeout: None,
        }
    }

    /// Give up waiting for the lock after `timeout`; `None` waits forever.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The leaderboard file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sidecar lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn open_lock_file(&self) -> StoreResult<File> {
        if let Some(dir) = self.lock_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Open {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|source| StoreError::Open {
                path: self.lock_path.clone(),
                source,
            })
    }

    fn acquire(&self, exclusive: bool) -> StoreResult<LockGuard> {
        let file = self.open_lock_file()?;

        let Some(timeout) = self.lock_timeout else {
            let locked = if exclusive {
                file.lock()
            } else {
                file.lock_shared()
            };
            locked.map_err(|source| StoreError::Lock {
                path: self.lock_path.clone(),
                source,
            })?;
            return Ok(LockGuard { file });
        };

        let start = Instant::now();
        loop {
            let attempt = if exclusive {
                file.try_lock()
            } else {
                file.try_lock_shared()
            };
            match attempt {
                Ok(()) => return Ok(LockGuard { file }),
                Err(TryLockError::WouldBlock) => {
                    if start.elapsed() >= timeout {
                        return Err(StoreError::LockTimeout {
                            path: self.lock_path.clone(),
                            waited: start.elapsed(),
                        });
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(TryLockError::Error(source)) => {
                    return Err(StoreError::Lock {
                        path: self.lock_path.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Current rows. Missing, empty, unparseable or non-array content reads
    /// as an empty leaderboard.
    fn load_rows(&self) -> StoreResult<Vec<Value>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(_) => {
                warn!(path = %self.path.display(), "leaderboard is not a JSON array; starting empty");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "leaderboard is not valid JSON; starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn write_rows(&self, rows: &[Value]) -> StoreResult<()> {
        let encoded = encode_pretty(rows)?;

        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&encoded).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        set_permissions_like_existing(tmp.as_file(), &self.path).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl ResultsStore for JsonFileStore {
    fn upsert(&self, req: &ScoreUpsert) -> StoreResult<UpsertOutcome> {
        let _guard = self.acquire(true)?;
        let mut rows = self.load_rows()?;
        let outcome = apply_upsert(&mut rows, req);
        self.write_rows(&rows)?;
        debug!(
            path = %self.path.display(),
            rows = rows.len(),
            inserted = outcome.inserted,
            "leaderboard rewritten"
        );
        Ok(outcome)
    }

    fn read_all(&self) -> StoreResult<Vec<ResultRecord>> {
        let _guard = self.acquire(false)?;
        let rows = self.load_rows()?;
        Ok(typed_rows(&rows))
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Four-space indentation; forward slashes are never escaped by serde_json.
fn encode_pretty(rows: &[Value]) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    rows.serialize(&mut ser)?;
    Ok(buf)
}

/// Temp files are created `0600`; keep the leaderboard readable by the web tier.
fn set_permissions_like_existing(file: &File, target: &Path) -> std::io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => file.set_permissions(meta.permissions()),
        Err(_) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o644))
            }
            #[cfg(not(unix))]
            {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScoreMetrics;

    fn make_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("leaderboard.json"));
        (dir, store)
    }

    fn req(model: &str) -> ScoreUpsert {
        ScoreUpsert::new("gen2", 100, model, ScoreMetrics::new(0.5, 0.6, 0.4), 10, None)
    }

    #[test]
    fn lock_path_is_sidecar() {
        let store = JsonFileStore::new("/srv/board.json");
        assert_eq!(store.lock_path(), Path::new("/srv/board.json.lock"));
    }

    #[test]
    fn creates_parent_directory_on_first_write() {
        let (_dir, store) = make_store();
        assert!(!store.path().exists());
        store.upsert(&req("a/b")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn output_is_four_space_pretty_with_literal_slashes() {
        let (_dir, store) = make_store();
        store.upsert(&req("vendor/model-name")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n    {\n        \"team\""), "got: {raw}");
        assert!(raw.contains("\"vendor/model-name\""));
        assert!(!raw.contains("\\/"));
    }

    #[test]
    fn object_top_level_reads_as_empty() {
        let (_dir, store) = make_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"not": "an array"}"#).unwrap();

        assert!(store.read_all().unwrap().is_empty());
        store.upsert(&req("a/b")).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn new_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = make_store();
        store.upsert(&req("a/b")).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o644, 0o644);
    }

    #[test]
    fn lock_timeout_when_held_elsewhere() {
        let (_dir, store) = make_store();
        let store = store.with_lock_timeout(Some(Duration::from_millis(100)));

        let holder = store.open_lock_file().unwrap();
        holder.lock().unwrap();

        match store.upsert(&req("a/b")) {
            Err(StoreError::LockTimeout { .. }) => {}
            other => panic!("expected LockTimeout, got {other:?}"),
        }
        assert!(!store.path().exists(), "nothing written while locked");

        holder.unlock().unwrap();
        store.upsert(&req("a/b")).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 1);
    }
}

//! # File Cursor Store
//!
//! Cursor persisted as a small JSON record in the data directory.
//!
//! Writes go to a temp file that is fsynced and atomically renamed over the
//! previous record, so a crash leaves either the old or the new cursor.
//! An exclusive `fs2` lock on `data_dir/LOCK` is held for the lifetime of
//! the store; a second relayer pointed at the same directory fails to open.

use crate::domain::{BlockHeight, RelayerError, RelayerResult};
use crate::ports::outbound::CursorStore;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk cursor record.
#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    cursor: BlockHeight,
    committed_at: DateTime<Utc>,
}

/// Durable cursor store backed by a JSON file.
pub struct FileCursorStore {
    path: PathBuf,
    tmp_path: PathBuf,
    lock_path: PathBuf,
    lock_file: File,
    write_guard: Mutex<()>,
}

impl FileCursorStore {
    const CURSOR_FILE: &'static str = "cursor.json";
    const LOCK_FILE: &'static str = "LOCK";

    /// Open (creating if needed) the store in `data_dir` and take the lock.
    ///
    /// # Errors
    ///
    /// `CursorStore` if the directory cannot be created or another process
    /// holds the lock.
    pub fn open(data_dir: &Path) -> RelayerResult<Self> {
        fs::create_dir_all(data_dir).map_err(|e| io_error("create data dir", data_dir, e))?;

        let lock_path = data_dir.join(Self::LOCK_FILE);
        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| io_error("open lock file", &lock_path, e))?;

        if FileExt::try_lock_exclusive(&lock_file).is_err() {
            let holder = fs::read_to_string(&lock_path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            return Err(RelayerError::CursorStore(match holder {
                Some(pid) => format!(
                    "{} already in use by process {}",
                    data_dir.display(),
                    pid
                ),
                None => format!("{} already in use", data_dir.display()),
            }));
        }

        lock_file
            .set_len(0)
            .and_then(|_| writeln!(lock_file, "{}", std::process::id()))
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| io_error("write lock file", &lock_path, e))?;

        info!("[cursor] file store opened at {}", data_dir.display());
        Ok(Self {
            path: data_dir.join(Self::CURSOR_FILE),
            tmp_path: data_dir.join(format!("{}.tmp", Self::CURSOR_FILE)),
            lock_path,
            lock_file,
            write_guard: Mutex::new(()),
        })
    }

    /// Path of the cursor record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CursorStore for FileCursorStore {
    fn load_cursor(&self) -> RelayerResult<Option<BlockHeight>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read cursor", &self.path, e)),
        };

        let record: CursorRecord = serde_json::from_slice(&bytes).map_err(|e| {
            RelayerError::CursorStore(format!("corrupt cursor at {}: {}", self.path.display(), e))
        })?;
        debug!(
            "[cursor] loaded {} (committed {})",
            record.cursor, record.committed_at
        );
        Ok(Some(record.cursor))
    }

    fn save_cursor(&self, height: BlockHeight) -> RelayerResult<()> {
        let _guard = self.write_guard.lock();

        let record = CursorRecord {
            cursor: height,
            committed_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| RelayerError::CursorStore(format!("encode cursor: {}", e)))?;

        let mut tmp = File::create(&self.tmp_path)
            .map_err(|e| io_error("create temp cursor", &self.tmp_path, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.sync_all())
            .map_err(|e| io_error("write temp cursor", &self.tmp_path, e))?;
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)
            .map_err(|e| io_error("rename cursor", &self.path, e))?;
        sync_parent_dir(&self.path);
        Ok(())
    }
}

impl Drop for FileCursorStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn io_error(action: &str, path: &Path, e: io::Error) -> RelayerError {
    RelayerError::CursorStore(format!("{} {}: {}", action, path.display(), e))
}

/// Persist the rename itself. Directories cannot be opened on every
/// platform; there the rename is as durable as the filesystem makes it.
fn sync_parent_dir(path: &Path) {
    if let Some(dir) = path.parent().and_then(|dir| File::open(dir).ok()) {
        let _ = dir.sync_all();
    }
}

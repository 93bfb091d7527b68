//! Append-only JSON-lines dead-letter log.

use crate::domain::{DeadLetter, RelayerError, RelayerResult};
use crate::ports::outbound::DeadLetterSink;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One JSON object per line, fsynced per record.
pub struct JsonlDeadLetterLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDeadLetterLog {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: impl Into<PathBuf>) -> RelayerResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                RelayerError::DeadLetterSink(format!("open {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeadLetterSink for JsonlDeadLetterLog {
    fn record(&self, letter: &DeadLetter) -> RelayerResult<()> {
        let mut line = serde_json::to_vec(letter)
            .map_err(|e| RelayerError::DeadLetterSink(format!("encode: {}", e)))?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)
            .and_then(|_| file.sync_data())
            .map_err(|e| {
                RelayerError::DeadLetterSink(format!("append {}: {}", self.path.display(), e))
            })
    }
}

//! # RocksDB Cursor Store
//!
//! Cursor under a fixed key in a `metadata` column family, written with
//! `sync` so a returned save survives power loss.

use crate::domain::{BlockHeight, RelayerError, RelayerResult};
use crate::ports::outbound::CursorStore;
use rocksdb::{ColumnFamilyDescriptor, Options, WriteOptions, DB};
use std::path::Path;
use tracing::info;

/// Column family holding relayer metadata
pub const CF_METADATA: &str = "metadata";

/// Key of the committed cursor (big-endian u64 value)
pub const CURSOR_KEY: &[u8] = b"scan_cursor";

/// RocksDB-backed cursor store.
pub struct RocksDbCursorStore {
    db: DB,
}

impl RocksDbCursorStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> RelayerResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_METADATA, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf]).map_err(|e| {
            RelayerError::CursorStore(format!("Failed to open RocksDB: {}", e))
        })?;

        info!("[cursor] rocksdb store opened at {}", path.display());
        Ok(Self { db })
    }
}

impl CursorStore for RocksDbCursorStore {
    fn load_cursor(&self) -> RelayerResult<Option<BlockHeight>> {
        let cf = self
            .db
            .cf_handle(CF_METADATA)
            .ok_or_else(|| RelayerError::CursorStore("missing metadata column family".into()))?;

        let value = self
            .db
            .get_cf(&cf, CURSOR_KEY)
            .map_err(|e| RelayerError::CursorStore(format!("RocksDB get failed: {}", e)))?;

        match value {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    let len = bytes.len();
                    RelayerError::CursorStore(format!("corrupt cursor value ({} bytes)", len))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
        }
    }

    fn save_cursor(&self, height: BlockHeight) -> RelayerResult<()> {
        let cf = self
            .db
            .cf_handle(CF_METADATA)
            .ok_or_else(|| RelayerError::CursorStore("missing metadata column family".into()))?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);

        self.db
            .put_cf_opt(&cf, CURSOR_KEY, height.to_be_bytes(), &write_opts)
            .map_err(|e| RelayerError::CursorStore(format!("RocksDB put failed: {}", e)))
    }
}

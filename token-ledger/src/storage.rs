//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `state` - Current values: account records (simple keys) and index entries (composite keys)
//! - `history` - Every committed version of a simple key (key: key || 0x00 || seq)
//! - `meta` - Bookkeeping (history sequence)
//!
//! All writes of one operation land in a single [`WriteBatch`].

use crate::{error::Error, keys, types::TxId, Config, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Column family names
const CF_STATE: &str = "state";
const CF_HISTORY: &str = "history";
const CF_META: &str = "meta";

const META_HISTORY_SEQ: &[u8] = b"history_seq";

/// Buffered writes of one operation: `Some` = put, `None` = delete
pub type WriteSet = BTreeMap<String, Option<Vec<u8>>>;

/// One committed version of a simple key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModification {
    /// Operation that committed it
    pub tx_id: TxId,
    /// New value, `None` when the key was deleted
    pub value: Option<Vec<u8>>,
    /// Commit time (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}

impl KeyModification {
    /// Whether this version deleted the key
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }

    /// Commit time
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp_nanos)
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    /// Next history sequence; the lock also serializes commits
    next_seq: Mutex<u64>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_STATE, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_HISTORY, Self::cf_options_history()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_META)
                .ok_or_else(|| Error::StateAccess(format!("Column family {} not found", CF_META)))?;
            match db.get_cf(cf, META_HISTORY_SEQ)? {
                Some(bytes) => decode_seq(&bytes)?,
                None => 0,
            }
        };

        tracing::info!(path = ?path, next_seq, "Opened RocksDB ledger store");

        Ok(Self {
            db: Arc::new(db),
            next_seq: Mutex::new(next_seq),
        })
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups on account ids and txIds
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_history() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::StateAccess(format!("Column family {} not found", name)))
    }

    /// Current value of a key
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(CF_STATE)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?)
    }

    /// All committed `(key, value)` pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let cf = self.cf_handle(CF_STATE)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let key = String::from_utf8(key.into_vec())
                .map_err(|e| Error::StateAccess(format!("Non UTF-8 key in state: {}", e)))?;
            entries.push((key, value.into_vec()));
        }

        tracing::debug!(prefix = ?prefix, count = entries.len(), "Prefix scan");
        Ok(entries)
    }

    /// Whether no key has ever been committed (or every key was deleted)
    pub fn is_empty(&self) -> Result<bool> {
        let cf = self.cf_handle(CF_STATE)?;
        match self.db.iterator_cf(cf, IteratorMode::Start).next() {
            Some(item) => {
                item?;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Every committed version of a simple key, oldest first
    pub fn history(&self, key: &str) -> Result<Vec<KeyModification>> {
        let cf = self.cf_handle(CF_HISTORY)?;
        let prefix = history_prefix(key);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward));

        let mut versions = Vec::new();
        for item in iter {
            let (k, value) = item?;
            if !k.starts_with(&prefix) {
                break;
            }
            versions.push(bincode::deserialize(&value)?);
        }
        Ok(versions)
    }

    /// Apply the writes of one operation atomically
    pub fn commit(&self, tx_id: &TxId, timestamp: DateTime<Utc>, writes: &WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let cf_state = self.cf_handle(CF_STATE)?;
        let cf_history = self.cf_handle(CF_HISTORY)?;
        let cf_meta = self.cf_handle(CF_META)?;
        let timestamp_nanos = timestamp.timestamp_nanos_opt().unwrap_or(0);

        let mut next_seq = self.next_seq.lock();
        let mut seq = *next_seq;
        let mut batch = WriteBatch::default();

        for (key, value) in writes {
            match value {
                Some(bytes) => batch.put_cf(cf_state, key.as_bytes(), bytes),
                None => batch.delete_cf(cf_state, key.as_bytes()),
            }

            // Index entries carry no history
            if keys::is_composite(key) {
                continue;
            }
            let modification = KeyModification {
                tx_id: tx_id.clone(),
                value: value.clone(),
                timestamp_nanos,
            };
            let mut history_key = history_prefix(key);
            history_key.extend_from_slice(&seq.to_be_bytes());
            batch.put_cf(cf_history, &history_key, bincode::serialize(&modification)?);
            seq += 1;
        }
        batch.put_cf(cf_meta, META_HISTORY_SEQ, seq.to_be_bytes());

        self.db.write(batch)?;
        *next_seq = seq;

        tracing::debug!(tx_id = %tx_id, writes = writes.len(), "Committed write set");
        Ok(())
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

fn history_prefix(key: &str) -> Vec<u8> {
    let mut prefix = key.as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::StateAccess("Corrupt history sequence".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

//! Per-operation unit of work
//!
//! A [`TxContext`] is opened for every public operation. Reads go through
//! its write buffer first, so an operation sees its own writes; nothing
//! reaches the store until [`TxContext::commit`]. Dropping a context (for
//! instance on an early `?` return) discards every buffered write.

use crate::{
    storage::{KeyModification, Storage, WriteSet},
    types::TxId,
    Result,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Buffered view of the ledger store for one operation
#[derive(Debug)]
pub struct TxContext<'a> {
    storage: &'a Storage,
    tx_id: TxId,
    timestamp: DateTime<Utc>,
    writes: WriteSet,
}

impl<'a> TxContext<'a> {
    /// Open a unit of work with a fresh transaction id
    pub fn begin(storage: &'a Storage) -> Self {
        Self::with_tx_id(storage, TxId::generate())
    }

    /// Open a unit of work with a caller-supplied transaction id
    pub fn with_tx_id(storage: &'a Storage, tx_id: TxId) -> Self {
        Self {
            storage,
            tx_id,
            timestamp: Utc::now(),
            writes: WriteSet::new(),
        }
    }

    /// Transaction id of this operation
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Current value of a key, including this operation's writes
    pub fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.storage.get(key),
        }
    }

    /// Buffer a put
    pub fn put_state(&mut self, key: String, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    /// Buffer a delete
    pub fn del_state(&mut self, key: String) {
        self.writes.insert(key, None);
    }

    /// Keys starting with `prefix` in key order, including this operation's writes
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut merged: BTreeMap<String, Vec<u8>> =
            self.storage.scan_prefix(prefix)?.into_iter().collect();

        for (key, value) in self
            .writes
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match value {
                Some(bytes) => {
                    merged.insert(key.clone(), bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Committed versions of a simple key
    pub fn history_for_key(&self, key: &str) -> Result<Vec<KeyModification>> {
        self.storage.history(key)
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Apply every buffered write atomically
    pub fn commit(self) -> Result<TxId> {
        self.storage
            .commit(&self.tx_id, self.timestamp, &self.writes)?;
        Ok(self.tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_read_your_writes() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        ctx.put_state("k".into(), b"v".to_vec());
        assert_eq!(ctx.get_state("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_drop_discards_writes() {
        let (storage, _temp) = test_storage();
        {
            let mut ctx = TxContext::begin(&storage);
            ctx.put_state("k".into(), b"v".to_vec());
        }
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_scan_merges_buffer() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::begin(&storage);
        ctx.put_state("p/a".into(), b"1".to_vec());
        ctx.put_state("p/b".into(), b"2".to_vec());
        ctx.commit().unwrap();

        let mut ctx = TxContext::begin(&storage);
        ctx.del_state("p/a".into());
        ctx.put_state("p/c".into(), b"3".to_vec());
        ctx.put_state("q/x".into(), b"9".to_vec());

        let keys: Vec<String> = ctx
            .scan_prefix("p/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["p/b".to_string(), "p/c".to_string()]);
    }

    #[test]
    fn test_commit_returns_tx_id_and_records_history() {
        let (storage, _temp) = test_storage();
        let mut ctx = TxContext::with_tx_id(&storage, TxId::new("tx-1"));
        ctx.put_state("acc".into(), b"v".to_vec());
        ctx.put_state("acc".into(), b"v2".to_vec());
        assert_eq!(ctx.pending_writes(), 1);
        let tx_id = ctx.commit().unwrap();
        assert_eq!(tx_id, TxId::new("tx-1"));

        let ctx = TxContext::begin(&storage);
        let history = ctx.history_for_key("acc").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, Some(b"v2".to_vec()));
    }
}

//! File name → stored document lookup without a scan.
//!
//! Keys are hashed to 32 bits; every write under a hash is appended as a new
//! record `[u32 key length][key bytes][value bytes]`. A read walks the
//! records under the hash newest first and returns the first whose embedded
//! key matches exactly, so colliding names coexist.

use crate::error::{HootError, Result};
use crate::index::types::{EngineConfig, RecordNo, ext};
use crate::store::{KeyStore, SaveTimer};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// 32-bit key hash over the folded key's bytes
pub type KeyHasher = fn(&[u8]) -> u32;

pub struct HashedDocumentIndex {
    store: Arc<KeyStore>,
    timer: Mutex<Option<SaveTimer>>,
    case_sensitive: bool,
    hasher: KeyHasher,
}

/// Pack a key and value into one archive record
fn pack(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(4 + key.len() + value.len());
    record.extend_from_slice(&(key.len() as u32).to_le_bytes());
    record.extend_from_slice(key);
    record.extend_from_slice(value);
    record
}

/// Split a packed record into key and value
fn unpack(record: &[u8]) -> Option<(&[u8], &[u8])> {
    let len_bytes: [u8; 4] = record.get(..4)?.try_into().ok()?;
    let key_len = u32::from_le_bytes(len_bytes) as usize;
    let key = record.get(4..4 + key_len)?;
    Some((key, &record[4 + key_len..]))
}

impl HashedDocumentIndex {
    /// Open the archive and key index named by `config` and start the save timer
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let store = KeyStore::open(
            &config.file_path(ext::KEY_INDEX),
            &config.file_path(ext::ARCHIVE),
        )?;
        let index = Self::with_store(store, config.case_sensitive_keys, crc32fast::hash);

        let store = Arc::clone(&index.store);
        let timer = SaveTimer::start(config.save_interval(), move || store.save())?;
        *index.timer.lock() = Some(timer);
        Ok(index)
    }

    /// Build over an existing store without a save timer
    pub fn with_store(store: KeyStore, case_sensitive: bool, hasher: KeyHasher) -> Self {
        Self {
            store: Arc::new(store),
            timer: Mutex::new(None),
            case_sensitive,
            hasher,
        }
    }

    fn fold(&self, key: &str) -> String {
        if self.case_sensitive {
            key.to_string()
        } else {
            key.to_lowercase()
        }
    }

    /// Store `value` as the newest record for `key`
    pub fn set(&self, key: &str, value: &[u8]) -> Result<RecordNo> {
        let key = self.fold(key);
        let hash = (self.hasher)(key.as_bytes());
        self.store.set(hash, &pack(key.as_bytes(), value))
    }

    /// Newest value stored for `key`
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.find(key)?.map(|(_, value)| value))
    }

    /// Newest record number and value stored for `key`
    pub fn find(&self, key: &str) -> Result<Option<(RecordNo, Vec<u8>)>> {
        let key = self.fold(key);
        let hash = (self.hasher)(key.as_bytes());

        for (walked, rec) in self.store.duplicates(hash).into_iter().enumerate() {
            let record = self.store.read(rec)?;
            let (stored_key, value) = unpack(&record)
                .ok_or_else(|| HootError::corrupt("hashed index", rec as u64, "malformed key record"))?;
            if stored_key == key.as_bytes() {
                if walked > 0 {
                    debug!(hash, walked, "resolved hash collision");
                }
                return Ok(Some((rec, value.to_vec())));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Value part of the record at `rec`
    pub fn read_value(&self, rec: RecordNo) -> Result<Vec<u8>> {
        let record = self.store.read(rec)?;
        unpack(&record)
            .map(|(_, value)| value.to_vec())
            .ok_or_else(|| HootError::corrupt("hashed index", rec as u64, "malformed key record"))
    }

    /// Records written so far
    pub fn count(&self) -> u32 {
        self.store.record_count()
    }

    pub fn save(&self) -> Result<()> {
        self.store.save()
    }

    pub fn free_memory(&self) {
        self.store.free_memory();
    }

    /// Stop the save timer, then save and close the store
    pub fn shutdown(&self) -> Result<()> {
        if let Some(mut timer) = self.timer.lock().take() {
            timer.stop();
        }
        self.store.shutdown()
    }
}

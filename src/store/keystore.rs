use crate::error::{HootError, Result};
use crate::index::types::RecordNo;
use crate::store::{Archive, KeyIndex, OrderedIndex, RecordLog};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Archive plus ordered index, kept in step.
///
/// Writes go to the archive first; the index catches up from the archive on
/// open if the process died between the two.
pub struct KeyStore {
    index: Box<dyn OrderedIndex>,
    archive: Box<dyn Archive>,
    /// Serializes archive append + index update
    write_lock: Mutex<()>,
    /// Shared by explicit and periodic saves
    save_lock: Mutex<()>,
    closed: AtomicBool,
}

impl KeyStore {
    pub fn open(index_path: &Path, archive_path: &Path) -> Result<Self> {
        Self::with_parts(
            Box::new(KeyIndex::open(index_path)?),
            Box::new(RecordLog::open(archive_path)?),
        )
    }

    /// Assemble a store from its collaborators, replaying records the index missed
    pub fn with_parts(index: Box<dyn OrderedIndex>, archive: Box<dyn Archive>) -> Result<Self> {
        let store = Self {
            index,
            archive,
            write_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        };
        store.check_index_state()?;
        Ok(store)
    }

    fn check_index_state(&self) -> Result<()> {
        let count = self.archive.count();
        let start = self.index.last_indexed_record_number().map_or(0, |last| last + 1);
        if start >= count {
            return Ok(());
        }

        info!(from = start, to = count, "rebuilding key index from archive");
        for rec in start..count {
            let (key, deleted) = self.archive.key_at(rec)?;
            if deleted {
                self.index.remove_key(key);
            } else {
                self.index.set(key, rec);
            }
        }
        self.save()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(HootError::Closed)
        } else {
            Ok(())
        }
    }

    /// Append `data` under `key` and make it the key's newest record
    pub fn set(&self, key: u32, data: &[u8]) -> Result<RecordNo> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();
        let rec = self.archive.write_data(key, data)?;
        self.index.set(key, rec);
        Ok(rec)
    }

    /// Newest value stored under `key`
    pub fn get(&self, key: u32) -> Result<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(rec) => self.read(rec).map(Some),
            None => Ok(None),
        }
    }

    /// Records under `key`, newest first
    pub fn duplicates(&self, key: u32) -> Vec<RecordNo> {
        self.index.duplicates(key)
    }

    pub fn read(&self, rec: RecordNo) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.archive.read_bytes(rec)
    }

    /// Drop `key` from the index and record the deletion in the archive
    pub fn delete(&self, key: u32) -> Result<bool> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();
        if !self.index.remove_key(key) {
            return Ok(false);
        }
        self.archive.delete(key)?;
        Ok(true)
    }

    /// Records in the archive, deletion markers included
    pub fn record_count(&self) -> u32 {
        self.archive.count()
    }

    /// Distinct live keys
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Persist the index along with the last archive record it reflects.
    ///
    /// Holds the write lock so no record can be in the archive but missing
    /// from the index snapshot.
    pub fn save(&self) -> Result<()> {
        let _writes = self.write_lock.lock();
        let _guard = self.save_lock.lock();
        let count = self.archive.count();
        if count > 0 {
            self.index.save_last_record_number(count - 1);
        }
        self.archive.flush()?;
        self.index.save()?;
        debug!(records = count, "saved key store");
        Ok(())
    }

    pub fn free_memory(&self) {
        self.index.free_memory();
    }

    /// Save and refuse further use. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.save()
    }
}

//! Deleted document ids, persisted as a single bitmap record.

use crate::bitmap::AdaptiveBitset;
use crate::error::Result;
use crate::index::postings::{decode_record, encode_record};
use crate::index::types::DocId;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct TombstoneSet {
    path: PathBuf,
    bits: RwLock<AdaptiveBitset>,
}

impl TombstoneSet {
    /// Load the tombstone file at `path`, empty when it does not exist yet
    pub fn open(path: impl Into<PathBuf>, switch_over: usize) -> Result<Self> {
        let path = path.into();
        let bits = match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => decode_record(&bytes, &path, switch_over)?,
            Ok(_) => AdaptiveBitset::with_switch_over(switch_over),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                AdaptiveBitset::with_switch_over(switch_over)
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), deleted = bits.count_ones(), "loaded tombstones");

        Ok(Self {
            path,
            bits: RwLock::new(bits),
        })
    }

    pub fn delete(&self, doc: DocId) {
        self.bits.write().set(doc, true);
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        let mut bits = self.bits.write();
        bits.rehydrate();
        bits.get(doc)
    }

    /// Snapshot of the current set, for masking query results
    pub fn snapshot(&self) -> AdaptiveBitset {
        let mut bits = self.bits.write();
        bits.rehydrate();
        bits.clone()
    }

    pub fn count(&self) -> u64 {
        self.bits.read().count_ones()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the set if it changed since the last save
    pub fn save(&self) -> Result<bool> {
        let mut bits = self.bits.write();
        if !bits.is_dirty() {
            return Ok(false);
        }
        let tmp = self.path.with_extension("deleted.tmp");
        fs::write(&tmp, encode_record(&bits))?;
        fs::rename(&tmp, &self.path)?;
        bits.mark_clean();
        debug!(deleted = bits.count_ones(), "saved tombstones");
        Ok(true)
    }

    /// Compress the set in memory when it has no unsaved changes
    pub fn free_memory(&self) {
        self.bits.write().free_memory();
    }
}

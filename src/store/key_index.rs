use crate::error::Result;
use crate::index::types::RecordNo;
use crate::store::OrderedIndex;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Last archive record reflected in `entries`
    last_record: Option<RecordNo>,
    /// Records per key, oldest first
    entries: BTreeMap<u32, Vec<RecordNo>>,
}

/// In-memory ordered index persisted as a JSON snapshot.
///
/// A missing or unreadable snapshot opens empty; the key store then rebuilds
/// it from the archive.
pub struct KeyIndex {
    path: PathBuf,
    state: RwLock<Snapshot>,
    dirty: AtomicBool,
}

impl KeyIndex {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable key index");
                    Snapshot::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = snapshot.entries.len(), "opened key index");

        Ok(Self {
            path,
            state: RwLock::new(snapshot),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OrderedIndex for KeyIndex {
    fn get(&self, key: u32) -> Option<RecordNo> {
        self.state.read().entries.get(&key).and_then(|recs| recs.last().copied())
    }

    fn set(&self, key: u32, rec: RecordNo) {
        self.state.write().entries.entry(key).or_default().push(rec);
        self.dirty.store(true, Ordering::Release);
    }

    fn remove_key(&self, key: u32) -> bool {
        let removed = self.state.write().entries.remove(&key).is_some();
        if removed {
            self.dirty.store(true, Ordering::Release);
        }
        removed
    }

    fn duplicates(&self, key: u32) -> Vec<RecordNo> {
        self.state
            .read()
            .entries
            .get(&key)
            .map(|recs| recs.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    fn save_last_record_number(&self, rec: RecordNo) {
        let mut state = self.state.write();
        if state.last_record != Some(rec) {
            state.last_record = Some(rec);
            self.dirty.store(true, Ordering::Release);
        }
    }

    fn last_indexed_record_number(&self) -> Option<RecordNo> {
        self.state.read().last_record
    }

    fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    fn save(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let bytes = serde_json::to_vec(&*self.state.read())?;
        let tmp = self.path.with_extension("mgidx.tmp");
        let result = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            self.dirty.store(true, Ordering::Release);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = bytes.len(), "saved key index");
        Ok(())
    }

    fn free_memory(&self) {
        // Entries are plain integers with nothing to page out
        debug!(keys = self.len(), "key index free_memory");
    }
}

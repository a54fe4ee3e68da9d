//! Key-value storage under the hashed document index.
//!
//! [`Archive`] and [`OrderedIndex`] are the two collaborators a [`KeyStore`]
//! is built from; [`RecordLog`] and [`KeyIndex`] are the implementations the
//! engine uses.

pub mod hashed;
pub mod key_index;
pub mod keystore;
pub mod record_log;
pub mod timer;

pub use hashed::HashedDocumentIndex;
pub use key_index::KeyIndex;
pub use keystore::KeyStore;
pub use record_log::RecordLog;
pub use timer::SaveTimer;

use crate::error::Result;
use crate::index::types::RecordNo;
use crate::utils::codec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Header facts about one archive record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMeta {
    pub key: u32,
    pub len: u32,
    pub deleted: bool,
    pub replicated: bool,
}

/// Append-only store of byte records addressed by record number
pub trait Archive: Send + Sync {
    /// Append `data` under `key`, returning its record number
    fn write_data(&self, key: u32, data: &[u8]) -> Result<RecordNo>;

    fn read_bytes(&self, rec: RecordNo) -> Result<Vec<u8>>;

    fn read_meta(&self, rec: RecordNo) -> Result<RecordMeta>;

    /// Append a deletion marker for `key`
    fn delete(&self, key: u32) -> Result<RecordNo>;

    /// Append a deletion marker that arrived through replication
    fn delete_replicated(&self, key: u32) -> Result<RecordNo>;

    /// Records written so far, including deletion markers
    fn count(&self) -> u32;

    /// Key of a record and whether it is a deletion marker
    fn key_at(&self, rec: RecordNo) -> Result<(u32, bool)> {
        let meta = self.read_meta(rec)?;
        Ok((meta.key, meta.deleted))
    }

    fn flush(&self) -> Result<()>;

    fn write_object<T: Serialize>(&self, key: u32, value: &T) -> Result<RecordNo>
    where
        Self: Sized,
    {
        self.write_data(key, &codec::serialize(value)?)
    }

    fn read_object<T: DeserializeOwned>(&self, rec: RecordNo) -> Result<T>
    where
        Self: Sized,
    {
        codec::deserialize(&self.read_bytes(rec)?)
    }
}

/// Ordered map from key to the archive records written under it
pub trait OrderedIndex: Send + Sync {
    /// Newest record for `key`
    fn get(&self, key: u32) -> Option<RecordNo>;

    fn set(&self, key: u32, rec: RecordNo);

    /// Forget `key` and its history. Returns whether it was present.
    fn remove_key(&self, key: u32) -> bool;

    /// Every record written under `key`, newest first
    fn duplicates(&self, key: u32) -> Vec<RecordNo>;

    /// Remember the last archive record reflected in the index
    fn save_last_record_number(&self, rec: RecordNo);

    fn last_indexed_record_number(&self) -> Option<RecordNo>;

    /// Number of distinct keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self) -> Result<()>;

    fn free_memory(&self);
}

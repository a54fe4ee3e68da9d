//! Word dictionary: the bijection between indexed tokens and word ids.
//!
//! Persisted as a flat file of `[u32 byte length][utf-8 word][i32 word id]`
//! entries, rewritten in full on every save and loaded eagerly on open.

use crate::error::{HootError, Result};
use crate::index::types::WordId;
use crate::utils::{u32_at, write_u32_le};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub struct WordDictionary {
    path: PathBuf,
    words: RwLock<FxHashMap<String, WordId>>,
    changed: AtomicBool,
}

impl WordDictionary {
    /// Load the dictionary at `path`; a missing or empty file is an empty dictionary
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let words = if path.exists() {
            load(&path)?
        } else {
            FxHashMap::default()
        };
        debug!(path = %path.display(), words = words.len(), "loaded word dictionary");

        Ok(Self {
            path,
            words: RwLock::new(words),
            changed: AtomicBool::new(false),
        })
    }

    pub fn get(&self, word: &str) -> Option<WordId> {
        self.words.read().get(word).copied()
    }

    /// Id of `word`, registering it with an id from `allocate` if unseen
    pub fn get_or_insert_with(&self, word: &str, allocate: impl FnOnce() -> WordId) -> WordId {
        if let Some(id) = self.get(word) {
            return id;
        }

        let mut words = self.words.write();
        if let Some(&id) = words.get(word) {
            return id;
        }
        let id = allocate();
        words.insert(word.to_string(), id);
        self.changed.store(true, Ordering::Release);
        id
    }

    /// Ids of every word accepted by `predicate`
    pub fn matching(&self, mut predicate: impl FnMut(&str) -> bool) -> Vec<WordId> {
        self.words
            .read()
            .iter()
            .filter(|(w, _)| predicate(w))
            .map(|(_, &id)| id)
            .collect()
    }

    /// All known words, sorted
    pub fn words(&self) -> Vec<String> {
        let mut words: Vec<String> = self.words.read().keys().cloned().collect();
        words.sort_unstable();
        words
    }

    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    /// Highest word id in use
    pub fn max_id(&self) -> Option<WordId> {
        self.words.read().values().copied().max()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Words were added since the last save
    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the dictionary file if anything changed. Returns whether it wrote.
    pub fn save(&self) -> Result<bool> {
        if !self.is_changed() {
            return Ok(false);
        }

        let words = self.words.read();
        let mut entries: Vec<(&String, &WordId)> = words.iter().collect();
        entries.sort_unstable_by_key(|(_, id)| **id);

        let tmp = self.path.with_extension("words.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for (word, &id) in entries {
                write_u32_le(&mut writer, word.len() as u32)?;
                writer.write_all(word.as_bytes())?;
                writer.write_all(&(id as i32).to_le_bytes())?;
            }
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.changed.store(false, Ordering::Release);
        debug!(words = words.len(), "saved word dictionary");
        Ok(true)
    }
}

fn load(path: &Path) -> Result<FxHashMap<String, WordId>> {
    let bytes = fs::read(path)?;
    let mut words = FxHashMap::default();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let Some(len) = u32_at(&bytes, pos).map(|l| l as usize) else {
            break;
        };
        let start = pos + 4;
        let (Some(word), Some(id)) = (
            bytes.get(start..start + len),
            u32_at(&bytes, start + len),
        ) else {
            break;
        };
        let word = std::str::from_utf8(word)
            .map_err(|_| HootError::corrupt(path, pos as u64, "word is not valid utf-8"))?;
        words.insert(word.to_string(), id);
        pos = start + len + 4;
    }

    if pos < bytes.len() {
        warn!(
            path = %path.display(),
            offset = pos,
            "ignoring truncated tail of word dictionary"
        );
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let dict = WordDictionary::open(dir.path().join("a.words")).unwrap();
        assert!(dict.is_empty());

        fs::write(dir.path().join("b.words"), b"").unwrap();
        let dict = WordDictionary::open(dir.path().join("b.words")).unwrap();
        assert!(dict.is_empty());
    }

    #[test]
    fn test_get_or_insert_allocates_once() {
        let dir = tempfile::tempdir().unwrap();
        let dict = WordDictionary::open(dir.path().join("t.words")).unwrap();
        let mut next = 0;
        let red = dict.get_or_insert_with("red", || {
            next += 1;
            7
        });
        assert_eq!(red, 7);
        assert_eq!(dict.get_or_insert_with("red", || 99), 7);
        assert_eq!(next, 1);
        assert!(dict.is_changed());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.words");
        {
            let dict = WordDictionary::open(&path).unwrap();
            dict.get_or_insert_with("red", || 0);
            dict.get_or_insert_with("grüße", || 1);
            assert!(dict.save().unwrap());
            assert!(!dict.save().unwrap());
        }
        let dict = WordDictionary::open(&path).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("red"), Some(0));
        assert_eq!(dict.get("grüße"), Some(1));
        assert_eq!(dict.words(), vec!["grüße", "red"]);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.words");
        {
            let dict = WordDictionary::open(&path).unwrap();
            dict.get_or_insert_with("alpha", || 0);
            dict.get_or_insert_with("beta", || 1);
            dict.save().unwrap();
        }
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        let dict = WordDictionary::open(&path).unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_matching() {
        let dir = tempfile::tempdir().unwrap();
        let dict = WordDictionary::open(dir.path().join("t.words")).unwrap();
        dict.get_or_insert_with("cart", || 0);
        dict.get_or_insert_with("car", || 1);
        dict.get_or_insert_with("bus", || 2);
        let mut ids = dict.matching(|w| w.starts_with("car"));
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
    }
}

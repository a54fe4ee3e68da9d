//! Persistent store of postings lists, one [`AdaptiveBitset`] per word id.
//!
//! ## On-disk layout
//!
//! Two paired files:
//!
//! - **catalog** (`.mgbmr`): flat array of 8-byte little-endian offsets, slot
//!   index = word id, each pointing at the word's current record in the blob file
//! - **blob file** (`.mgbmp`): append-only sequence of self-describing records
//!
//! ```text
//! 0  'B' 'M'
//! 2  u32 word count
//! 6  u8  representation (0 = dense, 1 = WAH, 2 = sorted members)
//! 7  u8  reserved, always 0
//! 8  u32 words[count]
//! ```
//!
//! Commits never overwrite a record; they append a new one and repoint the
//! slot. [`PostingsStore::optimize`] rewrites both files contiguously.

use crate::bitmap::{AdaptiveBitset, RecordKind};
use crate::error::{HootError, Result};
use crate::index::gate::OperationGate;
use crate::index::types::{DocId, EngineConfig, WordId, ext};
use crate::utils::{extend_le_words, u32_at, u64_at, words_from_le_bytes, write_u64_le};
use memmap2::Mmap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error, info, warn};

/// Magic bytes opening every bitmap record
pub const RECORD_MAGIC: [u8; 2] = *b"BM";

/// Size of a record header in bytes
pub const RECORD_HEADER_LEN: usize = 8;

/// Width of one catalog slot
const SLOT_WIDTH: u64 = 8;

/// Shared handle to a cached postings list
pub type Postings = Arc<RwLock<AdaptiveBitset>>;

/// Serialize a bitset into a blob record
pub fn encode_record(set: &AdaptiveBitset) -> Vec<u8> {
    let (kind, words) = set.to_record();
    let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + words.len() * 4);
    buf.extend_from_slice(&RECORD_MAGIC);
    buf.extend_from_slice(&(words.len() as u32).to_le_bytes());
    buf.push(kind as u8);
    buf.push(0);
    extend_le_words(&mut buf, &words);
    buf
}

/// Validate a record header, returning its kind and payload length in bytes
fn parse_header(header: &[u8], path: &Path, offset: u64) -> Result<(RecordKind, usize)> {
    if header.len() < RECORD_HEADER_LEN || header[0..2] != RECORD_MAGIC || header[7] != 0 {
        return Err(HootError::corrupt(path, offset, "bitmap record magic mismatch"));
    }
    let kind = RecordKind::from_tag(header[6]).ok_or_else(|| {
        HootError::corrupt(path, offset, format!("unknown bitmap type {}", header[6]))
    })?;
    let count = u32_at(header, 2).unwrap_or(0) as usize;
    Ok((kind, count * 4))
}

/// Slice out the complete record starting at `offset`
fn record_slice<'a>(buf: &'a [u8], offset: u64, path: &Path) -> Result<&'a [u8]> {
    let start = usize::try_from(offset)
        .map_err(|_| HootError::corrupt(path, offset, "offset out of range"))?;
    let header = buf
        .get(start..start.saturating_add(RECORD_HEADER_LEN))
        .ok_or_else(|| HootError::corrupt(path, offset, "record header past end of file"))?;
    let (_, payload_len) = parse_header(header, path, offset)?;
    buf.get(start..start + RECORD_HEADER_LEN + payload_len)
        .ok_or_else(|| HootError::corrupt(path, offset, "record payload past end of file"))
}

/// Decode a complete record held in memory
pub fn decode_record(buf: &[u8], path: &Path, switch_over: usize) -> Result<AdaptiveBitset> {
    let record = record_slice(buf, 0, path)?;
    let (kind, _) = parse_header(record, path, 0)?;
    let words = words_from_le_bytes(&record[RECORD_HEADER_LEN..]);
    Ok(AdaptiveBitset::from_record(kind, words, switch_over))
}

fn truncated(path: &Path, offset: u64) -> impl FnOnce(io::Error) -> HootError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HootError::corrupt(path, offset, "truncated bitmap record")
        } else {
            HootError::Io(e)
        }
    }
}

/// Open handles on the catalog and blob files
struct StoreFiles {
    catalog: File,
    blobs: File,
    catalog_len: u64,
    blob_len: u64,
}

impl StoreFiles {
    fn open(catalog_path: &Path, blob_path: &Path) -> Result<Self> {
        let catalog = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(catalog_path)?;
        let blobs = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(blob_path)?;

        let catalog_len = catalog.metadata()?.len();
        let blob_len = blobs.metadata()?.len();

        Ok(Self {
            catalog,
            blobs,
            catalog_len,
            blob_len,
        })
    }

    fn slot_count(&self) -> u64 {
        self.catalog_len / SLOT_WIDTH
    }

    /// Offset stored in a slot, None if the slot was never written
    fn read_slot(&mut self, id: WordId) -> Result<Option<u64>> {
        let pos = id as u64 * SLOT_WIDTH;
        if pos + SLOT_WIDTH > self.catalog_len {
            return Ok(None);
        }
        self.catalog.seek(SeekFrom::Start(pos))?;
        let mut buf = [0u8; 8];
        self.catalog.read_exact(&mut buf)?;
        Ok(Some(u64::from_le_bytes(buf)))
    }

    fn write_slot(&mut self, id: WordId, offset: u64) -> Result<()> {
        let pos = id as u64 * SLOT_WIDTH;
        self.catalog.seek(SeekFrom::Start(pos))?;
        self.catalog.write_all(&offset.to_le_bytes())?;
        self.catalog_len = self.catalog_len.max(pos + SLOT_WIDTH);
        Ok(())
    }

    fn append_blob(&mut self, record: &[u8]) -> Result<u64> {
        let offset = self.blob_len;
        self.blobs.seek(SeekFrom::Start(offset))?;
        self.blobs.write_all(record)?;
        self.blob_len += record.len() as u64;
        Ok(offset)
    }

    fn read_bitset(&mut self, offset: u64, path: &Path, switch_over: usize) -> Result<AdaptiveBitset> {
        self.blobs.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; RECORD_HEADER_LEN];
        self.blobs.read_exact(&mut header).map_err(truncated(path, offset))?;
        let (kind, payload_len) = parse_header(&header, path, offset)?;

        let mut payload = vec![0u8; payload_len];
        self.blobs.read_exact(&mut payload).map_err(truncated(path, offset))?;

        Ok(AdaptiveBitset::from_record(kind, words_from_le_bytes(&payload), switch_over))
    }

    fn flush(&mut self) -> Result<()> {
        self.catalog.flush()?;
        self.blobs.flush()?;
        Ok(())
    }
}

/// Owns every postings list of an index
pub struct PostingsStore {
    catalog_path: PathBuf,
    blob_path: PathBuf,
    switch_over: usize,
    gate: OperationGate,
    /// Single writer lock over both files; None once shut down
    files: Mutex<Option<StoreFiles>>,
    cache: RwLock<FxHashMap<WordId, Postings>>,
    next_id: AtomicU32,
}

impl PostingsStore {
    /// Open (or create) the store files named by `config`
    pub fn open(config: &EngineConfig) -> Result<Self> {
        Self::open_at(
            config.file_path(ext::CATALOG),
            config.file_path(ext::BLOBS),
            config.bitmap_switch_over_count,
        )
    }

    pub fn open_at(catalog_path: PathBuf, blob_path: PathBuf, switch_over: usize) -> Result<Self> {
        if let Some(parent) = catalog_path.parent() {
            fs::create_dir_all(parent)?;
        }
        recover_swap(&catalog_path, &blob_path)?;
        let files = StoreFiles::open(&catalog_path, &blob_path)?;
        let next_id = files.slot_count() as WordId;

        debug!(
            catalog = %catalog_path.display(),
            ids = next_id,
            blob_bytes = files.blob_len,
            "opened postings store"
        );

        Ok(Self {
            catalog_path,
            blob_path,
            switch_over,
            gate: OperationGate::new(),
            files: Mutex::new(Some(files)),
            cache: RwLock::new(FxHashMap::default()),
            next_id: AtomicU32::new(next_id),
        })
    }

    /// Number of word ids handed out so far
    pub fn len(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Postings lists currently resident in memory
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }

    /// Hand out a fresh word id seeded with an empty postings list.
    ///
    /// The new list starts dirty so the id gets a record at the next commit.
    pub fn allocate_id(&self) -> WordId {
        let _pass = self.gate.enter();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut set = AdaptiveBitset::with_switch_over(self.switch_over);
        set.mark_dirty();
        self.cache.write().insert(id, Arc::new(RwLock::new(set)));
        id
    }

    /// Allocate empty lists until `len` ids exist
    pub fn reserve_ids(&self, len: u32) {
        while self.len() < len {
            self.allocate_id();
        }
    }

    /// Postings list for `id`, loaded from disk on first access
    pub fn get(&self, id: WordId) -> Result<Postings> {
        let _pass = self.gate.enter();
        self.get_inner(id)
    }

    /// Set or clear a document in a word's postings list
    pub fn set(&self, id: WordId, doc: DocId, value: bool) -> Result<()> {
        let postings = self.get(id)?;
        postings.write().set(doc, value);
        Ok(())
    }

    fn get_inner(&self, id: WordId) -> Result<Postings> {
        if let Some(postings) = self.cached(id) {
            return Ok(postings);
        }

        let mut guard = self.files.lock();
        let files = guard.as_mut().ok_or(HootError::Closed)?;

        // Another caller may have loaded it while we waited for the lock
        if let Some(postings) = self.cached(id) {
            return Ok(postings);
        }

        // Slots past the catalog end would be zero-filled and alias word 0
        if id >= self.len() {
            return Err(HootError::UnknownWord(id));
        }

        let set = match files.read_slot(id)? {
            Some(offset) => files.read_bitset(offset, &self.blob_path, self.switch_over)?,
            None => AdaptiveBitset::with_switch_over(self.switch_over),
        };

        let postings = Arc::new(RwLock::new(set));
        self.cache.write().insert(id, Arc::clone(&postings));
        Ok(postings)
    }

    fn cached(&self, id: WordId) -> Option<Postings> {
        let postings = self.cache.read().get(&id).cloned()?;
        // A list compressed by free_memory is expanded on its next read
        postings.write().rehydrate();
        Some(postings)
    }

    /// Append every dirty postings list and repoint its slot.
    ///
    /// Written lists stay cached in compressed form. Returns the number of lists written. With `free_memory_after` the whole
    /// cache is dropped afterwards and lists are re-read on next access.
    pub fn commit(&self, free_memory_after: bool) -> Result<usize> {
        let _pass = self.gate.enter();

        let mut entries: Vec<(WordId, Postings)> = self
            .cache
            .read()
            .iter()
            .map(|(&id, p)| (id, Arc::clone(p)))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);

        let mut guard = self.files.lock();
        let files = guard.as_mut().ok_or(HootError::Closed)?;

        let mut written = 0;
        for (id, postings) in entries {
            let mut set = postings.write();
            if !set.is_dirty() {
                continue;
            }
            let record = encode_record(&set);
            let offset = files.append_blob(&record)?;
            files.write_slot(id, offset)?;
            set.mark_clean();
            set.free_memory();
            written += 1;
        }

        if written > 0 {
            files.flush()?;
            debug!(written, blob_bytes = files.blob_len, "committed postings");
        }

        if free_memory_after {
            self.cache.write().clear();
            debug!("freed postings cache");
        }

        Ok(written)
    }

    /// Evict postings lists with no unsaved changes. Returns how many were dropped.
    pub fn release_clean(&self) -> usize {
        let _pass = self.gate.enter();
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, postings| postings.read().is_dirty());
        let released = before - cache.len();
        debug!(released, remaining = cache.len(), "released clean postings");
        released
    }

    /// Rewrite catalog and blob file contiguously, dropping superseded records.
    ///
    /// Waits until every in-flight operation has left and holds new ones off
    /// until done. The live files are replaced only after the rewrite
    /// succeeded; a corrupt record aborts with an error and leaves them as they
    /// were.
    pub fn optimize(&self) -> Result<()> {
        let _exclusive = self.gate.exclusive();

        let mut guard = self.files.lock();
        let files = guard.as_mut().ok_or(HootError::Closed)?;
        files.flush()?;

        let tmp_catalog = temp_path(&self.catalog_path);
        let tmp_blobs = temp_path(&self.blob_path);
        let before = files.blob_len;

        info!(
            ids = files.slot_count(),
            blob_bytes = before,
            "optimizing postings store"
        );

        let after = match self.rewrite(files, &tmp_catalog, &tmp_blobs) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&tmp_catalog);
                let _ = fs::remove_file(&tmp_blobs);
                error!(error = %e, "optimize aborted");
                return Err(e);
            }
        };

        // Close the old handles before swapping files underneath them
        *guard = None;
        let swapped = swap_in(&tmp_catalog, &tmp_blobs, &self.catalog_path, &self.blob_path);
        // Reopen whichever pair is live so a failed swap leaves the store usable
        recover_swap(&self.catalog_path, &self.blob_path)?;
        *guard = Some(StoreFiles::open(&self.catalog_path, &self.blob_path)?);
        if let Err(e) = swapped {
            error!(error = %e, "optimize swap failed, kept the old files");
            return Err(e);
        }

        info!(before, after, "optimize complete");
        Ok(())
    }

    fn rewrite(&self, files: &StoreFiles, tmp_catalog: &Path, tmp_blobs: &Path) -> Result<u64> {
        let slots = files.slot_count();
        let catalog = fs::read(&self.catalog_path)?;

        let mut new_catalog = BufWriter::new(File::create(tmp_catalog)?);
        let mut new_blobs = BufWriter::new(File::create(tmp_blobs)?);
        let mut new_offset = 0u64;

        if slots > 0 {
            // SAFETY: the file is not resized while the store is drained and
            // the writer lock is held
            let blob_map = unsafe { Mmap::map(&files.blobs)? };

            for id in 0..slots {
                let pos = (id * SLOT_WIDTH) as usize;
                let offset = u64_at(&catalog, pos).ok_or_else(|| {
                    HootError::corrupt(&self.catalog_path, pos as u64, "short catalog slot")
                })?;
                let record = record_slice(&blob_map, offset, &self.blob_path)?;

                write_u64_le(&mut new_catalog, new_offset)?;
                new_blobs.write_all(record)?;
                new_offset += record.len() as u64;
            }
        }

        new_catalog.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        new_blobs.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(new_offset)
    }

    /// Commit outstanding changes and close the files
    pub fn shutdown(&self, free_memory: bool) -> Result<()> {
        if self.files.lock().is_none() {
            return Ok(());
        }
        self.commit(free_memory)?;

        let _exclusive = self.gate.exclusive();
        if let Some(mut files) = self.files.lock().take() {
            files.flush()?;
        }
        debug!(catalog = %self.catalog_path.display(), "postings store closed");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    suffixed(path, "$")
}

/// Where the old blob file waits while a rewritten pair is moved in
fn backup_path(path: &Path) -> PathBuf {
    suffixed(path, ".old")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Move a rewritten catalog and blob file over the live pair.
///
/// The old blob file is parked as `<blob>.old` until the catalog is in place,
/// so on any failure the old pair is put back and the temp files removed.
fn swap_in(tmp_catalog: &Path, tmp_blobs: &Path, catalog: &Path, blobs: &Path) -> Result<()> {
    let old_blobs = backup_path(blobs);
    match move_pair(tmp_catalog, tmp_blobs, catalog, blobs, &old_blobs) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(&old_blobs) {
                warn!(path = %old_blobs.display(), error = %e, "could not remove old blob file");
            }
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(tmp_catalog);
            let _ = fs::remove_file(tmp_blobs);
            Err(e.into())
        }
    }
}

fn move_pair(
    tmp_catalog: &Path,
    tmp_blobs: &Path,
    catalog: &Path,
    blobs: &Path,
    old_blobs: &Path,
) -> io::Result<()> {
    fs::rename(blobs, old_blobs)?;
    if let Err(e) = fs::rename(tmp_blobs, blobs) {
        fs::rename(old_blobs, blobs)?;
        return Err(e);
    }
    if let Err(e) = fs::rename(tmp_catalog, catalog) {
        fs::rename(old_blobs, blobs)?;
        return Err(e);
    }
    Ok(())
}

/// Finish or roll back a swap interrupted by a crash.
///
/// A parked `<blob>.old` with the temp catalog still present means the
/// catalog never moved, so the old blob file goes back. Without the temp
/// catalog the new pair is complete and the parked file is stale.
fn recover_swap(catalog: &Path, blobs: &Path) -> Result<()> {
    let old_blobs = backup_path(blobs);
    if !old_blobs.exists() {
        return Ok(());
    }
    let tmp_catalog = temp_path(catalog);
    if tmp_catalog.exists() || !blobs.exists() {
        warn!(path = %blobs.display(), "rolling back interrupted optimize");
        fs::rename(&old_blobs, blobs)?;
        let _ = fs::remove_file(&tmp_catalog);
        let _ = fs::remove_file(temp_path(blobs));
    } else {
        warn!(path = %old_blobs.display(), "removing blob file left by interrupted optimize");
        fs::remove_file(&old_blobs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn open(dir: &Path) -> PostingsStore {
        PostingsStore::open_at(dir.join("t.mgbmr"), dir.join("t.mgbmp"), 10).unwrap()
    }

    fn members(store: &PostingsStore, id: WordId) -> Vec<u32> {
        store.get(id).unwrap().read().iter().collect()
    }

    #[test]
    fn test_allocate_ids_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        assert_eq!(store.allocate_id(), 0);
        assert_eq!(store.allocate_id(), 1);
        assert_eq!(store.allocate_id(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut expected = Vec::new();
        {
            let store = open(dir.path());
            for w in 0..20u32 {
                let id = store.allocate_id();
                let docs: Vec<u32> = (0..(w * 13 + 1)).filter(|d| d % (w + 1) == 0).collect();
                for &d in &docs {
                    store.set(id, d, true).unwrap();
                }
                expected.push(docs);
            }
            // allocated but never set
            store.allocate_id();
            store.shutdown(false).unwrap();
        }

        let store = open(dir.path());
        assert_eq!(store.len(), 21);
        assert_eq!(store.cached_count(), 0);
        for (id, docs) in expected.iter().enumerate() {
            let postings = store.get(id as WordId).unwrap();
            assert_eq!(postings.read().count_ones(), docs.len() as u64);
            assert_eq!(&members(&store, id as WordId), docs);
        }
        assert!(members(&store, 20).is_empty());
    }

    #[test]
    fn test_commit_appends_and_skips_clean() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let id = store.allocate_id();
        store.set(id, 4, true).unwrap();
        assert_eq!(store.commit(false).unwrap(), 1);
        let blob_after_first = fs::metadata(store.blob_path()).unwrap().len();

        // nothing dirty
        assert_eq!(store.commit(false).unwrap(), 0);
        assert_eq!(fs::metadata(store.blob_path()).unwrap().len(), blob_after_first);

        store.set(id, 9, true).unwrap();
        assert_eq!(store.commit(false).unwrap(), 1);
        let blob_after_second = fs::metadata(store.blob_path()).unwrap().len();
        assert!(blob_after_second > blob_after_first);
        assert_eq!(fs::metadata(store.catalog_path()).unwrap().len(), 8);
    }

    #[test]
    fn test_commit_free_memory_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let id = store.allocate_id();
        for d in 0..100 {
            store.set(id, d * 3, true).unwrap();
        }
        store.commit(true).unwrap();
        assert_eq!(store.cached_count(), 0);
        assert_eq!(members(&store, id).len(), 100);
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn test_release_clean_keeps_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let a = store.allocate_id();
        let b = store.allocate_id();
        store.set(a, 1, true).unwrap();
        store.commit(false).unwrap();
        store.set(b, 2, true).unwrap();

        assert_eq!(store.release_clean(), 1);
        assert_eq!(store.cached_count(), 1);
        assert_eq!(members(&store, a), vec![1]);
        assert_eq!(members(&store, b), vec![2]);
    }

    #[test]
    fn test_optimize_reclaims_space() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let ids: Vec<WordId> = (0..5).map(|_| store.allocate_id()).collect();
        for round in 0..10 {
            for &id in &ids {
                store.set(id, round * 40 + id, true).unwrap();
            }
            store.commit(false).unwrap();
        }
        let before: Vec<Vec<u32>> = ids.iter().map(|&id| members(&store, id)).collect();
        let size_before = fs::metadata(store.blob_path()).unwrap().len();

        store.optimize().unwrap();

        let size_after = fs::metadata(store.blob_path()).unwrap().len();
        assert!(size_after < size_before);
        assert!(!temp_path(store.blob_path()).exists());

        store.release_clean();
        let after: Vec<Vec<u32>> = ids.iter().map(|&id| members(&store, id)).collect();
        assert_eq!(before, after);

        // still writable after the swap
        store.set(ids[0], 999, true).unwrap();
        store.commit(false).unwrap();
        store.release_clean();
        assert!(members(&store, ids[0]).contains(&999));
    }

    #[test]
    fn test_corrupt_magic_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(dir.path());
            let id = store.allocate_id();
            store.set(id, 3, true).unwrap();
            store.shutdown(false).unwrap();
        }
        let blob = dir.path().join("t.mgbmp");
        let mut bytes = fs::read(&blob).unwrap();
        bytes[0] = b'X';
        fs::write(&blob, &bytes).unwrap();

        let store = open(dir.path());
        assert!(store.get(0).unwrap_err().is_corruption());
        assert!(store.optimize().unwrap_err().is_corruption());
        // the live files were left in place
        assert_eq!(fs::read(&blob).unwrap(), bytes);
    }

    #[test]
    fn test_concurrent_sets_on_different_words() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open(dir.path()));
        let ids: Vec<WordId> = (0..4).map(|_| store.allocate_id()).collect();

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for d in 0..500 {
                        store.set(id, d * (id + 1), true).unwrap();
                        if d % 100 == 0 {
                            store.commit(false).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        store.commit(true).unwrap();

        for &id in &ids {
            let expected: Vec<u32> = (0..500).map(|d| d * (id + 1)).collect();
            assert_eq!(members(&store, id), expected);
        }
    }

    #[test]
    fn test_record_encoding() {
        let set: AdaptiveBitset = [1u32, 2, 3].into_iter().collect();
        let record = encode_record(&set);
        assert_eq!(&record[0..2], b"BM");
        assert_eq!(u32_at(&record, 2), Some(3));
        assert_eq!(record[6], RecordKind::Sparse as u8);
        assert_eq!(record[7], 0);
        let decoded = decode_record(&record, Path::new("mem"), 10).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_unallocated_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(dir.path());
            let id = store.allocate_id();
            store.set(id, 1, true).unwrap();
            assert!(matches!(store.set(5, 2, true), Err(HootError::UnknownWord(5))));
            assert!(matches!(store.get(1), Err(HootError::UnknownWord(1))));
            store.shutdown(false).unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.len(), 1);
        assert_eq!(fs::metadata(store.catalog_path()).unwrap().len(), 8);
        assert_eq!(store.allocate_id(), 1);
        assert!(members(&store, 1).is_empty());
    }

    #[test]
    fn test_commit_compresses_written_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let id = store.allocate_id();
        for d in 0..200 {
            store.set(id, d, true).unwrap();
        }
        store.commit(false).unwrap();
        {
            let cache = store.cache.read();
            let set = cache.get(&id).unwrap().read();
            assert!(set.is_compressed());
            assert!(!set.is_dirty());
        }
        assert_eq!(members(&store, id), (0..200).collect::<Vec<_>>());
        store.set(id, 500, true).unwrap();
        assert_eq!(store.commit(false).unwrap(), 1);
    }

    fn write_pair(dir: &Path, docs: &[u32]) -> Vec<u8> {
        let store = open(dir);
        let id = store.allocate_id();
        for &d in docs {
            store.set(id, d, true).unwrap();
        }
        store.shutdown(false).unwrap();
        fs::read(dir.join("t.mgbmp")).unwrap()
    }

    #[test]
    fn test_failed_swap_restores_old_pair() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("t.mgbmp");
        let catalog = dir.path().join("t.mgbmr");
        let old_bytes = write_pair(dir.path(), &[1, 2, 3]);

        // the rewritten blob is there but its catalog is missing
        fs::write(temp_path(&blob), b"new blobs").unwrap();
        assert!(swap_in(&temp_path(&catalog), &temp_path(&blob), &catalog, &blob).is_err());

        assert_eq!(fs::read(&blob).unwrap(), old_bytes);
        assert!(!backup_path(&blob).exists());
        assert!(!temp_path(&blob).exists());
        let store = open(dir.path());
        assert_eq!(members(&store, 0), vec![1, 2, 3]);
    }

    #[test]
    fn test_interrupted_swap_rolls_back_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("t.mgbmp");
        let catalog = dir.path().join("t.mgbmr");
        write_pair(dir.path(), &[7, 8]);

        // crashed after the blob moved, before the catalog did
        fs::rename(&blob, backup_path(&blob)).unwrap();
        fs::write(&blob, b"BMjunk").unwrap();
        fs::write(temp_path(&catalog), [0u8; 8]).unwrap();

        let store = open(dir.path());
        assert_eq!(members(&store, 0), vec![7, 8]);
        assert!(!backup_path(&blob).exists());
        assert!(!temp_path(&catalog).exists());
    }

    #[test]
    fn test_completed_swap_drops_parked_blob_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("t.mgbmp");
        write_pair(dir.path(), &[4]);
        fs::write(backup_path(&blob), b"stale").unwrap();

        let store = open(dir.path());
        assert_eq!(members(&store, 0), vec![4]);
        assert!(!backup_path(&blob).exists());
    }

    #[test]
    fn test_closed_store_rejects_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store.shutdown(false).unwrap();
        store.shutdown(false).unwrap();
        assert!(matches!(store.get(0), Err(HootError::Closed)));
    }
}

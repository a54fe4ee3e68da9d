//! The engine: one index on disk, with its dictionary, postings, stored
//! documents and tombstones.
//!
//! ```no_run
//! use hoot::index::{Document, Engine, EngineConfig};
//!
//! # fn main() -> hoot::Result<()> {
//! let engine = Engine::open(EngineConfig::new("/tmp/notes"))?;
//! engine.index_document(&mut Document::new("a.txt", "red car"), true)?;
//! for name in engine.find_file_names("red -bus")? {
//!     println!("{name}");
//! }
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

use crate::bitmap::AdaptiveBitset;
use crate::error::{HootError, Result};
use crate::index::dictionary::WordDictionary;
use crate::index::postings::PostingsStore;
use crate::index::tombstones::TombstoneSet;
use crate::index::types::{DocId, Document, EngineConfig, ext};
use crate::index::writer::IndexWriter;
use crate::query::{QueryEvaluator, parse_query};
use crate::store::HashedDocumentIndex;
use crate::utils::{DefaultTokenizer, Tokenizer, codec};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Engine {
    config: EngineConfig,
    dictionary: WordDictionary,
    postings: PostingsStore,
    documents: Option<HashedDocumentIndex>,
    tombstones: Option<TombstoneSet>,
    tokenizer: RwLock<Box<dyn Tokenizer>>,
    /// Serializes document writes and maintenance
    lock: Mutex<()>,
    /// One past the highest document id handed out; the query universe
    next_doc_id: AtomicU32,
    closed: AtomicBool,
}

impl Engine {
    /// Open (or create) the index described by `config`
    pub fn open(config: EngineConfig) -> Result<Self> {
        let start = Instant::now();
        fs::create_dir_all(&config.index_dir)?;

        let dictionary = WordDictionary::open(config.file_path(ext::WORDS))?;
        let postings = PostingsStore::open(&config)?;
        // Words saved after their postings catalog was last committed
        if let Some(max) = dictionary.max_id().filter(|&max| max >= postings.len()) {
            warn!(max_id = max, catalog_ids = postings.len(), "dictionary ahead of postings catalog");
            postings.reserve_ids(max + 1);
        }

        let (documents, tombstones) = if config.doc_mode {
            (
                Some(HashedDocumentIndex::open(&config)?),
                Some(TombstoneSet::open(
                    config.file_path(ext::DELETED),
                    config.bitmap_switch_over_count,
                )?),
            )
        } else {
            (None, None)
        };

        let next_doc_id = documents.as_ref().map_or(0, |d| d.count());
        let tokenizer =
            DefaultTokenizer::new(config.min_token_length, config.max_token_length);

        info!(
            dir = %config.index_dir.display(),
            name = %config.name,
            words = dictionary.len(),
            documents = next_doc_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "opened index"
        );

        Ok(Self {
            config,
            dictionary,
            postings,
            documents,
            tombstones,
            tokenizer: RwLock::new(Box::new(tokenizer)),
            lock: Mutex::new(()),
            next_doc_id: AtomicU32::new(next_doc_id),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the tokenizer used for document-mode indexing
    pub fn set_tokenizer(&self, tokenizer: Box<dyn Tokenizer>) {
        *self.tokenizer.write() = tokenizer;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(HootError::Closed)
        } else {
            Ok(())
        }
    }

    fn documents(&self) -> Result<&HashedDocumentIndex> {
        self.documents.as_ref().ok_or(HootError::NoDocuments)
    }

    fn tombstones(&self) -> Result<&TombstoneSet> {
        self.tombstones.as_ref().ok_or(HootError::NoDocuments)
    }

    fn add_to_index(&self, doc: DocId, text: &str) -> Result<usize> {
        let tokenizer = self.tokenizer.read();
        IndexWriter::new(&self.dictionary, &self.postings, &**tokenizer).add(
            doc,
            text,
            self.config.doc_mode,
        )
    }

    /// Index caller-numbered text. Returns the number of distinct words set.
    pub fn index_text(&self, doc: DocId, text: &str) -> Result<usize> {
        self.ensure_open()?;
        let words = self.add_to_index(doc, text)?;
        self.next_doc_id.fetch_max(doc.saturating_add(1), Ordering::AcqRel);
        Ok(words)
    }

    /// Store and index a document under a fresh id.
    ///
    /// With `delete_old`, the id the document carried and the id stored under
    /// its file name are tombstoned first.
    pub fn index_document(&self, doc: &mut Document, delete_old: bool) -> Result<DocId> {
        self.ensure_open()?;
        let documents = self.documents()?;
        let tombstones = self.tombstones()?;
        let start = Instant::now();

        let _guard = self.lock.lock();

        if delete_old {
            if let Some(old) = doc.doc_id {
                tombstones.delete(old);
            }
            if let Some(old) = self.stored_id(&doc.file_name)? {
                tombstones.delete(old);
            }
        }

        let id = documents.count();
        doc.doc_id = Some(id);
        let rec = documents.set(&doc.file_name, &codec::serialize(doc)?)?;
        if rec != id {
            return Err(HootError::corrupt(
                self.config.file_path(ext::ARCHIVE),
                rec as u64,
                format!("document record {rec} out of step with id {id}"),
            ));
        }
        self.next_doc_id.store(id + 1, Ordering::Release);

        let words = self.add_to_index(id, &doc.text)?;
        debug!(
            file = %doc.file_name,
            doc_id = id,
            words,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indexed document"
        );
        Ok(id)
    }

    fn stored_id(&self, file_name: &str) -> Result<Option<DocId>> {
        match self.documents()?.find(file_name)? {
            Some((rec, bytes)) => {
                let stored: Document = codec::deserialize(&bytes)?;
                Ok(Some(stored.doc_id.unwrap_or(rec)))
            }
            None => Ok(None),
        }
    }

    /// One past the highest document id handed out
    pub fn next_doc_id(&self) -> DocId {
        self.next_doc_id.load(Ordering::Acquire)
    }

    /// Evaluate `filter` over every id handed out so far
    pub fn query(&self, filter: &str) -> Result<AdaptiveBitset> {
        self.query_with_universe(filter, self.next_doc_id())
    }

    /// Evaluate `filter` over ids `0..universe`
    pub fn query_with_universe(&self, filter: &str, universe: u32) -> Result<AdaptiveBitset> {
        self.ensure_open()?;
        let query = parse_query(filter);
        let mut evaluator = QueryEvaluator::new(&self.dictionary, &self.postings);
        if let Some(tombstones) = &self.tombstones {
            evaluator = evaluator.with_tombstones(tombstones);
        }
        evaluator.evaluate(&query, universe)
    }

    pub fn find_rows(&self, filter: &str) -> Result<Vec<DocId>> {
        Ok(self.query(filter)?.iter().collect())
    }

    /// Stored records of every matching document, deserialized as `T`
    pub fn find_documents<T: DeserializeOwned>(&self, filter: &str) -> Result<Vec<T>> {
        let limit = self.next_doc_id();
        self.query(filter)?
            .iter()
            .take_while(|&id| id < limit)
            .map(|id| self.fetch(id))
            .collect()
    }

    pub fn find_file_names(&self, filter: &str) -> Result<Vec<String>> {
        Ok(self
            .find_documents::<Document>(filter)?
            .into_iter()
            .map(|d| d.file_name)
            .collect())
    }

    /// Stored record of a document
    pub fn fetch<T: DeserializeOwned>(&self, doc: DocId) -> Result<T> {
        self.ensure_open()?;
        let documents = self.documents()?;
        if doc >= self.next_doc_id() {
            return Err(HootError::DocumentNotFound(doc));
        }
        let bytes = documents.read_value(doc).map_err(|e| match e {
            HootError::RecordNotFound(_) => HootError::DocumentNotFound(doc),
            other => other,
        })?;
        codec::deserialize(&bytes)
    }

    /// Tombstone a document id
    pub fn remove_document(&self, doc: DocId) -> Result<()> {
        self.ensure_open()?;
        self.tombstones()?.delete(doc);
        Ok(())
    }

    /// Tombstone the document stored under `file_name`. Returns whether one existed.
    pub fn remove_document_by_name(&self, file_name: &str) -> Result<bool> {
        self.ensure_open()?;
        match self.stored_id(file_name)? {
            Some(id) => {
                self.tombstones()?.delete(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_indexed(&self, file_name: &str) -> Result<bool> {
        self.ensure_open()?;
        self.documents()?.contains(file_name)
    }

    /// Every indexed word, sorted
    pub fn words(&self) -> Vec<String> {
        self.dictionary.words()
    }

    pub fn word_count(&self) -> usize {
        self.dictionary.len()
    }

    /// Ids handed out minus tombstoned ones
    pub fn document_count(&self) -> u64 {
        let deleted = self.deleted_count();
        (self.next_doc_id() as u64).saturating_sub(deleted)
    }

    pub fn deleted_count(&self) -> u64 {
        self.tombstones.as_ref().map_or(0, |t| t.count())
    }

    /// Postings lists resident in memory
    pub fn cached_postings(&self) -> usize {
        self.postings.cached_count()
    }

    fn internal_save(&self) -> Result<()> {
        let start = Instant::now();
        if let Some(tombstones) = &self.tombstones {
            tombstones.save()?;
        }
        if let Some(documents) = &self.documents {
            documents.save()?;
        }
        let written = self.postings.commit(false)?;
        let dictionary_written = self.dictionary.save()?;

        info!(
            postings = written,
            dictionary = dictionary_written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "saved index"
        );
        Ok(())
    }

    /// Persist everything changed since the last save
    pub fn save(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock.lock();
        self.internal_save()
    }

    /// Save, then compact the postings files
    pub fn optimize(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock.lock();
        self.internal_save()?;
        self.postings.optimize()
    }

    /// Save, then drop or compress whatever is clean in memory
    pub fn free_memory(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock.lock();
        self.internal_save()?;
        if let Some(tombstones) = &self.tombstones {
            tombstones.free_memory();
        }
        let released = self.postings.release_clean();
        if let Some(documents) = &self.documents {
            documents.free_memory();
        }
        debug!(released, "freed memory");
        Ok(())
    }

    /// Save and close every file. Later calls are no-ops; other operations
    /// fail with [`HootError::Closed`].
    pub fn shutdown(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.internal_save()?;
        self.postings
            .shutdown(self.config.free_bitmap_memory_on_save)?;
        if let Some(documents) = &self.documents {
            documents.shutdown()?;
        }
        info!(name = %self.config.name, "index shut down");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown() {
                error!(error = %e, "shutdown on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn engine(dir: &std::path::Path) -> Engine {
        Engine::open(EngineConfig::new(dir).with_name("t")).unwrap()
    }

    #[test]
    fn test_index_and_query_documents() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        for (name, text) in [("a", "red car"), ("b", "red bus"), ("c", "blue car")] {
            engine
                .index_document(&mut Document::new(name, text), true)
                .unwrap();
        }
        assert_eq!(engine.find_rows("red car").unwrap(), vec![0]);
        assert_eq!(engine.find_rows("+red +blue").unwrap(), vec![0, 1, 2]);
        assert_eq!(engine.find_file_names("red -bus").unwrap(), vec!["a"]);
        assert_eq!(engine.document_count(), 3);
        assert_eq!(engine.word_count(), 4);
    }

    #[test]
    fn test_reindex_tombstones_previous_id() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut doc = Document::new("notes.txt", "alpha beta");
        let first = engine.index_document(&mut doc, true).unwrap();

        let mut doc = Document::new("Notes.TXT", "alpha gamma");
        let second = engine.index_document(&mut doc, true).unwrap();

        assert_ne!(first, second);
        assert_eq!(engine.find_rows("alpha").unwrap(), vec![second]);
        assert!(engine.find_rows("beta").unwrap().is_empty());
        assert_eq!(engine.document_count(), 1);
        assert!(engine.is_indexed("NOTES.txt").unwrap());
    }

    struct CommaTokenizer;

    impl Tokenizer for CommaTokenizer {
        fn word_frequencies(&self, text: &str) -> rustc_hash::FxHashMap<String, u32> {
            let mut words = rustc_hash::FxHashMap::default();
            for word in text.split(',').map(str::trim).filter(|w| !w.is_empty()) {
                *words.entry(word.to_lowercase()).or_insert(0) += 1;
            }
            words
        }
    }

    #[test]
    fn test_set_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.set_tokenizer(Box::new(CommaTokenizer));
        engine
            .index_document(&mut Document::new("tags", "x-ray, New-York"), true)
            .unwrap();
        assert_eq!(engine.find_rows("x-ray").unwrap(), vec![0]);
        assert_eq!(engine.find_rows("new-york").unwrap(), vec![0]);
        assert!(engine.find_rows("ray").unwrap().is_empty());
    }

    #[test]
    fn test_extra_fields_roundtrip() {
        #[derive(Deserialize)]
        struct Tagged {
            file_name: String,
            tag: String,
        }

        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut doc = Document::new("x.md", "hello world").with_field("tag", "draft");
        engine.index_document(&mut doc, false).unwrap();

        let hits: Vec<Tagged> = engine.find_documents("hello").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "x.md");
        assert_eq!(hits[0].tag, "draft");
    }

    #[test]
    fn test_remove_document_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine
            .index_document(&mut Document::new("a", "shared"), true)
            .unwrap();
        engine
            .index_document(&mut Document::new("b", "shared"), true)
            .unwrap();
        assert!(engine.remove_document_by_name("A").unwrap());
        assert!(!engine.remove_document_by_name("zzz").unwrap());
        assert_eq!(engine.find_rows("shared").unwrap(), vec![1]);
    }

    #[test]
    fn test_fetch_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine
            .index_document(&mut Document::new("a", "x1"), true)
            .unwrap();
        let doc: Document = engine.fetch(0).unwrap();
        assert_eq!(doc.doc_id, Some(0));
        assert!(matches!(
            engine.fetch::<Document>(5),
            Err(HootError::DocumentNotFound(5))
        ));
    }

    #[test]
    fn test_plain_mode() {
        let dir = tempfile::tempdir().unwrap();
        let engine =
            Engine::open(EngineConfig::new(dir.path()).with_doc_mode(false)).unwrap();
        engine.index_text(0, "Red car").unwrap();
        engine.index_text(4, "red bus").unwrap();
        assert_eq!(engine.next_doc_id(), 5);
        assert_eq!(engine.find_rows("red").unwrap(), vec![0, 4]);
        assert_eq!(engine.find_rows("-car").unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(
            engine.index_document(&mut Document::new("a", "b"), true),
            Err(HootError::NoDocuments)
        ));
    }

    #[test]
    fn test_dictionary_ahead_of_postings_is_reconciled() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = engine(dir.path());
            engine
                .index_document(&mut Document::new("a", "red car"), true)
                .unwrap();
            engine.shutdown().unwrap();
        }
        // postings lost, dictionary kept
        fs::remove_file(dir.path().join("t.mgbmr")).unwrap();
        fs::remove_file(dir.path().join("t.mgbmp")).unwrap();

        let engine = engine(dir.path());
        assert!(engine.find_rows("red").unwrap().is_empty());
        let id = engine
            .index_document(&mut Document::new("b", "red bus"), true)
            .unwrap();
        assert_eq!(engine.find_rows("red").unwrap(), vec![id]);
    }

    #[test]
    fn test_shutdown_closes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.shutdown().unwrap();
        engine.shutdown().unwrap();
        assert!(matches!(engine.query("x"), Err(HootError::Closed)));
    }
}

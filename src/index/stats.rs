use crate::index::engine::Engine;
use crate::index::types::ext;
use crate::utils::{file_size, format_size};
use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of an index's size and contents
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub index_dir: PathBuf,
    pub name: String,
    pub doc_mode: bool,
    pub words: usize,
    pub documents: u64,
    pub assigned_ids: u32,
    pub deleted: u64,
    pub cached_postings: usize,
    pub catalog_bytes: u64,
    pub blob_bytes: u64,
    pub archive_bytes: u64,
    pub dictionary_bytes: u64,
}

impl IndexStats {
    pub fn total_bytes(&self) -> u64 {
        self.catalog_bytes + self.blob_bytes + self.archive_bytes + self.dictionary_bytes
    }
}

pub fn collect(engine: &Engine) -> IndexStats {
    let config = engine.config();
    IndexStats {
        index_dir: config.index_dir.clone(),
        name: config.name.clone(),
        doc_mode: config.doc_mode,
        words: engine.word_count(),
        documents: engine.document_count(),
        assigned_ids: engine.next_doc_id(),
        deleted: engine.deleted_count(),
        cached_postings: engine.cached_postings(),
        catalog_bytes: file_size(&config.file_path(ext::CATALOG)),
        blob_bytes: file_size(&config.file_path(ext::BLOBS)),
        archive_bytes: file_size(&config.file_path(ext::ARCHIVE)),
        dictionary_bytes: file_size(&config.file_path(ext::WORDS)),
    }
}

/// Display index statistics
pub fn show_stats(engine: &Engine) {
    let stats = collect(engine);

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", stats.index_dir.display());
    println!("Index name:       {}", stats.name);
    println!("Document mode:    {}", stats.doc_mode);
    println!("Words:            {}", stats.words);
    println!("Documents:        {}", stats.documents);
    println!("Assigned ids:     {}", stats.assigned_ids);
    println!("Deleted:          {}", stats.deleted);
    println!();
    println!("Catalog:          {}", format_size(stats.catalog_bytes));
    println!("Postings:         {}", format_size(stats.blob_bytes));
    println!("Documents file:   {}", format_size(stats.archive_bytes));
    println!("Dictionary:       {}", format_size(stats.dictionary_bytes));
    println!("Index size:       {}", format_size(stats.total_bytes()));
}

use crate::bitmap::DEFAULT_SWITCH_OVER_COUNT;
use crate::utils::{MAX_TOKEN_LENGTH, MIN_TOKEN_LENGTH, default_index_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

/// Unique identifier for an indexed document; never reused
pub type DocId = u32;

/// Stable identifier of a distinct indexed word
pub type WordId = u32;

/// Position of a record in an append-only archive
pub type RecordNo = u32;

/// File extensions used by the index, keyed off the index name
pub mod ext {
    /// Offset catalog of the postings store
    pub const CATALOG: &str = "mgbmr";
    /// Blob file of the postings store
    pub const BLOBS: &str = "mgbmp";
    /// Document archive
    pub const ARCHIVE: &str = "mgdat";
    /// Ordered key index over the archive
    pub const KEY_INDEX: &str = "mgidx";
    /// Tombstoned document ids
    pub const DELETED: &str = "deleted";
    /// Word dictionary
    pub const WORDS: &str = "words";
}

/// A stored document.
///
/// `text` is indexed but not stored. Fields a caller wants kept alongside
/// the standard ones go into `extra` and come back from
/// [`Engine::find_documents`](crate::index::Engine::find_documents).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub doc_id: Option<DocId>,
    pub file_name: String,
    #[serde(default)]
    pub modified: u64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(skip)]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            file_name: file_name.into(),
            file_size: text.len() as u64,
            text,
            ..Default::default()
        }
    }

    /// Build a document for a file on disk, taking size and mtime from its metadata
    pub fn from_path(path: &Path, text: impl Into<String>) -> Self {
        let meta = fs::metadata(path).ok();
        let modified = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(|t| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
            .unwrap_or(0);

        Self {
            file_name: path.to_string_lossy().into_owned(),
            modified,
            file_size: meta.map(|m| m.len()).unwrap_or(0),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Attach a caller-defined field to the stored record
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Configuration for an index, constructed once and handed to every component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the index files
    pub index_dir: PathBuf,
    /// File stem shared by every index file
    pub name: String,
    /// Store documents and tombstones alongside the postings
    pub doc_mode: bool,
    /// Members a postings list may hold before it is allowed to turn dense
    pub bitmap_switch_over_count: usize,
    /// Drop the postings cache after the final commit on shutdown
    pub free_bitmap_memory_on_save: bool,
    /// Interval of the background save of the document index
    pub save_interval_secs: u64,
    /// Match stored file names case-sensitively
    pub case_sensitive_keys: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    /// Bulk indexing saves after this many files
    pub save_every: usize,
    /// Bulk indexing skips files larger than this
    pub max_file_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("hoot"),
            name: "hoot".to_string(),
            doc_mode: true,
            bitmap_switch_over_count: DEFAULT_SWITCH_OVER_COUNT,
            free_bitmap_memory_on_save: false,
            save_interval_secs: 1800,
            case_sensitive_keys: false,
            min_token_length: MIN_TOKEN_LENGTH,
            max_token_length: MAX_TOKEN_LENGTH,
            save_every: 1000,
            max_file_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl EngineConfig {
    /// Config for an index stored in `index_dir`
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            ..Default::default()
        }
    }

    /// Config for an index stored under the application data directory
    pub fn in_app_data(name: &str) -> anyhow::Result<Self> {
        Ok(Self {
            index_dir: default_index_dir(name)?,
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Load config from a JSON file, or return defaults if it does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        if path.exists() {
            let content = fs::read_to_string(path).context("Failed to read config file")?;
            let config: EngineConfig =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_doc_mode(mut self, doc_mode: bool) -> Self {
        self.doc_mode = doc_mode;
        self
    }

    /// Path of the index file with the given extension
    pub fn file_path(&self, extension: &str) -> PathBuf {
        self.index_dir.join(format!("{}.{}", self.name, extension))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }
}

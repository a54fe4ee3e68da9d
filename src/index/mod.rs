pub mod build;
pub mod dictionary;
pub mod engine;
pub mod gate;
pub mod postings;
pub mod stats;
pub mod tombstones;
pub mod types;
pub mod writer;

pub use dictionary::WordDictionary;
pub use engine::Engine;
pub use postings::PostingsStore;
pub use tombstones::TombstoneSet;
pub use types::*;
pub use writer::IndexWriter;

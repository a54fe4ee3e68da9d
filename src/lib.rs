//! # hoot - embeddable full-text bitmap index
//!
//! hoot maps documents to the words they contain and keeps one compressed
//! bitmap of document ids per word. Queries combine those bitmaps with set
//! algebra.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`bitmap`] - Adaptive bitset (sparse / dense / WAH-compressed)
//! - [`index`] - Postings store, dictionary, tombstones and the [`Engine`](index::Engine)
//! - [`query`] - Query parsing and evaluation
//! - [`store`] - Record archive, key index and file name lookup for stored documents
//! - [`output`] - Coloured CLI output
//! - [`utils`] - Tokenizer, byte encoding, app data directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use hoot::index::{Document, Engine, EngineConfig};
//!
//! # fn main() -> hoot::Result<()> {
//! let engine = Engine::open(EngineConfig::new("/tmp/hoot-demo"))?;
//! engine.index_document(&mut Document::new("a.txt", "red car"), true)?;
//! engine.index_document(&mut Document::new("b.txt", "red bus"), true)?;
//!
//! for name in engine.find_file_names("red -bus")? {
//!     println!("{name}");
//! }
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Query language
//!
//! Whitespace-separated words are intersected. `+word` unions, `-word`
//! subtracts, and `*` / `?` match any run of characters / any single one.

pub mod bitmap;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod store;
pub mod utils;

pub use error::{HootError, Result};

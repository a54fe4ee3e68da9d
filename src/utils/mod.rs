//! Utility functions shared across the index.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory management (XDG-compliant)
//! - [`codec`] - JSON document codec
//! - [`encoding`] - Fixed-width little-endian integer encoding
//! - [`tokenizer`] - Word extraction with frequencies
//!
//! ## Key Functions
//!
//! ```no_run
//! use hoot::utils::{DefaultTokenizer, Tokenizer};
//!
//! let freq = DefaultTokenizer::default().word_frequencies("red car, red bus");
//! assert_eq!(freq["red"], 2);
//! ```

pub mod app_data;
pub mod codec;
pub mod encoding;
pub mod tokenizer;

pub use app_data::*;
pub use encoding::*;
pub use tokenizer::*;

//! Compressed bitmap postings.
//!
//! - [`bitset`] - [`AdaptiveBitset`], the three-representation integer set
//! - [`wah`] - Word-Aligned Hybrid codec used for the at-rest form

pub mod bitset;
pub mod wah;

pub use bitset::{AdaptiveBitset, DEFAULT_SWITCH_OVER_COUNT, Members, RecordKind};

//! Query evaluation: fold clause operands into a result bitset.
//!
//! Rules, applied left to right:
//!
//! - the first clause that yields an operand seeds the result, whatever its combinator
//! - a leading `-` clause seeds the result with every id below the universe first
//! - an exact word missing from the dictionary empties the result under AND and
//!   is ignored under OR / AND NOT; later clauses still apply
//! - a wildcard clause's operand is the union of all matching words (possibly empty)
//! - tombstoned documents are masked out last

use crate::bitmap::AdaptiveBitset;
use crate::error::Result;
use crate::index::dictionary::WordDictionary;
use crate::index::postings::PostingsStore;
use crate::index::tombstones::TombstoneSet;
use crate::query::parser::{Combinator, Query, Term};
use crate::query::wildcard::WildcardPattern;
use std::time::Instant;
use tracing::debug;

pub struct QueryEvaluator<'a> {
    dictionary: &'a WordDictionary,
    postings: &'a PostingsStore,
    tombstones: Option<&'a TombstoneSet>,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(dictionary: &'a WordDictionary, postings: &'a PostingsStore) -> Self {
        Self {
            dictionary,
            postings,
            tombstones: None,
        }
    }

    /// Mask results with these tombstones
    pub fn with_tombstones(mut self, tombstones: &'a TombstoneSet) -> Self {
        self.tombstones = Some(tombstones);
        self
    }

    /// Evaluate `query` over document ids `0..universe`
    pub fn evaluate(&self, query: &Query, universe: u32) -> Result<AdaptiveBitset> {
        let start = Instant::now();
        let mut found: Option<AdaptiveBitset> = None;

        for clause in &query.clauses {
            if clause.op == Combinator::AndNot && found.is_none() {
                found = Some(AdaptiveBitset::filled(universe));
            }

            let operand = match &clause.term {
                Term::Wildcard(pattern) => Some(self.wildcard_union(pattern)?),
                Term::Exact(word) => match self.dictionary.get(word) {
                    Some(id) => {
                        let postings = self.postings.get(id)?;
                        let bits = postings.read().clone();
                        Some(bits)
                    }
                    None => None,
                },
            };

            found = match (found, operand) {
                (None, Some(operand)) => Some(operand),
                (Some(current), Some(operand)) => Some(match clause.op {
                    Combinator::And => current.and(&operand),
                    Combinator::Or => current.or(&operand),
                    Combinator::AndNot => current.and_not(&operand),
                }),
                (_, None) if clause.op == Combinator::And => Some(AdaptiveBitset::new()),
                (current, None) => current,
            };
        }

        let mut result = found.unwrap_or_default();
        if let Some(tombstones) = self.tombstones {
            result = result.and_not(&tombstones.snapshot());
        }

        debug!(
            clauses = query.clauses.len(),
            hits = result.count_ones(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "evaluated query"
        );
        Ok(result)
    }

    fn wildcard_union(&self, pattern: &str) -> Result<AdaptiveBitset> {
        let pattern = WildcardPattern::new(pattern)?;
        let mut ids = self.dictionary.matching(|word| pattern.is_match(word));
        ids.sort_unstable();

        let mut union = AdaptiveBitset::new();
        for id in ids {
            let postings = self.postings.get(id)?;
            union = union.or(&postings.read());
        }
        Ok(union)
    }
}

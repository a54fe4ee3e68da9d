//! Adaptive set of non-negative integers used for postings and tombstones.

use super::wah;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::collections::btree_set;

/// Default member count a sparse set may hold before it is allowed to turn dense
pub const DEFAULT_SWITCH_OVER_COUNT: usize = 10;

/// Representation tag written in front of a persisted bitset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Raw dense words
    Dense = 0,
    /// WAH token stream
    Compressed = 1,
    /// Sorted member list
    Sparse = 2,
}

impl RecordKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RecordKind::Dense),
            1 => Some(RecordKind::Compressed),
            2 => Some(RecordKind::Sparse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Repr {
    Sparse(BTreeSet<u32>),
    Dense(Vec<u32>),
    Compressed(Vec<u32>),
}

/// A growable bitset that picks its own representation.
///
/// Small sets are kept as an ordered member list. Once the list would cost as
/// much as a word array spanning the same range (and it holds more than the
/// switch-over count) it turns into a dense word array for good. A clean
/// dense set can be compressed in place with [`free_memory`](Self::free_memory);
/// reads keep working and the next mutation expands it again.
///
/// Bit `i` of word `w` stands for member `32 * w + i`, most significant bit
/// first.
#[derive(Debug, Clone)]
pub struct AdaptiveBitset {
    repr: Repr,
    switch_over: usize,
    dirty: bool,
}

impl Default for AdaptiveBitset {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AdaptiveBitset {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for AdaptiveBitset {}

#[inline]
fn mask(index: u32) -> u32 {
    1u32 << (31 - (index % 32))
}

fn unpack(members: &BTreeSet<u32>) -> Vec<u32> {
    let Some(&max) = members.last() else {
        return Vec::new();
    };
    let mut words = vec![0u32; (max as usize >> 5) + 1];
    for &m in members {
        words[m as usize >> 5] |= mask(m);
    }
    words
}

impl AdaptiveBitset {
    /// Create an empty set with the default switch-over count
    pub fn new() -> Self {
        Self::with_switch_over(DEFAULT_SWITCH_OVER_COUNT)
    }

    /// Create an empty set that stays sparse up to `switch_over` members
    pub fn with_switch_over(switch_over: usize) -> Self {
        Self {
            repr: Repr::Sparse(BTreeSet::new()),
            switch_over,
            dirty: false,
        }
    }

    /// Create a dense set from raw words
    pub fn from_words(words: Vec<u32>) -> Self {
        Self {
            repr: Repr::Dense(words),
            switch_over: DEFAULT_SWITCH_OVER_COUNT,
            dirty: false,
        }
    }

    /// Create a set holding every id in `0..count`
    pub fn filled(count: u32) -> Self {
        let needed = (count as usize).div_ceil(32);
        let mut words = vec![u32::MAX; needed];
        let rem = count % 32;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last = u32::MAX << (32 - rem);
            }
        }
        Self::from_words(words)
    }

    /// Rebuild a set from its persisted form
    pub fn from_record(kind: RecordKind, words: Vec<u32>, switch_over: usize) -> Self {
        let repr = match kind {
            RecordKind::Dense => Repr::Dense(words),
            RecordKind::Compressed => Repr::Dense(wah::decompress(&words)),
            RecordKind::Sparse => Repr::Sparse(words.into_iter().collect()),
        };
        let mut set = Self {
            repr,
            switch_over,
            dirty: false,
        };
        set.upgrade_if_needed();
        set
    }

    /// Persisted form of the set: sparse sets keep their member list, anything
    /// dense is written as WAH tokens.
    pub fn to_record(&self) -> (RecordKind, Vec<u32>) {
        match &self.repr {
            Repr::Sparse(members) => (RecordKind::Sparse, members.iter().copied().collect()),
            Repr::Dense(words) => (RecordKind::Compressed, wah::compress(words)),
            Repr::Compressed(tokens) => (RecordKind::Compressed, tokens.clone()),
        }
    }

    /// Membership test. A compressed set answers by walking its tokens, so
    /// call [`rehydrate`](Self::rehydrate) first when reading it repeatedly.
    pub fn get(&self, index: u32) -> bool {
        match &self.repr {
            Repr::Sparse(members) => members.contains(&index),
            Repr::Dense(words) => Self::word_bit(words, index),
            Repr::Compressed(tokens) => wah::bit_at(tokens, index),
        }
    }

    #[inline]
    fn word_bit(words: &[u32], index: u32) -> bool {
        words
            .get(index as usize >> 5)
            .map(|w| w & mask(index) != 0)
            .unwrap_or(false)
    }

    pub fn set(&mut self, index: u32, value: bool) {
        self.dirty = true;
        self.rehydrate();

        if let Repr::Sparse(members) = &mut self.repr {
            if value {
                members.insert(index);
            } else {
                members.remove(&index);
            }
            self.upgrade_if_needed();
            return;
        }

        if let Repr::Dense(words) = &mut self.repr {
            let word = index as usize >> 5;
            if value {
                if word >= words.len() {
                    words.resize(word + 1, 0);
                }
                words[word] |= mask(index);
            } else if let Some(w) = words.get_mut(word) {
                *w &= !mask(index);
            }
        }
    }

    /// Expand a compressed set back into dense words in place
    pub fn rehydrate(&mut self) {
        if let Repr::Compressed(tokens) = &self.repr {
            self.repr = Repr::Dense(wah::decompress(tokens));
        }
    }

    /// Whether the set is held as WAH tokens
    pub fn is_compressed(&self) -> bool {
        matches!(self.repr, Repr::Compressed(_))
    }

    /// Compress a clean dense set in place to shed resident memory.
    ///
    /// Reads on the compressed form decode it each time; mutation and
    /// [`rehydrate`](Self::rehydrate) bring back the dense words.
    pub fn free_memory(&mut self) {
        if self.dirty {
            return;
        }
        if let Repr::Dense(words) = &self.repr {
            self.repr = Repr::Compressed(wah::compress(words));
        }
    }

    fn upgrade_if_needed(&mut self) {
        let Repr::Sparse(members) = &self.repr else {
            return;
        };
        let Some(&max) = members.last() else {
            return;
        };
        let span = (max as usize >> 5) + 1;
        let count = members.len();
        if count > span && count > self.switch_over {
            self.repr = Repr::Dense(unpack(members));
        }
    }

    /// Dense word view of the set, whatever its representation
    pub fn words(&self) -> Cow<'_, [u32]> {
        match &self.repr {
            Repr::Sparse(members) => Cow::Owned(unpack(members)),
            Repr::Dense(words) => Cow::Borrowed(words),
            Repr::Compressed(tokens) => Cow::Owned(wah::decompress(tokens)),
        }
    }

    fn combine(&self, other: &Self, op: impl Fn(u32, u32) -> u32) -> Self {
        let left = self.words();
        let right = other.words();
        let len = left.len().max(right.len());
        let words = (0..len)
            .map(|i| {
                op(
                    left.get(i).copied().unwrap_or(0),
                    right.get(i).copied().unwrap_or(0),
                )
            })
            .collect();

        Self {
            repr: Repr::Dense(words),
            switch_over: self.switch_over,
            dirty: false,
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a | b)
    }

    pub fn and_not(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a & !b)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a ^ b)
    }

    /// Complement within `0..universe`. Members at or above `universe` are
    /// dropped; there is no infinite-domain complement.
    pub fn not(&self, universe: u32) -> Self {
        let needed = (universe as usize).div_ceil(32);
        let mut words = self.words().into_owned();
        words.resize(needed, 0);
        for w in words.iter_mut() {
            *w = !*w;
        }
        let rem = universe % 32;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last &= u32::MAX << (32 - rem);
            }
        }

        Self {
            repr: Repr::Dense(words),
            switch_over: self.switch_over,
            dirty: false,
        }
    }

    pub fn count_ones(&self) -> u64 {
        match &self.repr {
            Repr::Sparse(members) => members.len() as u64,
            _ => self.words().iter().map(|w| w.count_ones() as u64).sum(),
        }
    }

    /// Unset positions below the padded end of the backing array.
    ///
    /// For a dense set this is `words * 32 - ones`, so trailing padding in a
    /// grown array is counted as zeros. A sparse set counts up to its largest
    /// member. Compressing and rehydrating trims trailing zero words, so the
    /// result can shrink across [`free_memory`](Self::free_memory) while
    /// [`count_ones`](Self::count_ones) stays the same.
    pub fn count_zeros(&self) -> u64 {
        match &self.repr {
            Repr::Sparse(members) => members
                .last()
                .map(|&max| max as u64 + 1 - members.len() as u64)
                .unwrap_or(0),
            _ => {
                let words = self.words();
                words.len() as u64 * 32 - words.iter().map(|w| w.count_ones() as u64).sum::<u64>()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Sparse(members) => members.is_empty(),
            _ => self.words().iter().all(|&w| w == 0),
        }
    }

    /// Smallest member, if any
    pub fn first(&self) -> Option<u32> {
        self.iter().next()
    }

    /// Ascending iterator over members
    pub fn iter(&self) -> Members<'_> {
        let inner = match &self.repr {
            Repr::Sparse(members) => MembersInner::Sparse(members.iter()),
            _ => MembersInner::Words {
                words: self.words(),
                next_word: 0,
                current: 0,
            },
        };
        Members { inner }
    }

    /// Whether the set changed since it was last persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl<'a> IntoIterator for &'a AdaptiveBitset {
    type Item = u32;
    type IntoIter = Members<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<u32> for AdaptiveBitset {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = AdaptiveBitset::new();
        for i in iter {
            set.set(i, true);
        }
        set
    }
}

/// Iterator over the members of an [`AdaptiveBitset`]
pub struct Members<'a> {
    inner: MembersInner<'a>,
}

enum MembersInner<'a> {
    Sparse(btree_set::Iter<'a, u32>),
    Words {
        words: Cow<'a, [u32]>,
        next_word: usize,
        current: u32,
    },
}

impl Iterator for Members<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match &mut self.inner {
            MembersInner::Sparse(iter) => iter.next().copied(),
            MembersInner::Words {
                words,
                next_word,
                current,
            } => loop {
                if *current != 0 {
                    let lz = current.leading_zeros();
                    *current &= !(1u32 << (31 - lz));
                    return Some((*next_word as u32 - 1) * 32 + lz);
                }
                if *next_word >= words.len() {
                    return None;
                }
                *current = words[*next_word];
                *next_word += 1;
            },
        }
    }
}

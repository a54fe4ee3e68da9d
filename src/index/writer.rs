use crate::error::Result;
use crate::index::dictionary::WordDictionary;
use crate::index::postings::PostingsStore;
use crate::index::types::DocId;
use crate::utils::{Tokenizer, split_words};

/// Index writer: turns document text into postings-list bits
pub struct IndexWriter<'a> {
    dictionary: &'a WordDictionary,
    postings: &'a PostingsStore,
    tokenizer: &'a dyn Tokenizer,
}

impl<'a> IndexWriter<'a> {
    pub fn new(
        dictionary: &'a WordDictionary,
        postings: &'a PostingsStore,
        tokenizer: &'a dyn Tokenizer,
    ) -> Self {
        Self {
            dictionary,
            postings,
            tokenizer,
        }
    }

    /// Index `text` under `doc`. Returns the number of distinct words set.
    ///
    /// Document mode runs the tokenizer; plain mode lowercases and splits on
    /// spaces.
    pub fn add(&self, doc: DocId, text: &str, doc_mode: bool) -> Result<usize> {
        if doc_mode {
            let frequencies = self.tokenizer.word_frequencies(text);
            self.add_words(doc, frequencies.keys())
        } else {
            let mut words = split_words(text);
            words.sort_unstable();
            words.dedup();
            self.add_words(doc, &words)
        }
    }

    /// Set `doc` in the postings list of every word, allocating ids for new words
    pub fn add_words<I, S>(&self, doc: DocId, words: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for word in words {
            let word = word.as_ref();
            if word.is_empty() {
                continue;
            }
            let id = self
                .dictionary
                .get_or_insert_with(word, || self.postings.allocate_id());
            self.postings.set(id, doc, true)?;
            added += 1;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::DefaultTokenizer;
    use std::path::Path;

    fn stores(dir: &Path) -> (WordDictionary, PostingsStore) {
        let dict = WordDictionary::open(dir.join("t.words")).unwrap();
        let postings =
            PostingsStore::open_at(dir.join("t.mgbmr"), dir.join("t.mgbmp"), 10).unwrap();
        (dict, postings)
    }

    fn docs_for(dict: &WordDictionary, postings: &PostingsStore, word: &str) -> Vec<u32> {
        let id = dict.get(word).unwrap();
        postings.get(id).unwrap().read().iter().collect()
    }

    #[test]
    fn test_doc_mode_uses_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let (dict, postings) = stores(dir.path());
        let tokenizer = DefaultTokenizer::default();
        let writer = IndexWriter::new(&dict, &postings, &tokenizer);

        assert_eq!(writer.add(0, "Red car, red!", true).unwrap(), 2);
        writer.add(1, "red bus", true).unwrap();

        assert_eq!(docs_for(&dict, &postings, "red"), vec![0, 1]);
        assert_eq!(docs_for(&dict, &postings, "car"), vec![0]);
        assert_eq!(dict.len(), 3);
        assert_eq!(postings.len(), 3);
    }

    #[test]
    fn test_plain_mode_splits_on_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let (dict, postings) = stores(dir.path());
        let tokenizer = DefaultTokenizer::default();
        let writer = IndexWriter::new(&dict, &postings, &tokenizer);

        writer.add(3, "Hello, World  hello,", false).unwrap();
        assert_eq!(docs_for(&dict, &postings, "hello,"), vec![3]);
        assert_eq!(docs_for(&dict, &postings, "world"), vec![3]);
        assert!(dict.get("hello").is_none());
    }

    #[test]
    fn test_empty_text_indexes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (dict, postings) = stores(dir.path());
        let tokenizer = DefaultTokenizer::default();
        let writer = IndexWriter::new(&dict, &postings, &tokenizer);
        assert_eq!(writer.add(0, "", true).unwrap(), 0);
        assert_eq!(writer.add(0, "", false).unwrap(), 0);
        assert!(dict.is_empty());
    }
}

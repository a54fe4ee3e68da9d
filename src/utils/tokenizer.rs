use rustc_hash::FxHashMap;

/// Maximum token length to store in the index.
/// Tokens longer than this are likely base64, hex dumps, or other non-searchable content.
pub const MAX_TOKEN_LENGTH: usize = 128;

/// Shortest token worth indexing
pub const MIN_TOKEN_LENGTH: usize = 2;

/// Splits text into words and counts how often each occurs.
///
/// The indexing path only looks at which words occur; the counts are part of
/// the contract for tokenizers shared with other consumers.
pub trait Tokenizer: Send + Sync {
    fn word_frequencies(&self, text: &str) -> FxHashMap<String, u32>;
}

/// Default tokenizer: alphanumeric runs, lowercased, length-bounded
#[derive(Debug, Clone)]
pub struct DefaultTokenizer {
    min_len: usize,
    max_len: usize,
}

impl Default for DefaultTokenizer {
    fn default() -> Self {
        Self::new(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH)
    }
}

impl DefaultTokenizer {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            min_len: min_len.max(1),
            max_len,
        }
    }

    fn add_token(&self, freq: &mut FxHashMap<String, u32>, token: &str) {
        // Only add tokens of meaningful length, skip overly long tokens
        let len = token.chars().count();
        if len >= self.min_len && len <= self.max_len {
            *freq.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    /// Fast path for pure ASCII input
    fn ascii_frequencies(&self, bytes: &[u8]) -> FxHashMap<String, u32> {
        let mut freq = FxHashMap::default();
        let mut token_start: Option<usize> = None;

        for (i, &byte) in bytes.iter().enumerate() {
            if byte.is_ascii_alphanumeric() {
                if token_start.is_none() {
                    token_start = Some(i);
                }
            } else if let Some(start) = token_start.take() {
                self.add_ascii(&mut freq, &bytes[start..i]);
            }
        }

        // Handle last token
        if let Some(start) = token_start {
            self.add_ascii(&mut freq, &bytes[start..]);
        }

        freq
    }

    fn add_ascii(&self, freq: &mut FxHashMap<String, u32>, slice: &[u8]) {
        if slice.len() >= self.min_len && slice.len() <= self.max_len {
            let token: String = slice.iter().map(|b| b.to_ascii_lowercase() as char).collect();
            *freq.entry(token).or_insert(0) += 1;
        }
    }
}

impl Tokenizer for DefaultTokenizer {
    fn word_frequencies(&self, text: &str) -> FxHashMap<String, u32> {
        if text.is_ascii() {
            return self.ascii_frequencies(text.as_bytes());
        }

        let mut freq = FxHashMap::default();
        let mut current = String::new();

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                current.extend(ch.to_lowercase());
            } else if !current.is_empty() {
                self.add_token(&mut freq, &current);
                current.clear();
            }
        }

        if !current.is_empty() {
            self.add_token(&mut freq, &current);
        }

        freq
    }
}

/// Plain indexing mode: lowercase the text and split on single spaces
pub fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

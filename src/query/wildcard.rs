use crate::error::Result;
use regex::{Regex, RegexBuilder};

/// Compiled `*`/`?` pattern, anchored to the whole word, case-insensitive
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' | '?' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(if ch == '*' { ".*" } else { "." });
                }
                _ => literal.push(ch),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = RegexBuilder::new(&source).case_insensitive(true).build()?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, word: &str) -> bool {
        self.regex.is_match(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question_mark() {
        let p = WildcardPattern::new("c?r*").unwrap();
        assert!(p.is_match("car"));
        assert!(p.is_match("cargo"));
        assert!(p.is_match("CURL"));
        assert!(!p.is_match("cr"));
        assert!(!p.is_match("scar"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = WildcardPattern::new("a.b*").unwrap();
        assert!(p.is_match("a.bc"));
        assert!(!p.is_match("axbc"));
        assert!(WildcardPattern::new("(x)[*").unwrap().is_match("(x)[y"));
    }

    #[test]
    fn test_anchored() {
        let p = WildcardPattern::new("?at").unwrap();
        assert!(p.is_match("cat"));
        assert!(!p.is_match("cats"));
        assert!(!p.is_match("at"));
    }
}

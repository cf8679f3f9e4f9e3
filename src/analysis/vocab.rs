//! Token-surface frequency counting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Corpus-wide token frequency map.
///
/// Flags rare and out-of-vocabulary tokens during analysis. Tokens are
/// lowercased; raw records are split on whitespace, annotated records
/// use their token surfaces. Shares the ingestion path with the rest of
/// the analysis layer; no further algorithmic content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocab {
    counts: HashMap<String, u64>,
    total: u64,
}

impl Vocab {
    /// Empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count whitespace-separated surfaces across raw records.
    #[must_use]
    pub fn count<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for record in records {
            vocab.add_text(record.as_ref());
        }
        vocab
    }

    /// Count annotated token surfaces.
    #[must_use]
    pub fn count_tokens<'a, I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut vocab = Self::new();
        vocab.add_tokens(tokens);
        vocab
    }

    /// Fold one raw record in.
    pub fn add_text(&mut self, text: &str) {
        for surface in text.split_whitespace() {
            *self.counts.entry(surface.to_lowercase()).or_default() += 1;
            self.total += 1;
        }
    }

    /// Fold annotated tokens in.
    pub fn add_tokens<'a, I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = &'a Token>,
    {
        for token in tokens {
            *self.counts.entry(token.text.to_lowercase()).or_default() += 1;
            self.total += 1;
        }
    }

    /// Occurrences of `token`, 0 if never seen.
    #[must_use]
    pub fn freq(&self, token: &str) -> u64 {
        self.counts.get(&token.to_lowercase()).copied().unwrap_or(0)
    }

    /// True if `token` occurs fewer than `min_count` times.
    #[must_use]
    pub fn is_rare(&self, token: &str, min_count: u64) -> bool {
        self.freq(token) < min_count
    }

    /// Fold another vocabulary's counts into this one.
    pub fn merge(&mut self, other: Vocab) {
        for (token, count) in other.counts {
            *self.counts.entry(token).or_default() += count;
        }
        self.total += other.total;
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if nothing has been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total token occurrences.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Pos, TextSpan};

    #[test]
    fn test_count_raw_records() {
        let vocab = Vocab::count(["The dog barks", "the cat sleeps"]);
        assert_eq!(vocab.freq("the"), 2);
        assert_eq!(vocab.freq("The"), 2);
        assert_eq!(vocab.freq("dog"), 1);
        assert_eq!(vocab.freq("unseen"), 0);
        assert_eq!(vocab.total(), 6);
        assert_eq!(vocab.len(), 5);
    }

    #[test]
    fn test_rare_flagging() {
        let vocab = Vocab::count(["a a a b"]);
        assert!(!vocab.is_rare("a", 3));
        assert!(vocab.is_rare("b", 2));
        assert!(vocab.is_rare("unseen", 1));
    }

    #[test]
    fn test_count_tokens() {
        let tokens = vec![
            Token::new("Dogs", "dog", Pos::Noun, TextSpan::new(0, 4)),
            Token::new("bark", "bark", Pos::Verb, TextSpan::new(5, 9)),
        ];
        let vocab = Vocab::count_tokens(&tokens);
        assert_eq!(vocab.freq("dogs"), 1);
        assert_eq!(vocab.freq("bark"), 1);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut left = Vocab::count(["a b"]);
        let right = Vocab::count(["b c"]);
        left.merge(right);

        assert_eq!(left.freq("a"), 1);
        assert_eq!(left.freq("b"), 2);
        assert_eq!(left.freq("c"), 1);
        assert_eq!(left.total(), 4);
    }

    #[test]
    fn test_empty() {
        let vocab = Vocab::new();
        assert!(vocab.is_empty());
        assert_eq!(vocab.total(), 0);
    }
}

//! Generalized linguistic pattern mining.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::target::Target;
use crate::token::Token;

/// Extracts generalized linguistic patterns from a target's tokens.
///
/// For every token window of length `min_len..=max_len` that stays
/// within one sentence, the miner emits:
///
/// - the *literal* pattern: lowercase lemmas joined by single spaces;
/// - the *generalized* pattern: open-class tokens (nouns, proper nouns,
///   verbs, adjectives) replaced by their coarse POS tag, closed-class
///   tokens kept as lowercase lemmas. Emitted only when it differs from
///   the literal form.
///
/// Literal patterns overfit and fully-generalized ones lose
/// discriminative value; substituting only the open classes sits
/// between the two. Windows never cross a sentence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMiner {
    min_len: usize,
    max_len: usize,
}

impl Default for PatternMiner {
    fn default() -> Self {
        Self {
            min_len: 1,
            max_len: 3,
        }
    }
}

impl PatternMiner {
    /// Create a miner for windows of `min_len..=max_len` tokens.
    ///
    /// Fails with [`Error::InvalidInput`] unless `1 <= min_len <= max_len`.
    pub fn new(min_len: usize, max_len: usize) -> Result<Self> {
        if min_len < 1 || min_len > max_len {
            return Err(Error::invalid_input(format!(
                "bad pattern window range {min_len}..={max_len}"
            )));
        }
        Ok(Self { min_len, max_len })
    }

    /// Smallest window length.
    #[must_use]
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Largest window length.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Lazy sequence of pattern strings mined from `target`.
    ///
    /// Patterns repeat if they occur in several windows; use
    /// [`PatternMiner::pattern_set`] for per-target deduplication.
    pub fn patterns<'a>(&self, target: &'a Target) -> impl Iterator<Item = String> + 'a {
        let min_len = self.min_len;
        let max_len = self.max_len;
        let tokens = target.tokens();
        (0..tokens.len()).flat_map(move |start| {
            (min_len..=max_len).flat_map(move |n| {
                let mut out = Vec::new();
                if let Some(window) = tokens.get(start..start + n) {
                    if same_sentence(window) {
                        let literal = literal_pattern(window);
                        let general = generalized_pattern(window);
                        if general != literal {
                            out.push(general);
                        }
                        out.push(literal);
                    }
                }
                out
            })
        })
    }

    /// Deduplicated patterns of `target`, as used for coverage counting.
    ///
    /// A pattern occurring in several windows of one target still covers
    /// the instance once.
    #[must_use]
    pub fn pattern_set(&self, target: &Target) -> BTreeSet<String> {
        self.patterns(target).collect()
    }
}

/// Tokens annotated as sorted and sentence-non-decreasing, so equal
/// endpoints mean the whole window shares a sentence.
fn same_sentence(window: &[Token]) -> bool {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => first.sentence == last.sentence,
        _ => false,
    }
}

fn literal_pattern(window: &[Token]) -> String {
    window
        .iter()
        .map(Token::lemma_lower)
        .collect::<Vec<_>>()
        .join(" ")
}

fn generalized_pattern(window: &[Token]) -> String {
    window
        .iter()
        .map(|t| {
            if t.pos.is_open_class() {
                t.pos.as_tag().to_string()
            } else {
                t.lemma_lower()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

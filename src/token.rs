//! Tokens, part-of-speech tags, and character spans.

use serde::{Deserialize, Serialize};

/// A half-open character range `[start, end)` into a target's text.
///
/// Offsets count Unicode scalar values, not bytes, so spans remain
/// stable across targets containing multi-byte characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextSpan {
    /// Start offset (inclusive, in chars).
    pub start: usize,
    /// End offset (exclusive, in chars).
    pub end: usize,
}

impl TextSpan {
    /// Create a new span. `start` must not exceed `end`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} exceeds end {end}");
        Self { start, end }
    }

    /// Number of characters covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the span covers no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True if `offset` falls inside the span.
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// True if this span shares at least one character with `other`.
    #[must_use]
    pub fn overlaps(&self, other: &TextSpan) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

impl std::fmt::Display for TextSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

/// Coarse part-of-speech tag.
///
/// Follows the Universal Dependencies tagset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pos {
    /// Common noun (NOUN)
    Noun,
    /// Proper noun (PROPN)
    Propn,
    /// Verb (VERB)
    Verb,
    /// Adjective (ADJ)
    Adj,
    /// Adverb (ADV)
    Adv,
    /// Pronoun (PRON)
    Pron,
    /// Determiner (DET)
    Det,
    /// Adposition (ADP)
    Adp,
    /// Auxiliary verb (AUX)
    Aux,
    /// Coordinating conjunction (CCONJ)
    Cconj,
    /// Subordinating conjunction (SCONJ)
    Sconj,
    /// Particle (PART)
    Part,
    /// Numeral (NUM)
    Num,
    /// Interjection (INTJ)
    Intj,
    /// Symbol (SYM)
    Sym,
    /// Punctuation (PUNCT)
    Punct,
    /// Other/unknown (X)
    X,
}

impl Pos {
    /// Convert to the standard UD tag string.
    #[must_use]
    pub fn as_tag(&self) -> &'static str {
        match self {
            Pos::Noun => "NOUN",
            Pos::Propn => "PROPN",
            Pos::Verb => "VERB",
            Pos::Adj => "ADJ",
            Pos::Adv => "ADV",
            Pos::Pron => "PRON",
            Pos::Det => "DET",
            Pos::Adp => "ADP",
            Pos::Aux => "AUX",
            Pos::Cconj => "CCONJ",
            Pos::Sconj => "SCONJ",
            Pos::Part => "PART",
            Pos::Num => "NUM",
            Pos::Intj => "INTJ",
            Pos::Sym => "SYM",
            Pos::Punct => "PUNCT",
            Pos::X => "X",
        }
    }

    /// Parse from a UD tag string. Unknown tags map to [`Pos::X`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_uppercase().as_str() {
            "NOUN" => Pos::Noun,
            "PROPN" => Pos::Propn,
            "VERB" => Pos::Verb,
            "ADJ" => Pos::Adj,
            "ADV" => Pos::Adv,
            "PRON" => Pos::Pron,
            "DET" => Pos::Det,
            "ADP" => Pos::Adp,
            "AUX" => Pos::Aux,
            "CCONJ" | "CONJ" => Pos::Cconj,
            "SCONJ" => Pos::Sconj,
            "PART" => Pos::Part,
            "NUM" => Pos::Num,
            "INTJ" => Pos::Intj,
            "SYM" => Pos::Sym,
            "PUNCT" => Pos::Punct,
            _ => Pos::X,
        }
    }

    /// True for content-word classes worth generalizing in patterns
    /// (NOUN, PROPN, VERB, ADJ).
    #[must_use]
    pub fn is_open_class(&self) -> bool {
        matches!(self, Pos::Noun | Pos::Propn | Pos::Verb | Pos::Adj)
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// A single annotated token within a target's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Surface form as it appears in the text.
    pub text: String,
    /// Lemma (base form).
    pub lemma: String,
    /// Coarse part-of-speech tag.
    pub pos: Pos,
    /// Named-entity label, if any.
    pub entity: Option<String>,
    /// Character span within the target text.
    pub span: TextSpan,
    /// Zero-based sentence index.
    pub sentence: u32,
}

impl Token {
    /// Create a token in sentence 0 with no entity label.
    #[must_use]
    pub fn new(text: impl Into<String>, lemma: impl Into<String>, pos: Pos, span: TextSpan) -> Self {
        Self {
            text: text.into(),
            lemma: lemma.into(),
            pos,
            entity: None,
            span,
            sentence: 0,
        }
    }

    /// Attach a named-entity label.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Place the token in the given sentence.
    #[must_use]
    pub fn in_sentence(mut self, sentence: u32) -> Self {
        self.sentence = sentence;
        self
    }

    /// Lowercased lemma, as used by pattern mining and vocab counts.
    #[must_use]
    pub fn lemma_lower(&self) -> String {
        self.lemma.to_lowercase()
    }
}

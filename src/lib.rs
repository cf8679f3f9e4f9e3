//! # errata
//!
//! Error analysis for NLP model predictions.
//!
//! - **Versioned store**: instances, their groundtruths, and any number
//!   of model predictions, addressed by `(qid, vid)` so counterfactual
//!   rewrites coexist with originals
//! - **Pattern mining**: literal lemma n-grams and POS-generalized
//!   patterns per target field
//! - **Correlation**: per role, per pattern, per model coverage and
//!   error-rate statistics over a corpus
//!
//! Annotation, model inference, and task scoring are consumed through
//! the [`Annotator`], [`Predictor`], and [`Scorer`] traits; this crate
//! implements none of them beyond mocks.
//!
//! ## Quick Start
//!
//! ```rust
//! use errata::{
//!     Accuracy, CorrelatorConfig, InstanceStore, MockAnnotator, MockPredictor,
//!     PerformanceCorrelator, Pipeline, Prediction, RawRecord,
//! };
//!
//! let annotator = MockAnnotator::new();
//! let m1 = MockPredictor::new("m1").with_default(Prediction::new("neutral", 0.9));
//! let pipeline = Pipeline::new(&annotator, &Accuracy).with_predictor(&m1);
//!
//! let store = InstanceStore::new();
//! let records = vec![
//!     RawRecord::new("q1")
//!         .target("premise", "Two women are embracing")
//!         .target("hypothesis", "Two people are embracing")
//!         .groundtruth("neutral"),
//! ];
//! let report = pipeline.run(&records, &store);
//! assert_eq!(report.processed, 1);
//!
//! let instances: Vec<_> = store.all_versions("q1").collect();
//! let config = CorrelatorConfig::new(vec!["premise".into()], vec!["m1".into()]);
//! let analysis = PerformanceCorrelator::new(config).compute(&instances);
//! assert_eq!(analysis.processed, 1);
//! ```
//!
//! ## Versioned Rewrites
//!
//! A rewrite never mutates: it produces a new instance under the next
//! version id, and both stay addressable.
//!
//! ```rust
//! use errata::{Entry, Instance, InstanceStore, MockAnnotator, Target};
//! use std::collections::{BTreeMap, HashMap};
//!
//! let annotator = MockAnnotator::new();
//! let store = InstanceStore::new();
//!
//! let premise = Target::annotate(
//!     &annotator, "q1", 0, "premise", "Two women are embracing", HashMap::new(),
//! ).unwrap();
//! let original = Instance::create(
//!     "q1",
//!     BTreeMap::from([("premise".to_string(), Entry::Target(premise))]),
//! ).unwrap();
//! store.register(original.clone(), false).unwrap();
//!
//! let replacement = Target::annotate(
//!     &annotator, "q1", 0, "premise", "Two men are embracing", HashMap::new(),
//! ).unwrap();
//! let rewrite = store
//!     .register_rewrite(&original, "premise", Entry::Target(replacement))
//!     .unwrap();
//!
//! assert_eq!(rewrite.vid(), 1);
//! assert_eq!(store.all_versions("q1").count(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! Locking defaults to `std::sync`; the `fast-lock` feature swaps in
//! `parking_lot`.
//!
//! ```toml
//! [dependencies]
//! errata = { version = "0.1", features = ["fast-lock"] }
//! ```
//!
//! ## Design Philosophy
//!
//! - **Immutable values**: targets, labels, and instances never mutate;
//!   versions are snapshots in an arena
//! - **Trait seams**: annotation, inference, and scoring stay external
//! - **Graceful degradation**: one bad record never aborts a batch; it
//!   is logged, counted, and skipped
//! - **Deterministic analysis**: identical instances and predictions
//!   always produce identical reports

#![warn(missing_docs)]

pub mod analysis;
pub mod batch;
mod error;
mod instance;
mod label;
pub mod registry;
pub mod scoring;
mod store;
pub mod sync;
mod target;
mod token;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// =============================================================================
// Collaborator Traits
// =============================================================================

/// External linguistic annotation pipeline.
///
/// Must be deterministic for identical text and return tokens sorted by
/// start offset with non-overlapping spans. Implemented outside this
/// crate; [`MockAnnotator`] serves tests.
pub trait Annotator: Send + Sync {
    /// Annotator name, for reports and registries.
    fn name(&self) -> &str;

    /// Annotate `text` into a token sequence.
    fn annotate(&self, text: &str) -> Result<Vec<Token>>;
}

/// External predictive model.
///
/// Receives the raw role-to-text inputs of one instance. May fail, in
/// which case no prediction label is produced for the model on that
/// instance.
pub trait Predictor: Send + Sync {
    /// Model name, used as the label's `model` tag.
    fn name(&self) -> &str;

    /// Predict a label for the given inputs.
    fn predict(&self, inputs: &BTreeMap<String, String>) -> Result<Prediction>;
}

/// One model inference result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label text.
    pub text: String,
    /// Model confidence (0.0-1.0).
    pub confidence: f64,
}

impl Prediction {
    /// Create a prediction, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// =============================================================================
// Mocks
// =============================================================================

/// A mock annotator for testing purposes.
///
/// Returns canned token sequences where registered and falls back to a
/// deterministic whitespace tokenizer: each word keeps its surface, the
/// lowercased surface as lemma, [`Pos::X`], sentence 0, and correct
/// character spans.
///
/// # Example
///
/// ```rust
/// use errata::{Annotator, MockAnnotator, Pos, TextSpan, Token};
///
/// let annotator = MockAnnotator::new().with_text(
///     "Dogs bark",
///     vec![
///         Token::new("Dogs", "dog", Pos::Noun, TextSpan::new(0, 4)),
///         Token::new("bark", "bark", Pos::Verb, TextSpan::new(5, 9)),
///     ],
/// );
///
/// let tokens = annotator.annotate("Dogs bark").unwrap();
/// assert_eq!(tokens[0].lemma, "dog");
///
/// // Unregistered text gets the whitespace fallback.
/// let tokens = annotator.annotate("something else").unwrap();
/// assert_eq!(tokens.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAnnotator {
    canned: HashMap<String, Vec<Token>>,
}

impl MockAnnotator {
    /// Create a mock annotator with no canned texts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned token sequence for `text`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>, tokens: Vec<Token>) -> Self {
        self.canned.insert(text.into(), tokens);
        self
    }

    fn whitespace_tokens(text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut word = String::new();
        let mut start = 0;
        let mut walked = 0;
        for (i, ch) in text.chars().enumerate() {
            walked = i + 1;
            if ch.is_whitespace() {
                if !word.is_empty() {
                    tokens.push(Self::word_token(&word, start, i));
                    word.clear();
                }
            } else {
                if word.is_empty() {
                    start = i;
                }
                word.push(ch);
            }
        }
        if !word.is_empty() {
            tokens.push(Self::word_token(&word, start, walked));
        }
        tokens
    }

    fn word_token(surface: &str, start: usize, end: usize) -> Token {
        Token::new(
            surface,
            surface.to_lowercase(),
            Pos::X,
            TextSpan::new(start, end),
        )
    }
}

impl Annotator for MockAnnotator {
    fn name(&self) -> &str {
        "mock-annotator"
    }

    fn annotate(&self, text: &str) -> Result<Vec<Token>> {
        if let Some(tokens) = self.canned.get(text) {
            return Ok(tokens.clone());
        }
        Ok(Self::whitespace_tokens(text))
    }
}

/// A mock predictor for testing purposes.
///
/// Responds with a per-input-text override, then the default, then
/// fails; [`MockPredictor::failing`] injects failures for batch-policy
/// tests.
///
/// # Example
///
/// ```rust
/// use errata::{MockPredictor, Prediction, Predictor};
/// use std::collections::BTreeMap;
///
/// let model = MockPredictor::new("m1")
///     .with_default(Prediction::new("neutral", 0.8))
///     .with_response("Two men are embracing", Prediction::new("entailment", 0.6));
///
/// let inputs = BTreeMap::from([("premise".to_string(), "Two men are embracing".to_string())]);
/// assert_eq!(model.predict(&inputs).unwrap().text, "entailment");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPredictor {
    name: String,
    default: Option<Prediction>,
    by_input: HashMap<String, Prediction>,
    fail: bool,
}

impl MockPredictor {
    /// Create a mock predictor with no responses.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Response used when no per-input override matches.
    #[must_use]
    pub fn with_default(mut self, prediction: Prediction) -> Self {
        self.default = Some(prediction);
        self
    }

    /// Respond with `prediction` whenever any input value equals
    /// `input_text`.
    #[must_use]
    pub fn with_response(mut self, input_text: impl Into<String>, prediction: Prediction) -> Self {
        self.by_input.insert(input_text.into(), prediction);
        self
    }

    /// Make every prediction fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Predictor for MockPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, inputs: &BTreeMap<String, String>) -> Result<Prediction> {
        if self.fail {
            return Err(Error::prediction(format!(
                "mock predictor '{}' configured to fail",
                self.name
            )));
        }
        inputs
            .values()
            .find_map(|text| self.by_input.get(text))
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| {
                Error::prediction(format!(
                    "mock predictor '{}' has no response for these inputs",
                    self.name
                ))
            })
    }
}

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use errata::prelude::*;
    //!
    //! let store = InstanceStore::new();
    //! assert!(store.is_empty());
    //! ```
    pub use crate::analysis::correlate::{
        CorrelationReport, CorrelatorConfig, LinguisticRecord, PerformanceCorrelator,
    };
    pub use crate::analysis::patterns::PatternMiner;
    pub use crate::analysis::vocab::Vocab;
    pub use crate::batch::{BatchReport, Pipeline, RawRecord};
    pub use crate::error::{Error, Result};
    pub use crate::instance::{Entry, Instance, InstanceKey};
    pub use crate::label::Label;
    pub use crate::scoring::{Accuracy, Scorer, SpanF1};
    pub use crate::store::InstanceStore;
    pub use crate::target::Target;
    pub use crate::token::{Pos, TextSpan, Token};
    pub use crate::{Annotator, MockAnnotator, MockPredictor, Prediction, Predictor};
}

// Re-exports
pub use analysis::correlate::{
    CorrelationReport, CorrelatorConfig, LinguisticRecord, PatternCounts, PerformanceCorrelator,
};
pub use analysis::patterns::PatternMiner;
pub use analysis::vocab::Vocab;
pub use batch::{BatchReport, Pipeline, RawRecord, MAX_REPORTED_ERRORS};
pub use error::{Error, Result};
pub use instance::{Entry, Instance, InstanceKey, GROUNDTRUTHS_ROLE, PREDICTIONS_ROLE};
pub use label::{Label, GROUNDTRUTH_MODEL, LABEL_ROLE};
pub use registry::Registry;
pub use scoring::{Accuracy, Scorer, SpanF1};
pub use store::{AllVersions, InstanceStore};
pub use target::{Target, ORIGINAL_VID};
pub use token::{Pos, TextSpan, Token};

//! Labels: groundtruths and model predictions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scoring::Scorer;
use crate::target::Target;
use crate::token::TextSpan;
use crate::Annotator;

/// Model tag marking a groundtruth label rather than a prediction.
pub const GROUNDTRUTH_MODEL: &str = "groundtruth";

/// Role tag carried by predefined-class labels.
pub const LABEL_ROLE: &str = "label";

/// A target specialization representing a groundtruth or a model
/// prediction.
///
/// Every label wraps an annotated [`Target`] and adds the producing
/// model's name (or [`GROUNDTRUTH_MODEL`]) and a performance map filled
/// in by scoring. Two variants exist:
///
/// - a *predefined-class* label, whose text is drawn from the task's
///   fixed label vocabulary ([`Label::class`]);
/// - a *span* label, whose text is a literal substring of another
///   target and which carries the character offsets of the match
///   ([`Label::span`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    target: Target,
    model: String,
    /// Character offsets into the source target, span labels only.
    span: Option<TextSpan>,
    #[serde(default)]
    performance: HashMap<String, f64>,
    primary_metric: String,
}

impl Label {
    /// Construct a predefined-class label, annotating the label text.
    ///
    /// Fails with [`Error::Annotation`] if the text is empty or the
    /// annotator rejects it.
    pub fn class(
        annotator: &dyn Annotator,
        model: impl Into<String>,
        qid: impl Into<String>,
        vid: u32,
        text: impl Into<String>,
        metas: HashMap<String, String>,
    ) -> Result<Self> {
        let target = Target::annotate(annotator, qid, vid, LABEL_ROLE, text, metas)?;
        Ok(Self {
            target,
            model: model.into(),
            span: None,
            performance: HashMap::new(),
            primary_metric: "accuracy".to_string(),
        })
    }

    /// Assemble a predefined-class label around an already-annotated
    /// target.
    ///
    /// Used by ingestion layers that carry their own annotations. The
    /// label starts unscored.
    #[must_use]
    pub fn from_target(target: Target, model: impl Into<String>) -> Self {
        Self {
            target,
            model: model.into(),
            span: None,
            performance: HashMap::new(),
            primary_metric: "accuracy".to_string(),
        }
    }

    /// Construct a span label by locating `matched_text` inside `source`.
    ///
    /// The first literal occurrence wins, by character offset. The
    /// matched tokens are sliced from the source's annotation, so no
    /// re-annotation happens; the label inherits the source's role.
    ///
    /// Fails with [`Error::SpanNotFound`] if the text does not occur in
    /// the source, and with [`Error::InvalidInput`] if `vid` precedes the
    /// source's version: a prediction is at least as new as its inputs.
    pub fn span(
        model: impl Into<String>,
        vid: u32,
        source: &Target,
        matched_text: impl Into<String>,
        metas: HashMap<String, String>,
    ) -> Result<Self> {
        let matched_text = matched_text.into();
        if vid < source.vid() {
            return Err(Error::invalid_input(format!(
                "label vid {vid} precedes source vid {} of '{}'",
                source.vid(),
                source.qid()
            )));
        }
        let byte_start = source.text().find(&matched_text).ok_or_else(|| {
            Error::span_not_found(format!(
                "'{matched_text}' not in role '{}' of '{}'",
                source.role(),
                source.qid()
            ))
        })?;
        let start = source.text()[..byte_start].chars().count();
        let end = start + matched_text.chars().count();
        let span = TextSpan::new(start, end);
        let tokens = source.tokens_in(span);
        let target = Target::from_parts(
            source.qid(),
            vid,
            source.role(),
            matched_text,
            tokens,
            metas,
        );
        Ok(Self {
            target,
            model: model.into(),
            span: Some(span),
            performance: HashMap::new(),
            primary_metric: "f1".to_string(),
        })
    }

    /// Score this label against the groundtruth texts.
    ///
    /// Populates the performance map and records the scorer's primary
    /// metric. Scores are clamped to `[0, 1]`.
    pub fn score(&mut self, groundtruths: &[String], scorer: &dyn Scorer) {
        self.performance = scorer
            .score(self.text(), groundtruths)
            .into_iter()
            .map(|(metric, value)| (metric, value.clamp(0.0, 1.0)))
            .collect();
        self.primary_metric = scorer.primary_metric().to_string();
    }

    /// True iff the primary-metric score is below 1.0.
    ///
    /// An unscored label counts as incorrect.
    #[must_use]
    pub fn is_incorrect(&self) -> bool {
        match self.performance.get(&self.primary_metric) {
            Some(value) => *value < 1.0,
            None => true,
        }
    }

    /// True if this label is a groundtruth rather than a prediction.
    #[must_use]
    pub fn is_groundtruth(&self) -> bool {
        self.model == GROUNDTRUTH_MODEL
    }

    /// Producing model's name, or [`GROUNDTRUTH_MODEL`].
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Character offsets of the match in the source target, for span
    /// labels.
    #[must_use]
    pub fn matched_span(&self) -> Option<TextSpan> {
        self.span
    }

    /// Metric-name to score mapping, populated by [`Label::score`].
    #[must_use]
    pub fn performance(&self) -> &HashMap<String, f64> {
        &self.performance
    }

    /// Metric consulted by [`Label::is_incorrect`].
    #[must_use]
    pub fn primary_metric(&self) -> &str {
        &self.primary_metric
    }

    /// The wrapped annotated target.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Label text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.target.text()
    }

    /// Stable conceptual identifier shared by all versions.
    #[must_use]
    pub fn qid(&self) -> &str {
        self.target.qid()
    }

    /// Version id.
    #[must_use]
    pub fn vid(&self) -> u32 {
        self.target.vid()
    }

    /// Copy of this label stamped with a new version id.
    #[must_use]
    pub fn at_version(mut self, vid: u32) -> Self {
        self.target = self.target.at_version(vid);
        self
    }
}

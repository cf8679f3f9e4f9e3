//! Targets: immutable annotated spans of text.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instance::InstanceKey;
use crate::token::{TextSpan, Token};
use crate::Annotator;

/// Version id of a never-rewritten instance.
pub const ORIGINAL_VID: u32 = 0;

/// An immutable annotated span of text.
///
/// A target is the basic unit of linguistic querying: one field of one
/// instance version, identified by `(qid, vid)` plus a `role` tag such as
/// `"premise"`, `"hypothesis"`, or `"question"`. Targets are created once,
/// by ingestion or by a rewrite, and never mutated; a rewrite produces a
/// new target under a fresh `vid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    qid: String,
    vid: u32,
    role: String,
    text: String,
    tokens: Vec<Token>,
    #[serde(default)]
    metas: HashMap<String, String>,
}

impl Target {
    /// Construct a target by annotating `text` with the given annotator.
    ///
    /// Fails with [`Error::Annotation`] if the text is empty or the
    /// annotator rejects it.
    pub fn annotate(
        annotator: &dyn Annotator,
        qid: impl Into<String>,
        vid: u32,
        role: impl Into<String>,
        text: impl Into<String>,
        metas: HashMap<String, String>,
    ) -> Result<Self> {
        let qid = qid.into();
        let role = role.into();
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::annotation(format!(
                "empty text for role '{role}' of '{qid}'"
            )));
        }
        let tokens = annotator.annotate(&text)?;
        Ok(Self {
            qid,
            vid,
            role,
            text,
            tokens,
            metas,
        })
    }

    /// Assemble a target from already-annotated parts.
    ///
    /// Used by ingestion layers that carry their own annotations and by
    /// span-label construction, which slices an existing annotation
    /// instead of re-annotating.
    #[must_use]
    pub fn from_parts(
        qid: impl Into<String>,
        vid: u32,
        role: impl Into<String>,
        text: impl Into<String>,
        tokens: Vec<Token>,
        metas: HashMap<String, String>,
    ) -> Self {
        Self {
            qid: qid.into(),
            vid,
            role: role.into(),
            text: text.into(),
            tokens,
            metas,
        }
    }

    /// Copy of this target stamped with a new version id.
    ///
    /// Annotation does not depend on the version, so no re-annotation
    /// happens.
    #[must_use]
    pub fn at_version(mut self, vid: u32) -> Self {
        self.vid = vid;
        self
    }

    /// Stable conceptual identifier shared by all versions.
    #[must_use]
    pub fn qid(&self) -> &str {
        &self.qid
    }

    /// Version id. `0` denotes the original.
    #[must_use]
    pub fn vid(&self) -> u32 {
        self.vid
    }

    /// Role tag within the owning instance.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Token annotations, sorted by start offset.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Opaque role-specific metadata, passed through untouched.
    #[must_use]
    pub fn metas(&self) -> &HashMap<String, String> {
        &self.metas
    }

    /// Look up one metadata value.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metas.get(key).map(String::as_str)
    }

    /// `(qid, vid)` key of the owning instance version.
    #[must_use]
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.qid.clone(), self.vid)
    }

    /// True if this target belongs to the original (vid 0) version.
    #[must_use]
    pub fn is_original(&self) -> bool {
        self.vid == ORIGINAL_VID
    }

    /// Number of sentences marked in the annotation.
    #[must_use]
    pub fn sentence_count(&self) -> usize {
        self.tokens
            .iter()
            .map(|t| t.sentence)
            .max()
            .map_or(0, |m| m as usize + 1)
    }

    /// Tokens whose character span overlaps `span`.
    #[must_use]
    pub fn tokens_in(&self, span: TextSpan) -> Vec<Token> {
        self.tokens
            .iter()
            .filter(|t| t.span.overlaps(&span))
            .cloned()
            .collect()
    }
}

//! Error types for errata.

use thiserror::Error;

/// Result type for errata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for errata operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// External annotator unavailable or input unannotatable.
    #[error("Annotation failed: {0}")]
    Annotation(String),

    /// External predictor unavailable or inference failed.
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// Span label text not found in its source target.
    #[error("Span not found: {0}")]
    SpanNotFound(String),

    /// A `(qid, vid)` pair was registered twice.
    #[error("Duplicate version {vid} for instance '{qid}'")]
    DuplicateVersion {
        /// Stable instance identifier.
        qid: String,
        /// Version that was already registered.
        vid: u32,
    },

    /// No instance stored under `(qid, vid)`.
    #[error("Instance '{qid}' version {vid} not found")]
    InstanceNotFound {
        /// Stable instance identifier.
        qid: String,
        /// Version that was requested.
        vid: u32,
    },

    /// Role missing from an instance.
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// No prediction by the named model on an instance.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Malformed instance construction.
    #[error("Incomplete instance: {0}")]
    IncompleteInstance(String),

    /// Name missing from a registry.
    #[error("Not registered: {0}")]
    NotRegistered(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create an annotation error.
    pub fn annotation(msg: impl Into<String>) -> Self {
        Error::Annotation(msg.into())
    }

    /// Create a prediction error.
    pub fn prediction(msg: impl Into<String>) -> Self {
        Error::Prediction(msg.into())
    }

    /// Create a span-not-found error.
    pub fn span_not_found(msg: impl Into<String>) -> Self {
        Error::SpanNotFound(msg.into())
    }

    /// Create a role-not-found error.
    pub fn role_not_found(msg: impl Into<String>) -> Self {
        Error::RoleNotFound(msg.into())
    }

    /// Create a model-not-found error.
    pub fn model_not_found(msg: impl Into<String>) -> Self {
        Error::ModelNotFound(msg.into())
    }

    /// Create an incomplete-instance error.
    pub fn incomplete_instance(msg: impl Into<String>) -> Self {
        Error::IncompleteInstance(msg.into())
    }

    /// Create a not-registered error.
    pub fn not_registered(msg: impl Into<String>) -> Self {
        Error::NotRegistered(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

//! Batch ingestion of raw records into the instance store.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instance::{Entry, Instance, GROUNDTRUTHS_ROLE, PREDICTIONS_ROLE};
use crate::label::{Label, GROUNDTRUTH_MODEL};
use crate::store::InstanceStore;
use crate::target::{Target, ORIGINAL_VID};
use crate::{Annotator, Predictor, Scorer};

/// How many error messages a batch report keeps.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// One unannotated example as read from a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Stable conceptual identifier.
    pub qid: String,
    /// `(role, text)` pairs, e.g. `("premise", ...)`.
    pub targets: Vec<(String, String)>,
    /// Groundtruth label texts, one per annotator.
    pub groundtruths: Vec<String>,
    /// Opaque metadata copied onto every target.
    pub metas: HashMap<String, String>,
}

impl RawRecord {
    /// Start a record for `qid`.
    #[must_use]
    pub fn new(qid: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            ..Self::default()
        }
    }

    /// Add a target field.
    #[must_use]
    pub fn target(mut self, role: impl Into<String>, text: impl Into<String>) -> Self {
        self.targets.push((role.into(), text.into()));
        self
    }

    /// Add a groundtruth label text.
    #[must_use]
    pub fn groundtruth(mut self, text: impl Into<String>) -> Self {
        self.groundtruths.push(text.into());
        self
    }

    /// Attach one metadata pair.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metas.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a batch run: totals plus the first few error messages.
///
/// A batch never aborts on a bad record and never drops data without a
/// count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Records ingested and registered.
    pub processed: usize,
    /// Records excluded by the skip policy.
    pub skipped: usize,
    /// First [`MAX_REPORTED_ERRORS`] messages, each prefixed by its qid.
    pub errors: Vec<String>,
}

impl BatchReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        for message in other.errors {
            self.record_error(message);
        }
    }

    fn record_error(&mut self, message: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Annotate, predict, score, and register raw records.
///
/// Per record: every target text is annotated, groundtruth class labels
/// are built, every configured predictor runs over the raw role-to-text
/// inputs, each prediction is scored, and the assembled instance is
/// registered as an original (vid 0).
///
/// A failing record is logged with its qid, counted, and skipped; a
/// failing predictor skips only that model's label on that record.
pub struct Pipeline<'a> {
    annotator: &'a dyn Annotator,
    predictors: Vec<&'a dyn Predictor>,
    scorer: &'a dyn Scorer,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with no predictors yet.
    #[must_use]
    pub fn new(annotator: &'a dyn Annotator, scorer: &'a dyn Scorer) -> Self {
        Self {
            annotator,
            predictors: Vec::new(),
            scorer,
        }
    }

    /// Add a predictor, builder style.
    #[must_use]
    pub fn with_predictor(mut self, predictor: &'a dyn Predictor) -> Self {
        self.predictors.push(predictor);
        self
    }

    /// Ingest every record, registering the survivors into `store`.
    pub fn run(&self, records: &[RawRecord], store: &InstanceStore) -> BatchReport {
        let mut report = BatchReport::default();
        for record in records {
            match self
                .ingest(record)
                .and_then(|instance| store.register(instance, false))
            {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    warn!("skipping record '{}': {e}", record.qid);
                    report.skipped += 1;
                    report.record_error(format!("{}: {e}", record.qid));
                }
            }
        }
        info!(
            "batch complete: {} processed, {} skipped",
            report.processed, report.skipped
        );
        report
    }

    /// Build one original instance from a raw record.
    ///
    /// Annotation and groundtruth failures propagate to the caller; a
    /// predictor failure only drops that model's label.
    pub fn ingest(&self, record: &RawRecord) -> Result<Instance> {
        if record.qid.trim().is_empty() {
            return Err(Error::invalid_input("record without a qid"));
        }
        if record.targets.is_empty() {
            return Err(Error::incomplete_instance(format!(
                "record '{}' has no targets",
                record.qid
            )));
        }

        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
        let mut inputs: BTreeMap<String, String> = BTreeMap::new();
        for (role, text) in &record.targets {
            if role == PREDICTIONS_ROLE || role == GROUNDTRUTHS_ROLE {
                return Err(Error::invalid_input(format!(
                    "role '{role}' is reserved, record '{}'",
                    record.qid
                )));
            }
            let target = Target::annotate(
                self.annotator,
                record.qid.clone(),
                ORIGINAL_VID,
                role.clone(),
                text.clone(),
                record.metas.clone(),
            )?;
            if entries.insert(role.clone(), Entry::Target(target)).is_some() {
                return Err(Error::incomplete_instance(format!(
                    "duplicate role '{role}' in record '{}'",
                    record.qid
                )));
            }
            inputs.insert(role.clone(), text.clone());
        }

        let mut groundtruths = Vec::with_capacity(record.groundtruths.len());
        for text in &record.groundtruths {
            groundtruths.push(Label::class(
                self.annotator,
                GROUNDTRUTH_MODEL,
                record.qid.clone(),
                ORIGINAL_VID,
                text.clone(),
                HashMap::new(),
            )?);
        }

        let mut predictions = Vec::with_capacity(self.predictors.len());
        for predictor in &self.predictors {
            let predicted = match predictor.predict(&inputs) {
                Ok(predicted) => predicted,
                Err(e) => {
                    warn!(
                        "predictor '{}' failed on '{}': {e}",
                        predictor.name(),
                        record.qid
                    );
                    continue;
                }
            };
            let metas = HashMap::from([(
                "confidence".to_string(),
                predicted.confidence.to_string(),
            )]);
            let mut label = Label::class(
                self.annotator,
                predictor.name(),
                record.qid.clone(),
                ORIGINAL_VID,
                predicted.text,
                metas,
            )?;
            label.score(&record.groundtruths, self.scorer);
            predictions.push(label);
        }

        entries.insert(GROUNDTRUTHS_ROLE.to_string(), Entry::Labels(groundtruths));
        entries.insert(PREDICTIONS_ROLE.to_string(), Entry::Labels(predictions));
        Instance::create(record.qid.clone(), entries)
    }
}

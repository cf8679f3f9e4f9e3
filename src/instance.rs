//! Instances: versioned bundles of targets and labels.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::label::Label;
use crate::target::Target;

/// Role holding the ordered list of model predictions.
pub const PREDICTIONS_ROLE: &str = "predictions";

/// Role holding the ordered list of groundtruth labels.
pub const GROUNDTRUTHS_ROLE: &str = "groundtruths";

/// `(qid, vid)` pair addressing one instance version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Stable conceptual identifier.
    pub qid: String,
    /// Version id.
    pub vid: u32,
}

impl InstanceKey {
    /// Create a key.
    #[must_use]
    pub fn new(qid: impl Into<String>, vid: u32) -> Self {
        Self {
            qid: qid.into(),
            vid,
        }
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.qid, self.vid)
    }
}

/// One role's content within an instance.
///
/// Most roles hold a single [`Target`]; the `predictions` role holds an
/// ordered list of labels (one per model), and `groundtruths` holds an
/// ordered list too (one per annotator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// A single annotated target.
    Target(Target),
    /// An ordered list of labels.
    Labels(Vec<Label>),
}

impl Entry {
    /// The entry's version id: the target's vid, or the maximum label
    /// vid (0 for an empty list).
    #[must_use]
    pub fn vid(&self) -> u32 {
        match self {
            Entry::Target(target) => target.vid(),
            Entry::Labels(labels) => labels.iter().map(Label::vid).max().unwrap_or(0),
        }
    }

    /// The target, if this entry holds one.
    #[must_use]
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Entry::Target(target) => Some(target),
            Entry::Labels(_) => None,
        }
    }

    /// The labels, if this entry holds a list.
    #[must_use]
    pub fn as_labels(&self) -> Option<&[Label]> {
        match self {
            Entry::Target(_) => None,
            Entry::Labels(labels) => Some(labels),
        }
    }

    /// Copy of this entry with every part stamped at a new version id.
    #[must_use]
    pub fn at_version(self, vid: u32) -> Self {
        match self {
            Entry::Target(target) => Entry::Target(target.at_version(vid)),
            Entry::Labels(labels) => {
                Entry::Labels(labels.into_iter().map(|l| l.at_version(vid)).collect())
            }
        }
    }

    fn qids(&self) -> Vec<&str> {
        match self {
            Entry::Target(target) => vec![target.qid()],
            Entry::Labels(labels) => labels.iter().map(Label::qid).collect(),
        }
    }
}

/// A versioned bundle of targets and labels representing one example
/// and all its model predictions.
///
/// Identified by `(qid, vid)`. Instances are immutable values: updates
/// go through [`Instance::set_entries`], which returns a new instance,
/// and both versions stay addressable through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    qid: String,
    vid: u32,
    entries: BTreeMap<String, Entry>,
}

impl Instance {
    /// Build an instance from role entries.
    ///
    /// Fails with [`Error::IncompleteInstance`] if any entry's qid
    /// differs from `qid`. The instance vid is the maximum entry vid,
    /// or 0 when there are no entries.
    pub fn create(qid: impl Into<String>, entries: BTreeMap<String, Entry>) -> Result<Self> {
        let qid = qid.into();
        for (role, entry) in &entries {
            for entry_qid in entry.qids() {
                if entry_qid != qid {
                    return Err(Error::incomplete_instance(format!(
                        "entry '{role}' has qid '{entry_qid}', expected '{qid}'"
                    )));
                }
            }
        }
        let vid = entries.values().map(Entry::vid).max().unwrap_or(0);
        Ok(Self { qid, vid, entries })
    }

    /// New instance with the given roles replaced.
    ///
    /// Does not mutate the receiver; the result's vid is recomputed as
    /// the maximum over all entry vids.
    pub fn set_entries(&self, updates: BTreeMap<String, Entry>) -> Result<Self> {
        let mut entries = self.entries.clone();
        entries.extend(updates);
        Self::create(self.qid.clone(), entries)
    }

    /// The entry stored under `role`.
    ///
    /// Fails with [`Error::RoleNotFound`] if absent.
    pub fn get_entry(&self, role: &str) -> Result<&Entry> {
        self.entries
            .get(role)
            .ok_or_else(|| Error::role_not_found(format!("'{role}' in instance '{}'", self.qid)))
    }

    /// The single target stored under `role`.
    ///
    /// Fails with [`Error::RoleNotFound`] if the role is absent or holds
    /// labels instead.
    pub fn target(&self, role: &str) -> Result<&Target> {
        self.get_entry(role)?.as_target().ok_or_else(|| {
            Error::role_not_found(format!(
                "no single target under '{role}' of instance '{}'",
                self.qid
            ))
        })
    }

    /// The label list stored under `role`.
    ///
    /// Fails with [`Error::RoleNotFound`] if the role is absent or holds
    /// a single target instead.
    pub fn labels(&self, role: &str) -> Result<&[Label]> {
        self.get_entry(role)?.as_labels().ok_or_else(|| {
            Error::role_not_found(format!(
                "no label list under '{role}' of instance '{}'",
                self.qid
            ))
        })
    }

    /// The prediction produced by `model`.
    ///
    /// Fails with [`Error::ModelNotFound`] if no such prediction exists
    /// on this instance.
    pub fn prediction(&self, model: &str) -> Result<&Label> {
        self.labels(PREDICTIONS_ROLE)
            .ok()
            .and_then(|labels| labels.iter().find(|l| l.model() == model))
            .ok_or_else(|| {
                Error::model_not_found(format!("'{model}' on instance '{}'", self.qid))
            })
    }

    /// True iff `model`'s prediction on this instance is incorrect.
    ///
    /// Fails with [`Error::ModelNotFound`] if the model never predicted
    /// this instance.
    pub fn is_incorrect(&self, model: &str) -> Result<bool> {
        Ok(self.prediction(model)?.is_incorrect())
    }

    /// Groundtruth labels, empty if none are stored.
    #[must_use]
    pub fn groundtruths(&self) -> &[Label] {
        self.labels(GROUNDTRUTHS_ROLE).unwrap_or(&[])
    }

    /// Groundtruth label texts, in annotator order.
    #[must_use]
    pub fn groundtruth_texts(&self) -> Vec<String> {
        self.groundtruths()
            .iter()
            .map(|l| l.text().to_string())
            .collect()
    }

    /// The groundtruth label whose text holds a strict majority among
    /// all groundtruth annotators, or `None` when no strict majority
    /// exists. Disagreement is flagged, never resolved by a default.
    #[must_use]
    pub fn majority_groundtruth(&self) -> Option<&Label> {
        let groundtruths = self.groundtruths();
        let mut votes: HashMap<&str, usize> = HashMap::new();
        for label in groundtruths {
            *votes.entry(label.text()).or_default() += 1;
        }
        let (winner, count) = votes.into_iter().max_by_key(|(_, count)| *count)?;
        if count * 2 > groundtruths.len() {
            groundtruths.iter().find(|l| l.text() == winner)
        } else {
            None
        }
    }

    /// Stable conceptual identifier.
    #[must_use]
    pub fn qid(&self) -> &str {
        &self.qid
    }

    /// Version id. `0` denotes the original.
    #[must_use]
    pub fn vid(&self) -> u32 {
        self.vid
    }

    /// `(qid, vid)` key of this version.
    #[must_use]
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.qid.clone(), self.vid)
    }

    /// True if this instance is a rewrite rather than an original.
    #[must_use]
    pub fn is_rewrite(&self) -> bool {
        self.vid > 0
    }

    /// Role-to-entry mapping, ordered by role name.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    /// Role names, in order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::GROUNDTRUTH_MODEL;
    use crate::scoring::Accuracy;
    use crate::MockAnnotator;

    fn target(qid: &str, vid: u32, role: &str, text: &str) -> Target {
        let annotator = MockAnnotator::new();
        Target::annotate(&annotator, qid, vid, role, text, HashMap::new()).unwrap()
    }

    fn class_label(model: &str, qid: &str, vid: u32, text: &str) -> Label {
        let annotator = MockAnnotator::new();
        Label::class(&annotator, model, qid, vid, text, HashMap::new()).unwrap()
    }

    fn scored_prediction(model: &str, qid: &str, text: &str, groundtruth: &str) -> Label {
        let mut label = class_label(model, qid, 0, text);
        label.score(&[groundtruth.to_string()], &Accuracy);
        label
    }

    fn entries(qid: &str) -> BTreeMap<String, Entry> {
        BTreeMap::from([
            (
                "premise".to_string(),
                Entry::Target(target(qid, 0, "premise", "Two women are embracing")),
            ),
            (
                GROUNDTRUTHS_ROLE.to_string(),
                Entry::Labels(vec![class_label(GROUNDTRUTH_MODEL, qid, 0, "neutral")]),
            ),
            (
                PREDICTIONS_ROLE.to_string(),
                Entry::Labels(vec![
                    scored_prediction("m1", qid, "neutral", "neutral"),
                    scored_prediction("m2", qid, "entailment", "neutral"),
                ]),
            ),
        ])
    }

    #[test]
    fn test_create_computes_max_vid() {
        let entries = BTreeMap::from([
            (
                "premise".to_string(),
                Entry::Target(target("q1", 0, "premise", "a b")),
            ),
            (
                "hypothesis".to_string(),
                Entry::Target(target("q1", 3, "hypothesis", "c d")),
            ),
        ]);
        let instance = Instance::create("q1", entries).unwrap();
        assert_eq!(instance.vid(), 3);
        assert!(instance.is_rewrite());
    }

    #[test]
    fn test_create_rejects_qid_mismatch() {
        let entries = BTreeMap::from([(
            "premise".to_string(),
            Entry::Target(target("other", 0, "premise", "a b")),
        )]);
        let err = Instance::create("q1", entries).unwrap_err();
        assert!(matches!(err, Error::IncompleteInstance(_)));
    }

    #[test]
    fn test_empty_instance_vid_zero() {
        let instance = Instance::create("q1", BTreeMap::new()).unwrap();
        assert_eq!(instance.vid(), 0);
        assert!(!instance.is_rewrite());
    }

    #[test]
    fn test_set_entries_returns_new_instance() {
        let instance = Instance::create("q1", entries("q1")).unwrap();
        let updated = instance
            .set_entries(BTreeMap::from([(
                "premise".to_string(),
                Entry::Target(target("q1", 1, "premise", "Two men are embracing")),
            )]))
            .unwrap();

        assert_eq!(instance.vid(), 0);
        assert_eq!(updated.vid(), 1);
        assert_eq!(
            updated.target("premise").unwrap().text(),
            "Two men are embracing"
        );
        // Receiver untouched.
        assert_eq!(
            instance.target("premise").unwrap().text(),
            "Two women are embracing"
        );
    }

    #[test]
    fn test_role_lookup() {
        let instance = Instance::create("q1", entries("q1")).unwrap();
        assert!(instance.get_entry("premise").is_ok());
        assert!(matches!(
            instance.get_entry("hypothesis").unwrap_err(),
            Error::RoleNotFound(_)
        ));
        // Wrong shape also misses.
        assert!(matches!(
            instance.target(PREDICTIONS_ROLE).unwrap_err(),
            Error::RoleNotFound(_)
        ));
        assert!(matches!(
            instance.labels("premise").unwrap_err(),
            Error::RoleNotFound(_)
        ));
    }

    #[test]
    fn test_is_incorrect_per_model() {
        let instance = Instance::create("q1", entries("q1")).unwrap();
        assert!(!instance.is_incorrect("m1").unwrap());
        assert!(instance.is_incorrect("m2").unwrap());
        assert!(matches!(
            instance.is_incorrect("m3").unwrap_err(),
            Error::ModelNotFound(_)
        ));
    }

    #[test]
    fn test_model_not_found_without_predictions_role() {
        let instance = Instance::create("q1", BTreeMap::new()).unwrap();
        assert!(matches!(
            instance.prediction("m1").unwrap_err(),
            Error::ModelNotFound(_)
        ));
    }

    #[test]
    fn test_majority_groundtruth() {
        let labels = vec![
            class_label(GROUNDTRUTH_MODEL, "q1", 0, "neutral"),
            class_label(GROUNDTRUTH_MODEL, "q1", 0, "neutral"),
            class_label(GROUNDTRUTH_MODEL, "q1", 0, "entailment"),
        ];
        let instance = Instance::create(
            "q1",
            BTreeMap::from([(GROUNDTRUTHS_ROLE.to_string(), Entry::Labels(labels))]),
        )
        .unwrap();
        assert_eq!(instance.majority_groundtruth().unwrap().text(), "neutral");
    }

    #[test]
    fn test_no_strict_majority_flags_none() {
        let labels = vec![
            class_label(GROUNDTRUTH_MODEL, "q1", 0, "neutral"),
            class_label(GROUNDTRUTH_MODEL, "q1", 0, "entailment"),
        ];
        let instance = Instance::create(
            "q1",
            BTreeMap::from([(GROUNDTRUTHS_ROLE.to_string(), Entry::Labels(labels))]),
        )
        .unwrap();
        assert!(instance.majority_groundtruth().is_none());

        let empty = Instance::create("q2", BTreeMap::new()).unwrap();
        assert!(empty.majority_groundtruth().is_none());
    }

    #[test]
    fn test_key_display() {
        let key = InstanceKey::new("q1", 2);
        assert_eq!(key.to_string(), "q1@v2");
    }
}

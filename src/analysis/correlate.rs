//! Linguistic-performance correlation across a corpus.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::patterns::PatternMiner;
use crate::batch::MAX_REPORTED_ERRORS;
use crate::instance::Instance;

/// `(target role, pattern, model)` aggregation key.
type CountKey = (String, String, String);

/// Correlation pass configuration.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Roles whose targets are mined for patterns.
    pub target_roles: Vec<String>,
    /// Models whose predictions are checked per instance.
    pub models: Vec<String>,
    /// Keys covering fewer instances than this are dropped from the
    /// report. Defaults to 1, so every observed key materializes.
    pub min_support: u64,
    /// Pattern miner applied to each target.
    pub miner: PatternMiner,
}

impl CorrelatorConfig {
    /// Configure a pass over the given roles and models, with default
    /// mining and no support filtering.
    #[must_use]
    pub fn new(target_roles: Vec<String>, models: Vec<String>) -> Self {
        Self {
            target_roles,
            models,
            min_support: 1,
            miner: PatternMiner::default(),
        }
    }

    /// Set the minimum instance coverage a key needs to materialize.
    #[must_use]
    pub fn with_min_support(mut self, min_support: u64) -> Self {
        self.min_support = min_support;
        self
    }

    /// Replace the pattern miner.
    #[must_use]
    pub fn with_miner(mut self, miner: PatternMiner) -> Self {
        self.miner = miner;
        self
    }
}

/// One `(role, pattern, model)` aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticRecord {
    /// Target role the pattern was mined from.
    pub role: String,
    /// Generalized pattern string.
    pub pattern: String,
    /// Model the error statistics refer to.
    pub model: String,
    /// Instances whose target matches the pattern.
    pub cover: u64,
    /// Covered instances the model also mispredicted.
    pub err_cover: u64,
    /// `err_cover / cover`.
    pub err_rate: f64,
}

/// Pre-materialization accumulator of one correlation pass.
///
/// Partial passes over instance shards merge by summation, which is
/// commutative and associative, so the sharding does not affect the
/// final report.
#[derive(Debug, Clone, Default)]
pub struct PatternCounts {
    tallies: BTreeMap<CountKey, Tally>,
    processed: usize,
    skipped: usize,
    errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    cover: u64,
    err_cover: u64,
}

impl PatternCounts {
    /// Fold another shard's counts into this one.
    pub fn merge(&mut self, other: PatternCounts) {
        for (key, tally) in other.tallies {
            let entry = self.tallies.entry(key).or_default();
            entry.cover += tally.cover;
            entry.err_cover += tally.err_cover;
        }
        self.processed += other.processed;
        self.skipped += other.skipped;
        for message in other.errors {
            self.record_error(message);
        }
    }

    /// Instances counted so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Instances excluded by the skip policy.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn record_error(&mut self, message: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Final output of a correlation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationReport {
    /// Surviving records, sorted by `(role, pattern, model)`.
    pub records: Vec<LinguisticRecord>,
    /// Instances that contributed counts.
    pub processed: usize,
    /// Instances excluded by the skip policy.
    pub skipped: usize,
    /// First few error messages from skipped instances.
    pub errors: Vec<String>,
}

impl CorrelationReport {
    /// Look up one record by its aggregation key.
    #[must_use]
    pub fn record(&self, role: &str, pattern: &str, model: &str) -> Option<&LinguisticRecord> {
        self.records
            .binary_search_by(|r| {
                (r.role.as_str(), r.pattern.as_str(), r.model.as_str()).cmp(&(role, pattern, model))
            })
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Number of surviving records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing survived the pass.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregates, per target role, per pattern, per model, coverage and
/// error statistics across a corpus of instances.
///
/// Deterministic given identical instances and predictions; read-only
/// over its input, so shards may be counted in parallel and merged.
#[derive(Debug, Clone)]
pub struct PerformanceCorrelator {
    config: CorrelatorConfig,
}

impl PerformanceCorrelator {
    /// Create a correlator with the given configuration.
    #[must_use]
    pub fn new(config: CorrelatorConfig) -> Self {
        Self { config }
    }

    /// Count one shard of instances.
    ///
    /// Every configured model verdict and target role must resolve for
    /// an instance to contribute; otherwise the instance is logged with
    /// its qid, counted as skipped, and excluded entirely.
    #[must_use]
    pub fn count(&self, instances: &[Instance]) -> PatternCounts {
        let mut counts = PatternCounts::default();

        'instances: for instance in instances {
            let mut verdicts = Vec::with_capacity(self.config.models.len());
            for model in &self.config.models {
                match instance.is_incorrect(model) {
                    Ok(incorrect) => verdicts.push((model.as_str(), incorrect)),
                    Err(e) => {
                        warn!("skipping instance '{}': {e}", instance.qid());
                        counts.skipped += 1;
                        counts.record_error(format!("{}: {e}", instance.qid()));
                        continue 'instances;
                    }
                }
            }

            let mut mined = Vec::with_capacity(self.config.target_roles.len());
            for role in &self.config.target_roles {
                match instance.target(role) {
                    Ok(target) => mined.push((role.as_str(), self.config.miner.pattern_set(target))),
                    Err(e) => {
                        warn!("skipping instance '{}': {e}", instance.qid());
                        counts.skipped += 1;
                        counts.record_error(format!("{}: {e}", instance.qid()));
                        continue 'instances;
                    }
                }
            }

            for (role, patterns) in mined {
                for pattern in patterns {
                    for (model, incorrect) in &verdicts {
                        let tally = counts
                            .tallies
                            .entry((role.to_string(), pattern.clone(), (*model).to_string()))
                            .or_default();
                        tally.cover += 1;
                        if *incorrect {
                            tally.err_cover += 1;
                        }
                    }
                }
            }
            counts.processed += 1;
        }

        counts
    }

    /// Materialize counts into the final report.
    ///
    /// Keys below the configured minimum support are dropped; surviving
    /// keys get `err_rate = err_cover / cover`. Only keys with
    /// `cover >= 1` ever exist, so the division is safe.
    #[must_use]
    pub fn finalize(&self, counts: PatternCounts) -> CorrelationReport {
        let records: Vec<LinguisticRecord> = counts
            .tallies
            .into_iter()
            .filter(|(_, tally)| tally.cover >= self.config.min_support.max(1))
            .map(|((role, pattern, model), tally)| LinguisticRecord {
                role,
                pattern,
                model,
                cover: tally.cover,
                err_cover: tally.err_cover,
                err_rate: tally.err_cover as f64 / tally.cover as f64,
            })
            .collect();

        info!(
            "correlated {} records over {} instances ({} skipped)",
            records.len(),
            counts.processed,
            counts.skipped
        );

        CorrelationReport {
            records,
            processed: counts.processed,
            skipped: counts.skipped,
            errors: counts.errors,
        }
    }

    /// Full pass: count every instance, then materialize the report.
    #[must_use]
    pub fn compute(&self, instances: &[Instance]) -> CorrelationReport {
        self.finalize(self.count(instances))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Entry, GROUNDTRUTHS_ROLE, PREDICTIONS_ROLE};
    use crate::label::{Label, GROUNDTRUTH_MODEL};
    use crate::scoring::Accuracy;
    use crate::target::Target;
    use crate::token::{Pos, TextSpan, Token};
    use std::collections::{BTreeMap, HashMap};

    fn tok(text: &str, lemma: &str, pos: Pos, start: usize) -> Token {
        Token::new(text, lemma, pos, TextSpan::new(start, start + text.chars().count()))
    }

    /// Instance with a canned premise annotation and one scored "m1"
    /// prediction.
    fn nli_instance(qid: &str, tokens: Vec<Token>, text: &str, prediction: &str) -> Instance {
        let premise = Target::from_parts(qid, 0, "premise", text, tokens, HashMap::new());

        let gt_tok = vec![tok("neutral", "neutral", Pos::Adj, 0)];
        let gt_target = Target::from_parts(qid, 0, "label", "neutral", gt_tok, HashMap::new());
        let pred_tok = vec![tok(prediction, prediction, Pos::Adj, 0)];
        let pred_target =
            Target::from_parts(qid, 0, "label", prediction, pred_tok, HashMap::new());

        let gt = Label::from_target(gt_target, GROUNDTRUTH_MODEL);
        let mut pred = Label::from_target(pred_target, "m1");
        pred.score(&["neutral".to_string()], &Accuracy);

        Instance::create(
            qid,
            BTreeMap::from([
                ("premise".to_string(), Entry::Target(premise)),
                (GROUNDTRUTHS_ROLE.to_string(), Entry::Labels(vec![gt])),
                (PREDICTIONS_ROLE.to_string(), Entry::Labels(vec![pred])),
            ]),
        )
        .unwrap()
    }

    fn women_tokens() -> Vec<Token> {
        vec![
            tok("Two", "two", Pos::Num, 0),
            tok("women", "woman", Pos::Noun, 4),
            tok("are", "are", Pos::Aux, 10),
            tok("embracing", "embrace", Pos::Verb, 14),
        ]
    }

    fn men_tokens() -> Vec<Token> {
        vec![
            tok("Two", "two", Pos::Num, 0),
            tok("men", "man", Pos::Noun, 4),
            tok("are", "are", Pos::Aux, 8),
            tok("walking", "walk", Pos::Verb, 12),
        ]
    }

    fn dog_tokens() -> Vec<Token> {
        vec![
            tok("A", "a", Pos::Det, 0),
            tok("dog", "dog", Pos::Noun, 2),
            tok("runs", "run", Pos::Verb, 6),
        ]
    }

    fn corpus() -> Vec<Instance> {
        vec![
            // "NOUN are" present, m1 correct.
            nli_instance("q1", women_tokens(), "Two women are embracing", "neutral"),
            // "NOUN are" present, m1 wrong.
            nli_instance("q2", men_tokens(), "Two men are walking", "entailment"),
            // "NOUN are" absent, m1 correct.
            nli_instance("q3", dog_tokens(), "A dog runs", "neutral"),
        ]
    }

    fn config() -> CorrelatorConfig {
        CorrelatorConfig::new(vec!["premise".to_string()], vec!["m1".to_string()])
            .with_miner(PatternMiner::new(1, 2).unwrap())
    }

    #[test]
    fn test_cover_and_err_rate() {
        let correlator = PerformanceCorrelator::new(config());
        let report = correlator.compute(&corpus());

        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped, 0);

        let record = report.record("premise", "NOUN are", "m1").unwrap();
        assert_eq!(record.cover, 2);
        assert_eq!(record.err_cover, 1);
        assert!((record.err_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_support_filters() {
        let correlator = PerformanceCorrelator::new(config().with_min_support(2));
        let report = correlator.compute(&corpus());

        // "NOUN are" covers two instances and survives.
        assert!(report.record("premise", "NOUN are", "m1").is_some());
        // "dog" covers one and is dropped.
        assert!(report.record("premise", "dog", "m1").is_none());
    }

    #[test]
    fn test_missing_model_skips_whole_instance() {
        let mut instances = corpus();
        // q2 loses its predictions.
        let unpredicted = instances[1]
            .set_entries(BTreeMap::from([(
                PREDICTIONS_ROLE.to_string(),
                Entry::Labels(Vec::new()),
            )]))
            .unwrap();
        instances[1] = unpredicted;

        let correlator = PerformanceCorrelator::new(config());
        let report = correlator.compute(&instances);

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("q2:"));

        // q2 contributes nothing.
        let record = report.record("premise", "NOUN are", "m1").unwrap();
        assert_eq!(record.cover, 1);
        assert_eq!(record.err_cover, 0);
    }

    #[test]
    fn test_missing_role_skips_whole_instance() {
        let correlator = PerformanceCorrelator::new(CorrelatorConfig::new(
            vec!["hypothesis".to_string()],
            vec!["m1".to_string()],
        ));
        let report = correlator.compute(&corpus());

        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 3);
        assert!(report.is_empty());
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let instances = corpus();
        let correlator = PerformanceCorrelator::new(config());

        let single = correlator.compute(&instances);

        let mut left = correlator.count(&instances[..1]);
        let right = correlator.count(&instances[1..]);
        left.merge(right);
        let sharded = correlator.finalize(left);

        assert_eq!(single.records, sharded.records);
        assert_eq!(single.processed, sharded.processed);
        assert_eq!(single.skipped, sharded.skipped);
    }

    #[test]
    fn test_pattern_repeats_cover_once() {
        // "a dog saw a dog": the unigram "dog" occurs twice but covers
        // the instance once.
        let tokens = vec![
            tok("a", "a", Pos::Det, 0),
            tok("dog", "dog", Pos::Noun, 2),
            tok("saw", "see", Pos::Verb, 6),
            tok("a", "a", Pos::Det, 10),
            tok("dog", "dog", Pos::Noun, 12),
        ];
        let instance = nli_instance("q1", tokens, "a dog saw a dog", "neutral");

        let correlator = PerformanceCorrelator::new(
            CorrelatorConfig::new(vec!["premise".to_string()], vec!["m1".to_string()])
                .with_miner(PatternMiner::new(1, 1).unwrap()),
        );
        let report = correlator.compute(&[instance]);

        let record = report.record("premise", "dog", "m1").unwrap();
        assert_eq!(record.cover, 1);
    }

    #[test]
    fn test_report_sorted_for_determinism() {
        let correlator = PerformanceCorrelator::new(config());
        let report = correlator.compute(&corpus());

        let mut sorted = report.records.clone();
        sorted.sort_by(|a, b| {
            (&a.role, &a.pattern, &a.model).cmp(&(&b.role, &b.pattern, &b.model))
        });
        assert_eq!(report.records, sorted);
    }
}

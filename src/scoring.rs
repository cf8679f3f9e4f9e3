//! Task-specific scoring of predictions against groundtruths.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static ARTICLES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(a|an|the)\b").expect("ARTICLES regex is invalid"));

static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("PUNCT regex is invalid"));

/// Maps a predicted text and the groundtruth texts to metric scores.
///
/// Externally configured once per task. Every returned score must lie
/// in `[0, 1]`; [`crate::Label::score`] clamps defensively. The
/// designated primary metric decides correctness: a label is incorrect
/// iff its primary score is below 1.0.
pub trait Scorer: Send + Sync {
    /// Scorer name, for reports and registries.
    fn name(&self) -> &str;

    /// Metric consulted by [`crate::Label::is_incorrect`].
    fn primary_metric(&self) -> &str;

    /// Score `predicted` against the groundtruth texts.
    fn score(&self, predicted: &str, groundtruths: &[String]) -> HashMap<String, f64>;
}

/// Exact-string accuracy against any groundtruth.
///
/// The scorer for predefined-class tasks: `{"accuracy": 0 or 1}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Scorer for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn primary_metric(&self) -> &str {
        "accuracy"
    }

    fn score(&self, predicted: &str, groundtruths: &[String]) -> HashMap<String, f64> {
        let hit = groundtruths.iter().any(|gt| gt == predicted);
        let score = if hit { 1.0 } else { 0.0 };
        HashMap::from([("accuracy".to_string(), score)])
    }
}

/// SQuAD-style token-overlap F1 plus exact match, for span tasks.
///
/// Texts are normalized (lowercased, punctuation stripped, English
/// articles dropped, whitespace collapsed) before token comparison;
/// each metric takes the maximum over all groundtruths. Returns
/// `{"f1": x, "em": y}` with `f1` primary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanF1;

impl Scorer for SpanF1 {
    fn name(&self) -> &str {
        "span_f1"
    }

    fn primary_metric(&self) -> &str {
        "f1"
    }

    fn score(&self, predicted: &str, groundtruths: &[String]) -> HashMap<String, f64> {
        let predicted = normalize(predicted);
        let (mut best_f1, mut best_em) = (0.0f64, 0.0f64);
        for groundtruth in groundtruths {
            let groundtruth = normalize(groundtruth);
            best_f1 = best_f1.max(token_f1(&predicted, &groundtruth));
            if predicted == groundtruth {
                best_em = 1.0;
            }
        }
        HashMap::from([("f1".to_string(), best_f1), ("em".to_string(), best_em)])
    }
}

/// Lowercase, strip punctuation, drop articles, collapse whitespace.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct = PUNCT.replace_all(&lowered, "");
    let no_articles = ARTICLES.replace_all(&no_punct, " ");
    no_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_f1(predicted: &str, groundtruth: &str) -> f64 {
    let pred_tokens: Vec<&str> = predicted.split_whitespace().collect();
    let gt_tokens: Vec<&str> = groundtruth.split_whitespace().collect();
    if pred_tokens.is_empty() || gt_tokens.is_empty() {
        return if pred_tokens == gt_tokens { 1.0 } else { 0.0 };
    }

    let mut gt_counts: HashMap<&str, usize> = HashMap::new();
    for &token in &gt_tokens {
        *gt_counts.entry(token).or_default() += 1;
    }
    let mut overlap = 0usize;
    for &token in &pred_tokens {
        if let Some(count) = gt_counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return 0.0;
    }

    let precision = overlap as f64 / pred_tokens.len() as f64;
    let recall = overlap as f64 / gt_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_accuracy_exact_match() {
        let scores = Accuracy.score("neutral", &gts(&["neutral"]));
        assert_eq!(scores.get("accuracy"), Some(&1.0));

        let scores = Accuracy.score("entailment", &gts(&["neutral"]));
        assert_eq!(scores.get("accuracy"), Some(&0.0));
    }

    #[test]
    fn test_accuracy_any_groundtruth() {
        let scores = Accuracy.score("neutral", &gts(&["entailment", "neutral"]));
        assert_eq!(scores.get("accuracy"), Some(&1.0));

        let scores = Accuracy.score("neutral", &[]);
        assert_eq!(scores.get("accuracy"), Some(&0.0));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("The  Quick, Brown Fox!"), "quick brown fox");
        assert_eq!(normalize("an answer"), "answer");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_span_f1_exact() {
        let scores = SpanF1.score("the quick fox", &gts(&["quick fox"]));
        assert_eq!(scores.get("f1"), Some(&1.0));
        assert_eq!(scores.get("em"), Some(&1.0));
    }

    #[test]
    fn test_span_f1_partial_overlap() {
        let scores = SpanF1.score("quick fox", &gts(&["quick dog"]));
        // One of two tokens overlaps: p = r = 0.5.
        assert!((scores["f1"] - 0.5).abs() < 1e-9);
        assert_eq!(scores.get("em"), Some(&0.0));
    }

    #[test]
    fn test_span_f1_max_over_groundtruths() {
        let scores = SpanF1.score("quick fox", &gts(&["slow dog", "quick fox"]));
        assert_eq!(scores.get("f1"), Some(&1.0));
        assert_eq!(scores.get("em"), Some(&1.0));
    }

    #[test]
    fn test_span_f1_no_overlap() {
        let scores = SpanF1.score("cat", &gts(&["dog"]));
        assert_eq!(scores.get("f1"), Some(&0.0));
    }

    #[test]
    fn test_span_f1_repeated_tokens_use_multiset_overlap() {
        // "dog dog" vs "dog": one shared occurrence, p=0.5, r=1.
        let scores = SpanF1.score("dog dog", &gts(&["dog"]));
        let expected = 2.0 * 0.5 * 1.0 / 1.5;
        assert!((scores["f1"] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_span_f1_empty_groundtruths() {
        let scores = SpanF1.score("anything", &[]);
        assert_eq!(scores.get("f1"), Some(&0.0));
        assert_eq!(scores.get("em"), Some(&0.0));
    }
}

//! Pattern mining and performance correlation.
//!
//! # Overview
//!
//! This module turns a corpus of registered instances into the
//! linguistic-performance records an analyst reads:
//!
//! - [`patterns`]: mines generalized lemma/POS patterns from one
//!   target's token sequence.
//! - [`correlate`]: aggregates, per target role, per pattern, per model,
//!   coverage and error-rate statistics across a corpus.
//! - [`vocab`]: token-surface frequency counts for rare-word flagging.
//!
//! # Example
//!
//! ```rust
//! use errata::{CorrelatorConfig, PatternMiner, PerformanceCorrelator};
//!
//! let config = CorrelatorConfig::new(vec!["premise".into()], vec!["m1".into()])
//!     .with_min_support(2)
//!     .with_miner(PatternMiner::default());
//! let correlator = PerformanceCorrelator::new(config);
//! let report = correlator.compute(&[]);
//! assert!(report.records.is_empty());
//! ```
//!
//! Both mining and correlation are read-only over instance snapshots
//! and deterministic given identical inputs. Sharded correlation passes
//! merge by summation ([`correlate::PatternCounts::merge`]), so the
//! split does not affect the result.

pub mod correlate;
pub mod patterns;
pub mod vocab;

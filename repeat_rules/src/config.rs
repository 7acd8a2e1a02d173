//! Experiment configuration.
//!
//! Every tunable value lives here with its default. Ranges are checked by
//! the `validate` methods before any mining or training starts.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Protein, ResampleStrategy};

/// Sentinel used for empty positional slots.
pub const PAD: char = '_';

/// Tolerance used when checking that split sizes add up to one.
pub const SPLIT_EPS: f64 = 1e-5;

/// Columns of the raw repeat table that carry no signal for the models.
pub const DEFAULT_COLUMNS_TO_DROP: [&str; 6] = [
    "left_end",
    "right_end",
    "left_start",
    "right_start",
    "sequence_id",
    "length",
];

/// Thresholds of the rule miner and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    pub max_aa_length: usize,
    pub min_confidence: f64,
    pub min_lift: f64,
    pub min_support: f64,
    pub min_antecedents: usize,
    /// Upper bound on the mined itemset, consequent included. Rules therefore
    /// have at most `max_antecedents - 1` antecedent items.
    pub max_antecedents: usize,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            max_aa_length: 7,
            min_confidence: 0.7,
            min_lift: 1.3,
            min_support: 0.001,
            min_antecedents: 2,
            max_antecedents: 6,
        }
    }
}

impl RuleParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_aa_length >= 1,
            "max_aa_length must be at least 1, got {}",
            self.max_aa_length
        );
        ensure!(
            self.min_support > 0.0 && self.min_support < 1.0,
            "min_support must be in (0, 1), got {}",
            self.min_support
        );
        ensure!(
            (0.0..=1.0).contains(&self.min_confidence),
            "min_confidence must be in [0, 1], got {}",
            self.min_confidence
        );
        ensure!(self.min_lift >= 0.0, "min_lift must be >= 0, got {}", self.min_lift);
        ensure!(
            self.min_antecedents >= 1,
            "min_antecedents must be >= 1, got {}",
            self.min_antecedents
        );
        ensure!(
            self.max_antecedents >= self.min_antecedents,
            "max_antecedents ({}) must be >= min_antecedents ({})",
            self.max_antecedents,
            self.min_antecedents
        );
        if self.max_antecedents == self.min_antecedents {
            warn!(
                "max_antecedents ({}) also counts the consequent, no rule can have {} antecedents",
                self.max_antecedents, self.min_antecedents
            );
        }
        Ok(())
    }
}

/// Boundaries of the three length buckets. They do not follow `max_aa_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthBuckets {
    pub short_max: usize,
    pub medium_max: usize,
    pub long_max: usize,
}

impl Default for LengthBuckets {
    fn default() -> Self {
        Self { short_max: 3, medium_max: 5, long_max: 7 }
    }
}

impl LengthBuckets {
    /// Bucket label for a true repeat length, e.g. `<=3`, `4-5`, `6-7`.
    pub fn label(&self, len: usize) -> String {
        if len <= self.short_max {
            format!("<={}", self.short_max)
        } else if len <= self.medium_max {
            format!("{}-{}", self.short_max + 1, self.medium_max)
        } else {
            format!("{}-{}", self.medium_max + 1, self.long_max)
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.short_max < self.medium_max && self.medium_max < self.long_max,
            "length buckets must be increasing, got {} / {} / {}",
            self.short_max,
            self.medium_max,
            self.long_max
        );
        Ok(())
    }
}

/// Feature switches of the basket builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    pub include_repeat_type: bool,
    pub ngram_size: usize,
    pub length_buckets: LengthBuckets,
    pub pad: char,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            include_repeat_type: true,
            ngram_size: 2,
            length_buckets: LengthBuckets::default(),
            pad: PAD,
        }
    }
}

impl BasketConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.ngram_size >= 1, "ngram_size must be at least 1");
        self.length_buckets.validate()
    }
}

/// Train / validation / test fractions, any of which may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSizes {
    pub train: Option<f64>,
    pub valid: Option<f64>,
    pub test: Option<f64>,
}

/// Fully resolved split fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSplit {
    pub train: f64,
    pub valid: f64,
    pub test: f64,
}

fn snap(v: f64) -> f64 {
    if v.abs() > SPLIT_EPS { v } else { 0.0 }
}

impl SplitSizes {
    pub fn new(train: Option<f64>, valid: Option<f64>, test: Option<f64>) -> Self {
        Self { train, valid, test }
    }

    /// Fill in missing fractions. A zero counts as "not given".
    pub fn resolve(&self) -> Result<ResolvedSplit> {
        let given = |v: Option<f64>| v.filter(|x| *x != 0.0);
        let (train, valid, test) = match (given(self.train), given(self.valid), given(self.test)) {
            (None, None, None) => (0.7, 0.2, 0.1),
            (None, None, Some(te)) => (7.0 / 9.0 * (1.0 - te), 2.0 / 9.0 * (1.0 - te), te),
            (None, Some(va), None) => (7.0 / 8.0 * (1.0 - va), va, 1.0 / 8.0 * (1.0 - va)),
            (Some(tr), None, None) => (tr, 2.0 / 3.0 * (1.0 - tr), 1.0 / 3.0 * (1.0 - tr)),
            (None, Some(va), Some(te)) => (snap(1.0 - va - te), va, te),
            (Some(tr), None, Some(te)) => (tr, snap(1.0 - tr - te), te),
            (Some(tr), Some(va), None) => (tr, va, snap(1.0 - tr - va)),
            (Some(tr), Some(va), Some(te)) => {
                if (tr + va + te - 1.0).abs() > SPLIT_EPS {
                    bail!("split sizes must add up to 1, got {}", tr + va + te);
                }
                (tr, va, te)
            }
        };

        for (name, v) in [("train", train), ("valid", valid), ("test", test)] {
            ensure!(v >= 0.0, "{name} split size must not be negative, got {v}");
        }
        if (train + valid + test - 1.0).abs() > SPLIT_EPS {
            bail!("split sizes must add up to 1, got {}", train + valid + test);
        }

        Ok(ResolvedSplit { train, valid, test })
    }
}

/// Input table and column policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,
    pub columns_to_drop: Vec<String>,
    pub protein: Option<Protein>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("proteins/data/virus_protein_repeats.csv"),
            columns_to_drop: DEFAULT_COLUMNS_TO_DROP.iter().map(|s| s.to_string()).collect(),
            protein: None,
        }
    }
}

/// Candidate values searched by `grid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleGrid {
    pub max_aa_length: Vec<usize>,
    pub min_confidence: Vec<f64>,
    pub min_lift: Vec<f64>,
    pub min_support: Vec<f64>,
    pub min_antecedents: Vec<usize>,
    pub max_antecedents: Vec<usize>,
}

impl Default for RuleGrid {
    fn default() -> Self {
        Self {
            max_aa_length: vec![5, 6, 7],
            min_confidence: vec![0.6, 0.7],
            min_lift: vec![1.3],
            min_support: vec![0.001],
            min_antecedents: vec![1, 2],
            max_antecedents: vec![6],
        }
    }
}

impl RuleGrid {
    /// Cartesian product in declaration order. Combinations that fail
    /// validation are skipped.
    pub fn combinations(&self) -> Vec<RuleParams> {
        let mut out = Vec::new();
        for &max_aa_length in &self.max_aa_length {
            for &min_confidence in &self.min_confidence {
                for &min_lift in &self.min_lift {
                    for &min_support in &self.min_support {
                        for &min_antecedents in &self.min_antecedents {
                            for &max_antecedents in &self.max_antecedents {
                                let params = RuleParams {
                                    max_aa_length,
                                    min_confidence,
                                    min_lift,
                                    min_support,
                                    min_antecedents,
                                    max_antecedents,
                                };
                                if params.validate().is_ok() {
                                    out.push(params);
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Top-level experiment configuration, usually read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub split: SplitSizes,
    pub seed: u64,
    pub basket: BasketConfig,
    pub rules: RuleParams,
    pub resample: ResampleStrategy,
    pub grid: RuleGrid,
    pub results_folder: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitSizes::new(Some(0.8), Some(0.0), Some(0.2)),
            seed: 561,
            basket: BasketConfig::default(),
            rules: RuleParams::default(),
            resample: ResampleStrategy::None,
            grid: RuleGrid::default(),
            results_folder: PathBuf::from("results"),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let cfg: ExperimentConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Columns the models rely on and which therefore must never be dropped.
    ///
    /// The repeat columns are not listed: dropping `left_repeat` is how the
    /// right repeat is selected, and dropping both is caught when the repeat
    /// column is normalised.
    pub fn reserved_columns(&self) -> Vec<&'static str> {
        let mut reserved = vec!["virus_name"];
        if self.basket.include_repeat_type {
            reserved.push("repeat_type");
        }
        reserved
    }

    pub fn validate(&self) -> Result<()> {
        self.split.resolve()?;
        self.basket.validate()?;
        self.rules.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(RuleParams::default().validate().is_ok());
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        let bad_support = RuleParams { min_support: 1.0, ..Default::default() };
        let err = bad_support.validate().unwrap_err().to_string();
        assert!(err.contains("min_support"), "{err}");

        let bad_conf = RuleParams { min_confidence: 1.5, ..Default::default() };
        assert!(bad_conf.validate().is_err());

        let bad_lift = RuleParams { min_lift: -0.1, ..Default::default() };
        assert!(bad_lift.validate().is_err());

        let bad_ante = RuleParams { min_antecedents: 0, ..Default::default() };
        assert!(bad_ante.validate().is_err());

        let bad_max = RuleParams { min_antecedents: 3, max_antecedents: 2, ..Default::default() };
        assert!(bad_max.validate().is_err());
    }

    #[test]
    fn only_the_label_and_used_type_are_reserved() {
        let mut cfg = ExperimentConfig::default();
        assert_eq!(cfg.reserved_columns(), vec!["virus_name", "repeat_type"]);
        cfg.basket.include_repeat_type = false;
        assert_eq!(cfg.reserved_columns(), vec!["virus_name"]);
    }

    #[test]
    fn equal_antecedent_bounds_are_still_valid() {
        let params = RuleParams { min_antecedents: 3, max_antecedents: 3, ..Default::default() };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn length_bucket_labels() {
        let b = LengthBuckets::default();
        assert_eq!(b.label(0), "<=3");
        assert_eq!(b.label(3), "<=3");
        assert_eq!(b.label(4), "4-5");
        assert_eq!(b.label(5), "4-5");
        assert_eq!(b.label(6), "6-7");
        assert_eq!(b.label(7), "6-7");
    }

    #[test]
    fn missing_split_sizes_are_filled_in() {
        let r = SplitSizes::default().resolve().unwrap();
        assert_eq!((r.train, r.valid, r.test), (0.7, 0.2, 0.1));

        let r = SplitSizes::new(None, None, Some(0.1)).resolve().unwrap();
        assert!((r.train - 0.7).abs() < 1e-9);
        assert!((r.valid - 0.2).abs() < 1e-9);

        let r = SplitSizes::new(Some(0.8), Some(0.0), Some(0.2)).resolve().unwrap();
        assert_eq!(r.valid, 0.0);
    }

    #[test]
    fn split_sizes_must_sum_to_one() {
        let err = SplitSizes::new(Some(0.5), Some(0.3), Some(0.3)).resolve().unwrap_err();
        assert!(err.to_string().contains("split sizes must add up to 1"));

        assert!(SplitSizes::new(Some(0.9), None, Some(0.3)).resolve().is_err());
    }

    #[test]
    fn grid_skips_invalid_combinations() {
        let grid = RuleGrid {
            max_aa_length: vec![7],
            min_confidence: vec![0.5],
            min_lift: vec![1.0],
            min_support: vec![0.01],
            min_antecedents: vec![1, 3],
            max_antecedents: vec![2],
        };
        let combos = grid.combinations();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].min_antecedents, 1);
    }

    #[test]
    fn config_json_uses_defaults_for_missing_fields() {
        let json = r#"{"seed": 7, "rules": {"min_lift": 1.0}, "resample": "under"}"#;
        let cfg: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.rules.min_lift, 1.0);
        assert_eq!(cfg.rules.min_confidence, 0.7);
        assert_eq!(cfg.resample, ResampleStrategy::Under);
        assert!(cfg.basket.include_repeat_type);
    }
}

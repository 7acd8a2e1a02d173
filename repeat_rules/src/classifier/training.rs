use std::collections::BTreeSet;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::metrics::Metrics;
use crate::classifier::inference::{majority_label, RuleClassifier};
use crate::config::{BasketConfig, RuleParams};
use crate::features::basket::BasketBuilder;
use crate::features::transactions::TransactionEncoder;
use crate::mining::rules::mine_rules;
use crate::models::RepeatRecord;

/// Trained rule classifier together with everything needed to rebuild its
/// baskets at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleModel {
    pub params: RuleParams,
    pub basket: BasketConfig,
    /// Sorted virus labels seen during training.
    pub labels: Vec<String>,
    pub classifier: RuleClassifier,
}

/// Predictions of one evaluation pass, aligned with the input records.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub predictions: Vec<String>,
    /// `None` when the evaluated set was empty.
    pub metrics: Option<Metrics>,
}

/// Mine the rule table on `train` and attach the majority fallback label.
///
/// Parameters are checked before any basket is built. An empty rule table is
/// a valid result.
pub fn train_rule_classifier(
    train: &[RepeatRecord],
    params: &RuleParams,
    basket: &BasketConfig,
) -> Result<RuleModel> {
    params.validate()?;
    basket.validate()?;
    ensure!(!train.is_empty(), "cannot train a rule classifier on an empty training set");

    let builder = BasketBuilder::new(params.max_aa_length, basket.clone());
    let baskets = builder.build_all(train, true);
    let (encoder, transactions) = TransactionEncoder::fit_transform(&baskets)?;
    debug!("Transaction table: {} rows x {} items", transactions.height(), encoder.columns().len());

    let rules = mine_rules(&transactions, params)?;
    let majority = majority_label(train).context("no majority label in training set")?;
    let labels: BTreeSet<String> = train.iter().map(|r| r.virus_name.clone()).collect();

    info!(
        "Trained rule classifier: {} rules, majority label {} ({} classes)",
        rules.len(),
        majority,
        labels.len()
    );

    Ok(RuleModel {
        params: params.clone(),
        basket: basket.clone(),
        labels: labels.into_iter().collect(),
        classifier: RuleClassifier::new(rules, majority),
    })
}

impl RuleModel {
    pub fn builder(&self) -> BasketBuilder {
        BasketBuilder::new(self.params.max_aa_length, self.basket.clone())
    }

    /// Predicted virus per record, in input order. The label is never part of
    /// the query baskets.
    pub fn predict_records(&self, records: &[RepeatRecord]) -> Vec<String> {
        let baskets = self.builder().build_all(records, false);
        self.classifier.predict_batch(&baskets)
    }

    /// Predict `records` and score the predictions against their labels.
    pub fn evaluate(&self, records: &[RepeatRecord]) -> Result<Evaluation> {
        let predictions = self.predict_records(records);
        let truth: Vec<&str> = records.iter().map(|r| r.virus_name.as_str()).collect();

        let labels: Vec<String> = self
            .labels
            .iter()
            .cloned()
            .chain(truth.iter().map(|s| s.to_string()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let predicted: Vec<&str> = predictions.iter().map(String::as_str).collect();
        let metrics = Metrics::compute(&truth, &predicted, Some(labels.as_slice()))?;
        Ok(Evaluation { predictions, metrics })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("writing model to {}", path.display()))?;
        info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening model {}", path.display()))?;
        let model: RuleModel = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing model {}", path.display()))?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<RepeatRecord> {
        vec![
            RepeatRecord::new("AN", "in", "BCOV"),
            RepeatRecord::new("AN", "in", "BCOV"),
            RepeatRecord::new("QR", "dn", "MERS"),
        ]
    }

    fn params() -> RuleParams {
        RuleParams {
            max_aa_length: 2,
            min_support: 0.1,
            min_confidence: 0.5,
            min_lift: 1.0,
            min_antecedents: 1,
            max_antecedents: 4,
        }
    }

    #[test]
    fn trained_model_recovers_training_labels() {
        let data = records();
        let model = train_rule_classifier(&data, &params(), &BasketConfig::default()).unwrap();
        assert_eq!(model.classifier.majority(), "BCOV");
        assert_eq!(model.labels, vec!["BCOV".to_string(), "MERS".to_string()]);

        let eval = model.evaluate(&data).unwrap();
        assert_eq!(eval.predictions, vec!["BCOV", "BCOV", "MERS"]);
        let m = eval.metrics.unwrap();
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn empty_evaluation_set_has_no_metrics() {
        let model = train_rule_classifier(&records(), &params(), &BasketConfig::default()).unwrap();
        let eval = model.evaluate(&[]).unwrap();
        assert!(eval.predictions.is_empty());
        assert!(eval.metrics.is_none());
    }

    #[test]
    fn invalid_params_fail_before_training() {
        let bad = RuleParams { min_support: 0.0, ..params() };
        assert!(train_rule_classifier(&records(), &bad, &BasketConfig::default()).is_err());
        assert!(train_rule_classifier(&[], &params(), &BasketConfig::default()).is_err());
    }

    #[test]
    fn antecedents_stay_below_the_itemset_bound() {
        let capped = RuleParams { min_antecedents: 2, max_antecedents: 2, ..params() };
        let model = train_rule_classifier(&records(), &capped, &BasketConfig::default()).unwrap();
        assert!(model.classifier.rules().is_empty());

        let model = train_rule_classifier(&records(), &params(), &BasketConfig::default()).unwrap();
        assert!(model.classifier.rules().iter().all(|r| r.antecedent_len <= 3));
    }

    #[test]
    fn model_survives_json_round_trip() {
        let model = train_rule_classifier(&records(), &params(), &BasketConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        let loaded = RuleModel::load(&path).unwrap();
        assert_eq!(loaded.classifier.rules().len(), model.classifier.rules().len());
        assert_eq!(loaded.predict_records(&records()), model.predict_records(&records()));
    }
}

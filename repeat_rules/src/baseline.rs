//! Multinomial logistic regression on positional or ProtVec features, used
//! as a reference point for the rule classifier.

use std::collections::BTreeSet;

use anyhow::{anyhow, ensure, Result};
use linfa::prelude::*;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::metrics::Metrics;
use crate::features::embeddings::ProtVecTable;
use crate::features::onehot::positional_one_hot;
use crate::features::positional::PositionalEncoder;
use crate::models::RepeatRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Positional,
    Protvec,
}

/// Feature extractor of the baseline.
pub enum Featurizer<'a> {
    Positional(PositionalEncoder),
    ProtVec(&'a ProtVecTable),
}

impl Featurizer<'_> {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Featurizer::Positional(_) => FeatureKind::Positional,
            Featurizer::ProtVec(_) => FeatureKind::Protvec,
        }
    }

    pub fn transform(&self, records: &[RepeatRecord]) -> Result<Array2<f64>> {
        let repeats: Vec<&str> = records.iter().map(|r| r.repeat.as_str()).collect();
        match self {
            Featurizer::Positional(encoder) => positional_one_hot(encoder, &repeats),
            Featurizer::ProtVec(table) => Ok(table.encode_all(&repeats)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineParams {
    pub alpha: f64,
    pub max_iterations: u64,
}

impl Default for BaselineParams {
    fn default() -> Self {
        Self { alpha: 1.0, max_iterations: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineReport {
    pub features: FeatureKind,
    pub n_features: usize,
    pub train: Option<Metrics>,
    pub test: Option<Metrics>,
}

/// Fit on `train`, score on both splits.
pub fn train_logistic_baseline(
    train: &[RepeatRecord],
    test: &[RepeatRecord],
    featurizer: &Featurizer<'_>,
    params: &BaselineParams,
) -> Result<BaselineReport> {
    let labels: Vec<String> = train
        .iter()
        .chain(test)
        .map(|r| r.virus_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let train_classes: BTreeSet<&str> = train.iter().map(|r| r.virus_name.as_str()).collect();
    ensure!(
        train_classes.len() >= 2,
        "logistic baseline needs at least 2 classes in the training split, got {}",
        train_classes.len()
    );

    let encode = |records: &[RepeatRecord]| -> Result<Array1<usize>> {
        records
            .iter()
            .map(|r| {
                labels
                    .iter()
                    .position(|l| *l == r.virus_name)
                    .ok_or_else(|| anyhow!("unknown label '{}'", r.virus_name))
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from)
    };

    let x_train = featurizer.transform(train)?;
    let y_train = encode(train)?;
    info!(
        "Fitting logistic baseline on {} rows x {} {:?} features",
        x_train.nrows(),
        x_train.ncols(),
        featurizer.kind()
    );

    let model = MultiLogisticRegression::default()
        .max_iterations(params.max_iterations)
        .alpha(params.alpha)
        .fit(&Dataset::new(x_train.clone(), y_train.clone()))
        .map_err(|e| anyhow!("logistic regression failed: {}", e))?;

    let score = |x: &Array2<f64>, y: &Array1<usize>| -> Result<Option<Metrics>> {
        if x.nrows() == 0 {
            return Ok(None);
        }
        let predicted: Vec<&str> = model.predict(x).iter().map(|&i| labels[i].as_str()).collect();
        let truth: Vec<&str> = y.iter().map(|&i| labels[i].as_str()).collect();
        Metrics::compute(&truth, &predicted, Some(labels.as_slice()))
    };

    let train_metrics = score(&x_train, &y_train)?;
    let x_test = featurizer.transform(test)?;
    let test_metrics = score(&x_test, &encode(test)?)?;

    if let Some(m) = &test_metrics {
        info!("Logistic baseline test: {}", m);
    }

    Ok(BaselineReport {
        features: featurizer.kind(),
        n_features: x_train.ncols(),
        train: train_metrics,
        test: test_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAD;

    fn records() -> Vec<RepeatRecord> {
        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(RepeatRecord::new("AAN", "in", "BCOV"));
            out.push(RepeatRecord::new("QRR", "dn", "MERS"));
        }
        out
    }

    #[test]
    fn separable_classes_are_learned() {
        let data = records();
        let featurizer = Featurizer::Positional(PositionalEncoder::new(3, PAD));
        let params = BaselineParams::default();
        let report = train_logistic_baseline(&data, &data[..4], &featurizer, &params).unwrap();
        assert_eq!(report.n_features, 63);
        assert_eq!(report.train.unwrap().accuracy, 1.0);
        assert_eq!(report.test.unwrap().accuracy, 1.0);
    }

    #[test]
    fn protvec_features_use_the_table_dimension() {
        let table = ProtVecTable::from_entries(vec![
            ("AAN".to_string(), vec![1.0, 0.0]),
            ("QRR".to_string(), vec![0.0, 1.0]),
        ])
        .unwrap();
        let featurizer = Featurizer::ProtVec(&table);
        let params = BaselineParams::default();
        let report = train_logistic_baseline(&records(), &[], &featurizer, &params).unwrap();
        assert_eq!(report.n_features, 2);
        assert!(report.test.is_none());
    }

    #[test]
    fn single_class_is_rejected() {
        let data = vec![RepeatRecord::new("AN", "in", "BCOV"); 3];
        let featurizer = Featurizer::Positional(PositionalEncoder::new(2, PAD));
        let params = BaselineParams::default();
        assert!(train_logistic_baseline(&data, &[], &featurizer, &params).is_err());
    }
}

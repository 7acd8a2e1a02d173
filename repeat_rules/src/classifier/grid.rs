use anyhow::{bail, ensure, Result};
use polars::prelude::*;
use tracing::{info, warn};

use crate::classifier::training::{train_rule_classifier, RuleModel};
use crate::config::{BasketConfig, RuleGrid, RuleParams};
use crate::models::RepeatRecord;

/// Validation score of one parameter combination.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub params: RuleParams,
    pub n_rules: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone)]
pub struct GridResult {
    pub best_params: RuleParams,
    pub best_model: RuleModel,
    /// Sorted by F1, best first.
    pub leaderboard: Vec<LeaderboardRow>,
}

/// Try every combination of `grid` and keep the one with the best weighted
/// F1 on `valid`. Only a strictly better score replaces the current best.
pub fn grid_search(
    train: &[RepeatRecord],
    valid: &[RepeatRecord],
    grid: &RuleGrid,
    basket: &BasketConfig,
) -> Result<GridResult> {
    ensure!(!valid.is_empty(), "grid search needs a non-empty validation split");
    let combinations = grid.combinations();
    if combinations.is_empty() {
        bail!("rule grid has no valid parameter combination");
    }
    info!("Grid search over {} parameter combinations", combinations.len());

    let mut leaderboard = Vec::with_capacity(combinations.len());
    let mut best: Option<(f64, RuleModel)> = None;

    for (i, params) in combinations.into_iter().enumerate() {
        let model = train_rule_classifier(train, &params, basket)?;
        let Some(metrics) = model.evaluate(valid)?.metrics else {
            warn!("Combination {} produced no validation metrics, skipping", i + 1);
            continue;
        };
        info!("[{}] {:?} -> {}", i + 1, params, metrics);

        leaderboard.push(LeaderboardRow {
            params: params.clone(),
            n_rules: model.classifier.rules().len(),
            accuracy: metrics.accuracy,
            precision: metrics.precision,
            recall: metrics.recall,
            f1: metrics.f1,
        });

        let improves = match &best {
            Some((f1, _)) => metrics.f1 > *f1,
            None => true,
        };
        if improves {
            best = Some((metrics.f1, model));
        }
    }

    let Some((best_f1, best_model)) = best else {
        bail!("grid search produced no scored combination");
    };
    leaderboard.sort_by(|a, b| b.f1.total_cmp(&a.f1));
    info!("Best validation F1 {:.4} with {:?}", best_f1, best_model.params);

    Ok(GridResult {
        best_params: best_model.params.clone(),
        best_model,
        leaderboard,
    })
}

/// Leaderboard as a frame, one column per parameter and score.
pub fn leaderboard_frame(rows: &[LeaderboardRow]) -> Result<DataFrame> {
    let usize_col = |name: &str, f: fn(&LeaderboardRow) -> usize| {
        let values: Vec<u64> = rows.iter().map(|r| f(r) as u64).collect();
        Column::from(Series::new(name.into(), values))
    };
    let f64_col = |name: &str, f: fn(&LeaderboardRow) -> f64| {
        Column::from(Series::new(name.into(), rows.iter().map(f).collect::<Vec<f64>>()))
    };

    Ok(DataFrame::new(vec![
        usize_col("max_aa_length", |r| r.params.max_aa_length),
        f64_col("min_confidence", |r| r.params.min_confidence),
        f64_col("min_lift", |r| r.params.min_lift),
        f64_col("min_support", |r| r.params.min_support),
        usize_col("min_antecedents", |r| r.params.min_antecedents),
        usize_col("max_antecedents", |r| r.params.max_antecedents),
        usize_col("n_rules", |r| r.n_rules),
        f64_col("accuracy", |r| r.accuracy),
        f64_col("precision", |r| r.precision),
        f64_col("recall", |r| r.recall),
        f64_col("f1", |r| r.f1),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<RepeatRecord> {
        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(RepeatRecord::new("AN", "in", "BCOV"));
            out.push(RepeatRecord::new("QR", "dn", "MERS"));
        }
        out.push(RepeatRecord::new("KL", "in", "BCOV"));
        out
    }

    fn grid() -> RuleGrid {
        RuleGrid {
            max_aa_length: vec![2, 3],
            min_confidence: vec![0.5, 0.9],
            min_lift: vec![1.0],
            min_support: vec![0.1],
            min_antecedents: vec![1],
            max_antecedents: vec![3],
        }
    }

    #[test]
    fn leaderboard_is_sorted_and_complete() {
        let data = records();
        let result = grid_search(&data, &data, &grid(), &BasketConfig::default()).unwrap();
        assert_eq!(result.leaderboard.len(), 4);
        for pair in result.leaderboard.windows(2) {
            assert!(pair[0].f1 >= pair[1].f1);
        }
        assert_eq!(result.leaderboard[0].f1, 1.0);
        assert_eq!(result.best_params, result.best_model.params);

        let df = leaderboard_frame(&result.leaderboard).unwrap();
        assert_eq!(df.height(), 4);
        assert!(df.column("f1").is_ok());
    }

    #[test]
    fn first_of_equal_scores_is_kept() {
        let data = records();
        let result = grid_search(&data, &data, &grid(), &BasketConfig::default()).unwrap();
        // every combination separates the two viruses perfectly
        assert_eq!(result.best_params, grid().combinations()[0]);
    }

    #[test]
    fn empty_validation_split_is_an_error() {
        let data = records();
        let err = grid_search(&data, &[], &grid(), &BasketConfig::default()).unwrap_err();
        assert!(err.to_string().contains("validation"));
    }
}

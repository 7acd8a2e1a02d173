//! Command pipelines behind the `repeat-rules` subcommands.

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use serde_json::json;
use tracing::{info, warn};

use crate::analysis::metrics::Metrics;
use crate::analysis::report::log_training;
use crate::baseline::{train_logistic_baseline, BaselineParams, FeatureKind, Featurizer};
use crate::classifier::grid::grid_search;
use crate::classifier::training::{train_rule_classifier, RuleModel};
use crate::cli::{BaselineArgs, GridArgs, PredictArgs, TrainArgs};
use crate::config::ExperimentConfig;
use crate::data_handling::rebalance::rebalance;
use crate::data_handling::repeats_dataset::{
    prepare_repeats, query_records, records_from_frame, select_protein, split_into_proteins,
    RepeatsDataset,
};
use crate::data_handling::split::{split_records, Splits};
use crate::data_handling::Dataset;
use crate::features::embeddings::ProtVecTable;
use crate::features::positional::PositionalEncoder;
use crate::helper_functions::{dataframe_to_csv, read_csv, resolve_path};
use crate::mining::rules::rules_frame;
use crate::models::{Protein, RepeatRecord};

fn read_repeats(cfg: &ExperimentConfig) -> Result<DataFrame> {
    RepeatsDataset { path: resolve_path(&cfg.data.path) }.load()
}

fn prepared_records(
    cfg: &ExperimentConfig,
    df: DataFrame,
    source: &str,
) -> Result<Vec<RepeatRecord>> {
    let df = prepare_repeats(df, &cfg.data.columns_to_drop, &cfg.reserved_columns())?;
    let records = records_from_frame(&df, cfg.basket.pad)?;
    if records.is_empty() {
        bail!("no repeat records in {}", source);
    }
    Ok(records)
}

/// Load, prepare and (optionally) restrict the repeat table to one protein.
pub fn load_records(cfg: &ExperimentConfig) -> Result<Vec<RepeatRecord>> {
    let mut df = read_repeats(cfg)?;
    if let Some(protein) = cfg.data.protein {
        df = select_protein(&df, protein)?;
    }
    prepared_records(cfg, df, &cfg.data.path.display().to_string())
}

/// One prepared record set per protein family, spike first.
pub fn load_protein_records(cfg: &ExperimentConfig) -> Result<Vec<(Protein, Vec<RepeatRecord>)>> {
    let (spike, nucleocapsid) = split_into_proteins(&read_repeats(cfg)?)?;
    [(Protein::Spike, spike), (Protein::Nucleocapsid, nucleocapsid)]
        .into_iter()
        .map(|(protein, df)| {
            let source = format!("{} rows of {}", protein, cfg.data.path.display());
            Ok((protein, prepared_records(cfg, df, &source)?))
        })
        .collect()
}

/// Split the records and rebalance the training part.
pub fn prepare_splits(cfg: &ExperimentConfig, records: &[RepeatRecord]) -> Result<Splits> {
    let mut splits = split_records(records, &cfg.split, cfg.seed)?;
    splits.train = rebalance(&splits.train, cfg.resample, cfg.seed);
    Ok(splits)
}

fn save_model_outputs(model: &RuleModel, run_dir: &std::path::Path) -> Result<()> {
    let mut rules = rules_frame(model.classifier.rules())?;
    dataframe_to_csv(&mut rules, &run_dir.join("rules.csv"), true)?;
    model.save(&run_dir.join("model.json"))
}

fn print_summary(title: &str, passes: &[(&str, Option<&Metrics>)]) {
    println!("{title}");
    for (pass, m) in passes {
        match m {
            Some(m) => println!("  {pass:<6} {m}"),
            None => println!("  {pass:<6} (empty)"),
        }
    }
}

pub fn run_train(args: &TrainArgs) -> Result<()> {
    let mut cfg = args.experiment.load_config()?;
    args.rules.apply(&mut cfg.rules);
    cfg.validate()?;

    if !args.per_protein {
        let records = load_records(&cfg)?;
        return train_and_log(&cfg, &records);
    }
    for (protein, records) in load_protein_records(&cfg)? {
        info!("Training on {} {} repeats", records.len(), protein);
        let mut protein_cfg = cfg.clone();
        protein_cfg.data.protein = Some(protein);
        protein_cfg.results_folder = cfg.results_folder.join(protein.to_string());
        train_and_log(&protein_cfg, &records)?;
    }
    Ok(())
}

fn train_and_log(cfg: &ExperimentConfig, records: &[RepeatRecord]) -> Result<()> {
    let splits = prepare_splits(cfg, records)?;

    let model = train_rule_classifier(&splits.train, &cfg.rules, &cfg.basket)?;
    let train = model.evaluate(&splits.train)?;
    let valid = model.evaluate(&splits.valid)?;
    let test = model.evaluate(&splits.test)?;

    let passes = [
        ("train", train.metrics.as_ref()),
        ("valid", valid.metrics.as_ref()),
        ("test", test.metrics.as_ref()),
    ];
    let run_dir = log_training(&cfg.results_folder, "rules", &[], cfg, &passes, cfg.seed)?;
    save_model_outputs(&model, &run_dir)?;

    let title = format!(
        "Rule classifier ({} rules) -> {}",
        model.classifier.rules().len(),
        run_dir.display()
    );
    print_summary(&title, &passes);
    Ok(())
}

pub fn run_grid(args: &GridArgs) -> Result<()> {
    let cfg = args.experiment.load_config()?;
    cfg.validate()?;

    let records = load_records(&cfg)?;
    let splits = prepare_splits(&cfg, &records)?;
    if splits.valid.is_empty() {
        bail!("grid search needs a non-empty validation split (set --valid-size)");
    }

    let result = grid_search(&splits.train, &splits.valid, &cfg.grid, &cfg.basket)?;

    // refit the winner on everything but the test split
    let mut refit_data = splits.train.clone();
    refit_data.extend(splits.valid.iter().cloned());
    let model = train_rule_classifier(&refit_data, &result.best_params, &cfg.basket)?;
    let train = model.evaluate(&refit_data)?;
    let test = model.evaluate(&splits.test)?;

    let mut best_cfg = cfg.clone();
    best_cfg.rules = result.best_params.clone();
    let passes = [("train", train.metrics.as_ref()), ("test", test.metrics.as_ref())];
    let run_dir = log_training(
        &cfg.results_folder,
        "rules_grid",
        &result.leaderboard,
        &best_cfg,
        &passes,
        cfg.seed,
    )?;
    save_model_outputs(&model, &run_dir)?;

    let title = format!(
        "Best of {} combinations -> {}",
        result.leaderboard.len(),
        run_dir.display()
    );
    print_summary(&title, &passes);
    Ok(())
}

pub fn run_predict(args: &PredictArgs) -> Result<()> {
    let model = RuleModel::load(&args.model)?;
    let df = read_csv(&args.input)?;
    let records = query_records(&df, model.basket.pad)?;
    let predictions = model.predict_records(&records);
    info!("Predicted {} repeats with {} rules", predictions.len(), model.classifier.rules().len());

    let rows: Vec<u64> = (0..records.len() as u64).collect();
    let repeats: Vec<&str> = records.iter().map(|r| r.repeat.as_str()).collect();
    let mut out = DataFrame::new(vec![
        Column::from(Series::new("row".into(), rows)),
        Column::from(Series::new("repeat".into(), repeats)),
        Column::from(Series::new("predicted_virus".into(), predictions.clone())),
    ])?;
    dataframe_to_csv(&mut out, &args.output, true)?;

    let labelled = records.iter().all(|r| !r.virus_name.is_empty());
    if labelled && !records.is_empty() {
        let truth: Vec<&str> = records.iter().map(|r| r.virus_name.as_str()).collect();
        let predicted: Vec<&str> = predictions.iter().map(String::as_str).collect();
        if let Some(m) = Metrics::compute(&truth, &predicted, None)? {
            info!("Input carries labels: {}", m);
        }
    }
    println!("Predictions written to {}", args.output.display());
    Ok(())
}

pub fn run_baseline(args: &BaselineArgs) -> Result<()> {
    let cfg = args.experiment.load_config()?;
    cfg.validate()?;
    let width = args.max_aa_length.unwrap_or(cfg.rules.max_aa_length);

    let table = match (args.features, &args.protvec) {
        (FeatureKind::Protvec, Some(path)) => Some(ProtVecTable::from_tsv(path)?),
        (FeatureKind::Protvec, None) => bail!("--features protvec needs --protvec <TSV>"),
        (FeatureKind::Positional, Some(_)) => {
            warn!("--protvec is ignored for positional features");
            None
        }
        (FeatureKind::Positional, None) => None,
    };
    let featurizer = match &table {
        Some(t) => Featurizer::ProtVec(t),
        None => Featurizer::Positional(PositionalEncoder::new(width, cfg.basket.pad)),
    };

    let records = load_records(&cfg)?;
    let splits = prepare_splits(&cfg, &records)?;
    let params = BaselineParams { alpha: args.alpha, max_iterations: args.max_iterations };
    let report = train_logistic_baseline(&splits.train, &splits.test, &featurizer, &params)
        .context("training logistic baseline")?;

    let logged = json!({
        "features": report.features,
        "n_features": report.n_features,
        "max_aa_length": width,
        "baseline": params,
        "split": cfg.split,
        "resample": cfg.resample,
        "data": cfg.data,
    });
    let passes = [("train", report.train.as_ref()), ("test", report.test.as_ref())];
    let features = serde_json::to_value(report.features)?;
    let tag = format!("logistic_{}", features.as_str().unwrap_or("features"));
    let run_dir = log_training(&cfg.results_folder, &tag, &[], &logged, &passes, cfg.seed)?;

    print_summary(&format!("Logistic baseline -> {}", run_dir.display()), &passes);
    Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::baseline::FeatureKind;
use crate::config::{ExperimentConfig, RuleParams, SplitSizes};
use crate::models::{Protein, ResampleStrategy};

#[derive(Parser)]
#[command(
    name = "repeat-rules",
    version,
    about = "Predict the virus of a protein repeat with association rules",
    long_about = None,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(global = true)]
    #[clap(action = ArgAction::Count)]
    #[clap(help = "Specify multiple times to increase verbosity level (e.g., -vv)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Mine rules on the training split and evaluate them on the test split")]
    Train(TrainArgs),
    #[clap(about = "Grid-search rule thresholds on the validation split")]
    Grid(GridArgs),
    #[clap(about = "Predict viruses for a repeat table with a saved model")]
    Predict(PredictArgs),
    #[clap(about = "Train the logistic regression comparison model")]
    Baseline(BaselineArgs),
}

/// Data, split and output options shared by the training commands.
#[derive(Args, Debug, Clone)]
pub struct ExperimentArgs {
    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(help = "JSON experiment configuration; flags below override it")]
    #[clap(value_name = "JSON")]
    #[arg(value_parser = check_file_exists)]
    pub config: Option<PathBuf>,

    #[clap(short = 'd')]
    #[clap(long = "data")]
    #[clap(help = "Repeat table (CSV)")]
    #[clap(value_name = "CSV")]
    #[arg(value_parser = check_file_exists)]
    pub data: Option<PathBuf>,

    #[clap(long = "protein")]
    #[clap(help = "Restrict the table to one protein family")]
    pub protein: Option<Protein>,

    #[clap(short = 'o')]
    #[clap(long = "results-folder")]
    #[clap(value_name = "DIR")]
    pub results_folder: Option<PathBuf>,

    #[clap(long = "seed")]
    pub seed: Option<u64>,

    #[clap(help_heading("Split"))]
    #[clap(long = "train-size")]
    pub train_size: Option<f64>,

    #[clap(help_heading("Split"))]
    #[clap(long = "valid-size")]
    pub valid_size: Option<f64>,

    #[clap(help_heading("Split"))]
    #[clap(long = "test-size")]
    pub test_size: Option<f64>,

    #[clap(long = "resample")]
    #[clap(help = "Class rebalancing of the training split")]
    pub resample: Option<ResampleStrategy>,

    #[clap(long = "no-repeat-type")]
    #[clap(help = "Leave the repeat type out of the baskets")]
    pub no_repeat_type: bool,
}

/// Rule thresholds; unset values come from the configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    #[clap(help_heading("Rules"))]
    #[clap(short = 'w')]
    #[clap(long = "max-aa-length")]
    #[clap(help = "Number of positional slots (W)")]
    pub max_aa_length: Option<usize>,

    #[clap(help_heading("Rules"))]
    #[clap(long = "min-confidence")]
    pub min_confidence: Option<f64>,

    #[clap(help_heading("Rules"))]
    #[clap(long = "min-lift")]
    pub min_lift: Option<f64>,

    #[clap(help_heading("Rules"))]
    #[clap(long = "min-support")]
    pub min_support: Option<f64>,

    #[clap(help_heading("Rules"))]
    #[clap(long = "min-antecedents")]
    pub min_antecedents: Option<usize>,

    #[clap(help_heading("Rules"))]
    #[clap(long = "max-antecedents")]
    pub max_antecedents: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    #[command(flatten)]
    pub rules: RuleArgs,

    #[clap(long = "per-protein")]
    #[clap(help = "Train one model per protein family, each under its own results subfolder")]
    #[clap(conflicts_with = "protein")]
    pub per_protein: bool,
}

#[derive(Parser, Debug)]
pub struct GridArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct PredictArgs {
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "model")]
    #[clap(help = "model.json written by `train` or `grid`")]
    #[clap(value_name = "JSON")]
    #[arg(value_parser = check_file_exists)]
    pub model: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "Repeat table to classify (CSV)")]
    #[clap(value_name = "CSV")]
    #[arg(value_parser = check_file_exists)]
    pub input: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Where to write the predictions (CSV)")]
    #[clap(value_name = "CSV")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct BaselineArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    #[clap(long = "features")]
    #[clap(default_value = "positional")]
    pub features: FeatureKind,

    #[clap(long = "protvec")]
    #[clap(help = "ProtVec 3-gram table (TSV), required for --features protvec")]
    #[clap(value_name = "TSV")]
    #[arg(value_parser = check_file_exists)]
    pub protvec: Option<PathBuf>,

    #[clap(short = 'w')]
    #[clap(long = "max-aa-length")]
    pub max_aa_length: Option<usize>,

    #[clap(long = "alpha")]
    #[clap(default_value = "1.0")]
    pub alpha: f64,

    #[clap(long = "max-iterations")]
    #[clap(default_value = "100")]
    pub max_iterations: u64,
}

impl ExperimentArgs {
    /// Configuration file (or defaults) with the command-line overrides applied.
    pub fn load_config(&self) -> Result<ExperimentConfig> {
        let mut cfg = match &self.config {
            Some(path) => ExperimentConfig::from_json(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(data) = &self.data {
            cfg.data.path = data.clone();
        }
        if self.protein.is_some() {
            cfg.data.protein = self.protein;
        }
        if let Some(folder) = &self.results_folder {
            cfg.results_folder = folder.clone();
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if self.train_size.is_some() || self.valid_size.is_some() || self.test_size.is_some() {
            cfg.split = SplitSizes::new(self.train_size, self.valid_size, self.test_size);
        }
        if let Some(resample) = self.resample {
            cfg.resample = resample;
        }
        if self.no_repeat_type {
            cfg.basket.include_repeat_type = false;
        }
        Ok(cfg)
    }
}

impl RuleArgs {
    pub fn apply(&self, params: &mut RuleParams) {
        if let Some(v) = self.max_aa_length {
            params.max_aa_length = v;
        }
        if let Some(v) = self.min_confidence {
            params.min_confidence = v;
        }
        if let Some(v) = self.min_lift {
            params.min_lift = v;
        }
        if let Some(v) = self.min_support {
            params.min_support = v;
        }
        if let Some(v) = self.min_antecedents {
            params.min_antecedents = v;
        }
        if let Some(v) = self.max_antecedents {
            params.max_antecedents = v;
        }
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use repeat_rules::cli::{Cli, Command};
use repeat_rules::commands::{run_baseline, run_grid, run_predict, run_train};

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);
    info!("Running repeat-rules {}", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Command::Train(args) => run_train(args),
        Command::Grid(args) => run_grid(args),
        Command::Predict(args) => run_predict(args),
        Command::Baseline(args) => run_baseline(args),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

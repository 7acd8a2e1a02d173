use std::fmt::Write as _;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use plotters::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::metrics::Metrics;
use crate::classifier::grid::{leaderboard_frame, LeaderboardRow};
use crate::helper_functions::dataframe_to_csv;

/// Write the report of one training run.
///
/// Everything goes to `{results_folder}/{tag}_{YYYYmmdd_HHMMSS}/`:
/// `report.txt`, `params.json`, `leaderboard.csv` when a grid was searched
/// and one `confusion_matrix_{pass}.png` per scored evaluation pass.
/// Returns the run directory.
pub fn log_training<P: Serialize>(
    results_folder: &Path,
    tag: &str,
    leaderboard: &[LeaderboardRow],
    params: &P,
    metrics: &[(&str, Option<&Metrics>)],
    seed: u64,
) -> Result<PathBuf> {
    let now = Local::now();
    let run_dir = results_folder.join(format!("{}_{}", tag, now.format("%Y%m%d_%H%M%S")));
    create_dir_all(&run_dir).with_context(|| format!("creating {}", run_dir.display()))?;

    let params_json = serde_json::to_string_pretty(params).context("serialising parameters")?;
    write(run_dir.join("params.json"), &params_json).context("writing params.json")?;

    let mut report = String::new();
    writeln!(report, "model: {tag}")?;
    writeln!(report, "date: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(report, "seed: {seed}")?;
    writeln!(report, "\n== parameters ==\n{params_json}")?;

    if !leaderboard.is_empty() {
        let mut df = leaderboard_frame(leaderboard)?;
        dataframe_to_csv(&mut df, &run_dir.join("leaderboard.csv"), true)?;
        writeln!(report, "\n== leaderboard ({} combinations) ==", leaderboard.len())?;
        for (rank, row) in leaderboard.iter().enumerate() {
            writeln!(
                report,
                "{:>3}. f1={:.4} acc={:.4} rules={:<6} {:?}",
                rank + 1,
                row.f1,
                row.accuracy,
                row.n_rules,
                row.params
            )?;
        }
    }

    for (pass, m) in metrics {
        writeln!(report, "\n== {pass} ==")?;
        match m {
            Some(m) => {
                writeln!(report, "{m}")?;
                writeln!(report, "\n{}", m.confusion_table())?;
                let png = run_dir.join(format!("confusion_matrix_{pass}.png"));
                if let Err(e) = draw_confusion_matrix(&png, m, &format!("{tag} ({pass})")) {
                    warn!("Could not draw {}: {}", png.display(), e);
                }
            }
            None => writeln!(report, "no rows, evaluation skipped")?,
        }
    }

    write(run_dir.join("report.txt"), &report).context("writing report.txt")?;
    info!("Training report written to {}", run_dir.display());
    Ok(run_dir)
}

/// Heatmap of the confusion matrix, true labels on rows.
pub fn draw_confusion_matrix(path: &Path, metrics: &Metrics, title: &str) -> Result<()> {
    let k = metrics.labels.len() as i32;
    let side = (200 + 60 * k.max(1)) as u32;
    let max = metrics.confusion_matrix.iter().copied().max().unwrap_or(0).max(1) as f64;
    let err = |e: &dyn std::fmt::Display| anyhow!("drawing confusion matrix: {}", e);

    let root = BitMapBackend::new(path, (side.max(480), side.max(480))).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(10)
        .top_x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0i32..k, k..0i32)
        .map_err(|e| err(&e))?;

    let label_of = |v: &i32| metrics.labels.get(*v as usize).cloned().unwrap_or_default();
    chart
        .configure_mesh()
        .x_labels(k as usize)
        .y_labels(k as usize)
        .x_label_formatter(&label_of)
        .y_label_formatter(&label_of)
        .x_desc("predicted")
        .y_desc("true")
        .disable_x_mesh()
        .disable_y_mesh()
        .label_style(("sans-serif", 14))
        .draw()
        .map_err(|e| err(&e))?;

    let cells: Vec<(i32, i32, u64)> = metrics
        .confusion_matrix
        .indexed_iter()
        .map(|((i, j), &v)| (j as i32, i as i32, v))
        .collect();

    chart
        .draw_series(cells.iter().map(|&(x, y, v)| {
            let shade = v as f64 / max;
            Rectangle::new(
                [(x, y), (x + 1, y + 1)],
                HSLColor(0.6, 0.7, 0.95 - 0.55 * shade).filled(),
            )
        }))
        .map_err(|e| err(&e))?;

    chart
        .draw_series(cells.iter().map(|&(x, y, v)| {
            Text::new(v.to_string(), (x, y), ("sans-serif", 16).into_font().color(&BLACK))
        }))
        .map_err(|e| err(&e))?;

    root.present().map_err(|e| err(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleParams;

    #[test]
    fn report_directory_holds_params_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Metrics::compute(&["BCOV", "MERS"], &["BCOV", "BCOV"], None).unwrap();
        let row = LeaderboardRow {
            params: RuleParams::default(),
            n_rules: 3,
            accuracy: 0.5,
            precision: 0.25,
            recall: 0.5,
            f1: 0.33,
        };

        let run = log_training(
            dir.path(),
            "rules",
            &[row],
            &RuleParams::default(),
            &[("test", metrics.as_ref()), ("valid", None)],
            561,
        )
        .unwrap();

        assert!(run.file_name().unwrap().to_string_lossy().starts_with("rules_"));
        assert!(run.join("params.json").exists());
        assert!(run.join("leaderboard.csv").exists());

        let report = std::fs::read_to_string(run.join("report.txt")).unwrap();
        assert!(report.contains("seed: 561"));
        assert!(report.contains("accuracy=0.5000"));
        assert!(report.contains("evaluation skipped"));

        let written = std::fs::read_to_string(run.join("params.json")).unwrap();
        let params: RuleParams = serde_json::from_str(&written).unwrap();
        assert_eq!(params, RuleParams::default());
    }

    #[test]
    fn no_leaderboard_file_without_grid() {
        let dir = tempfile::tempdir().unwrap();
        let params = RuleParams::default();
        let run = log_training(dir.path(), "baseline", &[], &params, &[], 1).unwrap();
        assert!(!run.join("leaderboard.csv").exists());
        assert!(run.join("report.txt").exists());
    }
}

use std::env;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::debug;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Resolve a relative path against the project root.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    }
}

pub fn read_csv(file_path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .with_context(|| format!("opening {}", file_path.display()))?
        .finish()
        .with_context(|| format!("reading {}", file_path.display()))?;
    debug!("Read {} rows x {} cols from {}", df.height(), df.width(), file_path.display());
    Ok(df)
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path, include_header: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .with_separator(b',')
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// True when the frame has a column with this exact name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn csv_round_trip_keeps_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut df = df![
            "repeat" => &["AN", "QR"],
            "virus_name" => &["BCOV", "MERS"]
        ]
        .unwrap();

        dataframe_to_csv(&mut df, &path, true).unwrap();
        let back = read_csv(&path).unwrap();

        assert_eq!(back.height(), 2);
        assert!(has_column(&back, "repeat"));
        assert!(has_column(&back, "virus_name"));
        assert!(!has_column(&back, "repeat_type"));
    }
}

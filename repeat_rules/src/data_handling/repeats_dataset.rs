use std::path::PathBuf;

use anyhow::{bail, Result};
use polars::prelude::*;
use tracing::{debug, error, info};

use crate::data_handling::Dataset;
use crate::helper_functions::{has_column, read_csv};
use crate::models::{Protein, RepeatRecord};

/// Repeat table exported by the motif search tool.
pub struct RepeatsDataset {
    pub path: PathBuf,
}

impl Dataset for RepeatsDataset {
    fn load(&self) -> Result<DataFrame> {
        info!("Reading repeat data from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read repeat CSV: {}", e);
                return Err(e);
            }
        };
        debug!("Loaded {} rows", df.height());
        Ok(df)
    }
}

/// Drop unused columns and normalise the repeat column name to `repeat`.
///
/// Fails before touching the frame if a reserved column is listed in
/// `columns_to_drop`. When both `left_repeat` and `right_repeat` survive the
/// drop the left one is kept, so dropping `left_repeat` selects the right
/// repeat. The result has `repeat` first and `virus_name` last.
pub fn prepare_repeats(
    mut df: DataFrame,
    columns_to_drop: &[String],
    reserved: &[&str],
) -> Result<DataFrame> {
    if let Some(bad) = columns_to_drop.iter().find(|c| reserved.contains(&c.as_str())) {
        bail!("column '{}' is required and cannot be dropped", bad);
    }

    for name in columns_to_drop {
        if has_column(&df, name) {
            df = df.drop(name)?;
        } else {
            debug!("Column '{}' not present, nothing to drop", name);
        }
    }

    if !has_column(&df, "virus_name") {
        bail!("missing required column 'virus_name'");
    }
    let df = normalise_repeat_column(df)?;

    let mut order: Vec<String> = vec!["repeat".to_string()];
    order.extend(
        df.get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|c| c != "repeat" && c != "virus_name"),
    );
    order.push("virus_name".to_string());

    Ok(df.select(order)?)
}

/// Keep one repeat column and call it `repeat`; `left_repeat` wins over
/// `right_repeat`. A frame that already has `repeat` is returned as is.
pub fn normalise_repeat_column(mut df: DataFrame) -> Result<DataFrame> {
    if has_column(&df, "repeat") {
        return Ok(df);
    }
    if has_column(&df, "left_repeat") && has_column(&df, "right_repeat") {
        df = df.drop("right_repeat")?;
    }
    let source = if has_column(&df, "left_repeat") {
        "left_repeat"
    } else if has_column(&df, "right_repeat") {
        "right_repeat"
    } else {
        bail!("missing required column 'repeat' (or 'left_repeat' / 'right_repeat')");
    };
    df.rename(source, PlSmallStr::from("repeat"))?;
    Ok(df)
}

fn protein_filter(protein: Protein) -> Expr {
    protein
        .synonyms()
        .iter()
        .map(|name| col("protein_name").eq(lit(*name)))
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(false))
}

/// Rows of one protein family.
pub fn select_protein(df: &DataFrame, protein: Protein) -> Result<DataFrame> {
    if !has_column(df, "protein_name") {
        bail!("missing required column 'protein_name' for protein selection");
    }
    let sub = df.clone().lazy().filter(protein_filter(protein)).collect()?;
    info!("{} repeats for {} proteins", sub.height(), protein);
    Ok(sub)
}

/// Split the raw table into spike and nucleocapsid rows.
pub fn split_into_proteins(df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
    let spike = select_protein(df, Protein::Spike)?;
    let nucleocapsid = select_protein(df, Protein::Nucleocapsid)?;
    Ok((spike, nucleocapsid))
}

/// Rebuild repeat strings from already encoded `p1..pW` columns, skipping
/// `pad` slots.
fn repeats_from_positions(df: &DataFrame, pad: char) -> Result<Vec<String>> {
    let mut position_cols = Vec::new();
    let mut i = 1;
    while has_column(df, &format!("p{i}")) {
        position_cols.push(df.column(&format!("p{i}"))?.cast(&DataType::String)?);
        i += 1;
    }
    if position_cols.is_empty() {
        bail!("missing required column 'repeat' (or positional columns 'p1..pW')");
    }

    let slots = position_cols
        .iter()
        .map(|c| c.str().map_err(anyhow::Error::from))
        .collect::<Result<Vec<_>>>()?;

    let mut repeats = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let repeat: String = slots
            .iter()
            .filter_map(|ca| ca.get(row))
            .flat_map(|s| s.chars())
            .filter(|&ch| ch != pad)
            .collect();
        repeats.push(repeat);
    }
    Ok(repeats)
}

/// Extract immutable repeat records from a prepared frame.
///
/// A missing `repeat_type` column yields empty type codes; a null
/// `virus_name` is a data error. `pad` is only used for positional input.
pub fn records_from_frame(df: &DataFrame, pad: char) -> Result<Vec<RepeatRecord>> {
    if !has_column(df, "virus_name") {
        bail!("missing required column 'virus_name'");
    }
    extract_records(df, true, pad)
}

/// Records of a table to classify. The label column is optional here and
/// left empty when absent.
pub fn query_records(df: &DataFrame, pad: char) -> Result<Vec<RepeatRecord>> {
    if has_column(df, "repeat") || !has_column(df, "p1") {
        let df = normalise_repeat_column(df.clone())?;
        extract_records(&df, false, pad)
    } else {
        extract_records(df, false, pad)
    }
}

fn optional_str_column(df: &DataFrame, name: &str) -> Result<Option<Column>> {
    if has_column(df, name) {
        Ok(Some(df.column(name)?.cast(&DataType::String)?))
    } else {
        Ok(None)
    }
}

fn extract_records(df: &DataFrame, require_label: bool, pad: char) -> Result<Vec<RepeatRecord>> {
    let repeats: Vec<String> = if has_column(df, "repeat") {
        let col = df.column("repeat")?.cast(&DataType::String)?;
        col.str()?
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect()
    } else {
        repeats_from_positions(df, pad)?
    };

    let virus_col = optional_str_column(df, "virus_name")?;
    let viruses = match &virus_col {
        Some(c) => Some(c.str()?),
        None => None,
    };
    let type_col = optional_str_column(df, "repeat_type")?;
    let types = match &type_col {
        Some(c) => Some(c.str()?),
        None => None,
    };

    let mut records = Vec::with_capacity(df.height());
    for (row, repeat) in repeats.into_iter().enumerate() {
        let virus_name = match viruses.and_then(|ca| ca.get(row)) {
            Some(v) => v,
            None if require_label => bail!("row {row}: virus_name is null"),
            None => "",
        };
        let repeat_type = types.and_then(|ca| ca.get(row)).unwrap_or("");
        records.push(RepeatRecord {
            repeat,
            repeat_type: repeat_type.to_string(),
            virus_name: virus_name.to_string(),
        });
    }
    Ok(records)
}

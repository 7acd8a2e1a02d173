use std::collections::BTreeSet;

use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

use crate::features::basket::Basket;

/// One-hot transaction encoding of baskets.
///
/// The vocabulary is the sorted union of the items seen in `fit`, so the
/// same baskets always give the same columns in the same order. Items
/// unknown to the vocabulary are ignored by `transform`.
#[derive(Debug, Clone, Default)]
pub struct TransactionEncoder {
    columns: Vec<String>,
}

impl TransactionEncoder {
    pub fn fit(baskets: &[Basket]) -> Self {
        let vocabulary: BTreeSet<&String> = baskets.iter().flatten().collect();
        let columns: Vec<String> = vocabulary.into_iter().cloned().collect();
        debug!("Transaction vocabulary: {} items over {} baskets", columns.len(), baskets.len());
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// N x V boolean frame, one column per vocabulary item.
    pub fn transform(&self, baskets: &[Basket]) -> Result<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(|item| {
                let present: Vec<bool> = baskets.iter().map(|b| b.contains(item)).collect();
                Column::from(Series::new(PlSmallStr::from(item.as_str()), present))
            })
            .collect::<Vec<_>>();
        Ok(DataFrame::new(columns)?)
    }

    pub fn fit_transform(baskets: &[Basket]) -> Result<(Self, DataFrame)> {
        let encoder = Self::fit(baskets);
        let table = encoder.transform(baskets)?;
        Ok((encoder, table))
    }
}

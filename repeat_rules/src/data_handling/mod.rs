use anyhow::Result;
use polars::frame::DataFrame;

pub mod rebalance;
pub mod repeats_dataset;
pub mod split;

/// A tabular source the pipeline can load.
pub trait Dataset {
    fn load(&self) -> Result<DataFrame>;
}

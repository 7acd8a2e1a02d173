use anyhow::Result;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use crate::config::SplitSizes;
use crate::models::RepeatRecord;

/// Train, validation and test partitions of the repeat records.
#[derive(Debug, Clone, Default)]
pub struct Splits {
    pub train: Vec<RepeatRecord>,
    pub valid: Vec<RepeatRecord>,
    pub test: Vec<RepeatRecord>,
}

/// Seeded shuffle followed by contiguous train / valid / test slices.
///
/// The split sizes are resolved (and validated) before any row is touched.
pub fn split_records(records: &[RepeatRecord], sizes: &SplitSizes, seed: u64) -> Result<Splits> {
    let resolved = sizes.resolve()?;
    let n = records.len();

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_train = ((n as f64 * resolved.train).round() as usize).min(n);
    let n_valid = ((n as f64 * resolved.valid).round() as usize).min(n - n_train);

    let take = |idx: &[usize]| idx.iter().map(|&i| records[i].clone()).collect::<Vec<_>>();
    let splits = Splits {
        train: take(&order[..n_train]),
        valid: take(&order[n_train..n_train + n_valid]),
        test: take(&order[n_train + n_valid..]),
    };

    info!(
        "Split {} records into train={} valid={} test={} (seed {})",
        n,
        splits.train.len(),
        splits.valid.len(),
        splits.test.len(),
        seed
    );
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<RepeatRecord> {
        (0..n)
            .map(|i| {
                let virus = if i % 2 == 0 { "BCOV" } else { "MERS" };
                RepeatRecord::new(&format!("A{i}"), "in", virus)
            })
            .collect()
    }

    #[test]
    fn partitions_cover_all_rows_once() {
        let data = records(100);
        let sizes = SplitSizes::new(Some(0.7), Some(0.2), Some(0.1));
        let s = split_records(&data, &sizes, 561).unwrap();
        assert_eq!((s.train.len(), s.valid.len(), s.test.len()), (70, 20, 10));

        let mut seen: Vec<String> = s
            .train
            .iter()
            .chain(&s.valid)
            .chain(&s.test)
            .map(|r| r.repeat.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn same_seed_same_split() {
        let data = records(50);
        let sizes = SplitSizes::new(Some(0.8), None, Some(0.2));
        let a = split_records(&data, &sizes, 7).unwrap();
        let b = split_records(&data, &sizes, 7).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
        assert!(a.valid.is_empty());
    }

    #[test]
    fn bad_sizes_fail_before_splitting() {
        let data = records(10);
        let sizes = SplitSizes::new(Some(0.6), Some(0.6), Some(0.2));
        let err = split_records(&data, &sizes, 1).unwrap_err();
        assert!(err.to_string().contains("split sizes must add up to 1"));
    }
}

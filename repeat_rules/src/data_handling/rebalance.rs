use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use crate::models::{RepeatRecord, ResampleStrategy};

/// Row indices per virus label, labels in first-seen order.
fn indices_by_label(records: &[RepeatRecord]) -> Vec<(String, Vec<usize>)> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, r) in records.iter().enumerate() {
        let k = *slot.entry(r.virus_name.as_str()).or_insert_with(|| {
            groups.push((r.virus_name.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[k].1.push(i);
    }
    groups
}

/// Equalise class sizes in the training data.
///
/// `Under` keeps a random subset of every class the size of the rarest one,
/// `Over` tops every class up to the most common one by drawing with
/// replacement. The result is shuffled with the same seed.
pub fn rebalance(
    records: &[RepeatRecord],
    strategy: ResampleStrategy,
    seed: u64,
) -> Vec<RepeatRecord> {
    if strategy == ResampleStrategy::None || records.is_empty() {
        return records.to_vec();
    }

    let groups = indices_by_label(records);
    let counts = groups.iter().map(|(_, idx)| idx.len());
    let target = if strategy == ResampleStrategy::Under {
        counts.min().unwrap_or(0)
    } else {
        counts.max().unwrap_or(0)
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked: Vec<usize> = Vec::with_capacity(target * groups.len());
    for (_, idx) in &groups {
        let mut idx = idx.clone();
        idx.shuffle(&mut rng);
        if idx.len() >= target {
            picked.extend_from_slice(&idx[..target]);
        } else {
            picked.extend_from_slice(&idx);
            for _ in idx.len()..target {
                picked.push(idx[rng.gen_range(0..idx.len())]);
            }
        }
    }
    picked.shuffle(&mut rng);

    info!(
        "Rebalanced ({}) {} rows into {} rows, {} per class",
        strategy,
        records.len(),
        picked.len(),
        target
    );
    picked.into_iter().map(|i| records[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed() -> Vec<RepeatRecord> {
        let mut v = Vec::new();
        for i in 0..6 {
            v.push(RepeatRecord::new(&format!("A{i}"), "in", "BCOV"));
        }
        for i in 0..2 {
            v.push(RepeatRecord::new(&format!("Q{i}"), "dn", "MERS"));
        }
        v
    }

    fn count(records: &[RepeatRecord], label: &str) -> usize {
        records.iter().filter(|r| r.virus_name == label).count()
    }

    #[test]
    fn undersampling_matches_rarest_class() {
        let out = rebalance(&skewed(), ResampleStrategy::Under, 561);
        assert_eq!(count(&out, "BCOV"), 2);
        assert_eq!(count(&out, "MERS"), 2);
    }

    #[test]
    fn oversampling_matches_most_common_class() {
        let out = rebalance(&skewed(), ResampleStrategy::Over, 561);
        assert_eq!(count(&out, "BCOV"), 6);
        assert_eq!(count(&out, "MERS"), 6);
        assert!(out.iter().filter(|r| r.virus_name == "MERS").all(|r| r.repeat.starts_with('Q')));
    }

    #[test]
    fn none_is_identity() {
        let data = skewed();
        assert_eq!(rebalance(&data, ResampleStrategy::None, 1), data);
    }
}

//! FP-growth frequent itemset mining over a boolean transaction frame.

use std::collections::{BTreeMap, HashMap};

use anyhow::{ensure, Result};
use polars::prelude::*;
use tracing::debug;

/// Itemset as sorted column indices plus its absolute count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequentItemset {
    pub items: Vec<usize>,
    pub count: usize,
}

/// Mining output: the itemsets and what is needed to turn counts into support.
#[derive(Debug, Clone)]
pub struct FrequentItemsets {
    pub item_names: Vec<String>,
    pub n_transactions: usize,
    pub itemsets: Vec<FrequentItemset>,
}

impl FrequentItemsets {
    pub fn support(&self, count: usize) -> f64 {
        if self.n_transactions == 0 {
            0.0
        } else {
            count as f64 / self.n_transactions as f64
        }
    }

    pub fn names(&self, items: &[usize]) -> Vec<&str> {
        items.iter().map(|&i| self.item_names[i].as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.itemsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itemsets.is_empty()
    }
}

struct Node {
    item: usize,
    count: usize,
    parent: usize,
    children: Vec<(usize, usize)>,
}

struct FpTree {
    nodes: Vec<Node>,
    // frequent items with their counts, most frequent first
    items: Vec<(usize, usize)>,
    // node indices per entry of `items`
    header: Vec<Vec<usize>>,
}

const ROOT: usize = 0;

fn build_tree(transactions: &[(Vec<usize>, usize)], min_count: usize) -> FpTree {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for (items, weight) in transactions {
        for &item in items {
            *counts.entry(item).or_default() += weight;
        }
    }

    let mut items: Vec<(usize, usize)> = counts
        .into_iter()
        .filter(|&(_, c)| c >= min_count)
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let rank: HashMap<usize, usize> = items
        .iter()
        .enumerate()
        .map(|(r, &(item, _))| (item, r))
        .collect();

    let mut nodes = vec![Node { item: usize::MAX, count: 0, parent: ROOT, children: Vec::new() }];
    let mut header = vec![Vec::new(); items.len()];

    for (transaction, weight) in transactions {
        let mut path: Vec<usize> = transaction
            .iter()
            .copied()
            .filter(|i| rank.contains_key(i))
            .collect();
        path.sort_by_key(|i| rank[i]);

        let mut cur = ROOT;
        for item in path {
            let existing = nodes[cur]
                .children
                .iter()
                .find(|&&(it, _)| it == item)
                .map(|&(_, n)| n);
            let next = match existing {
                Some(n) => n,
                None => {
                    let n = nodes.len();
                    nodes.push(Node { item, count: 0, parent: cur, children: Vec::new() });
                    nodes[cur].children.push((item, n));
                    header[rank[&item]].push(n);
                    n
                }
            };
            nodes[next].count += weight;
            cur = next;
        }
    }

    FpTree { nodes, items, header }
}

fn mine_tree(
    tree: &FpTree,
    suffix: &[usize],
    min_count: usize,
    max_len: usize,
    out: &mut Vec<FrequentItemset>,
) {
    for r in (0..tree.items.len()).rev() {
        let (item, count) = tree.items[r];
        let mut itemset = suffix.to_vec();
        itemset.push(item);

        let mut sorted = itemset.clone();
        sorted.sort_unstable();
        out.push(FrequentItemset { items: sorted, count });

        if itemset.len() >= max_len {
            continue;
        }

        // conditional pattern base: prefix paths of every node holding `item`
        let mut base = Vec::new();
        for &node in &tree.header[r] {
            let mut path = Vec::new();
            let mut p = tree.nodes[node].parent;
            while p != ROOT {
                path.push(tree.nodes[p].item);
                p = tree.nodes[p].parent;
            }
            if !path.is_empty() {
                base.push((path, tree.nodes[node].count));
            }
        }
        if base.is_empty() {
            continue;
        }

        let conditional = build_tree(&base, min_count);
        if !conditional.items.is_empty() {
            mine_tree(&conditional, &itemset, min_count, max_len, out);
        }
    }
}

/// Read the true cells of a boolean transaction frame.
pub fn transactions_from_frame(df: &DataFrame) -> Result<(Vec<String>, Vec<Vec<usize>>)> {
    let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = vec![Vec::new(); df.height()];
    for (j, column) in df.get_columns().iter().enumerate() {
        for (i, v) in column.bool()?.into_iter().enumerate() {
            if v == Some(true) {
                rows[i].push(j);
            }
        }
    }
    Ok((names, rows))
}

/// All itemsets with support `>= min_support` and at most `max_len` items.
///
/// Itemsets come back ordered by size, then by column index, so the output
/// only depends on the input frame.
pub fn fpgrowth(df: &DataFrame, min_support: f64, max_len: usize) -> Result<FrequentItemsets> {
    ensure!(
        min_support > 0.0 && min_support <= 1.0,
        "min_support must be in (0, 1], got {}",
        min_support
    );
    ensure!(max_len >= 1, "max_len must be at least 1");

    let (item_names, rows) = transactions_from_frame(df)?;
    let n = rows.len();
    let mut itemsets = Vec::new();

    if n > 0 {
        // smallest count whose support reaches min_support
        let min_count = ((min_support * n as f64) - 1e-9).ceil().max(1.0) as usize;
        let weighted: Vec<(Vec<usize>, usize)> = rows.into_iter().map(|r| (r, 1)).collect();
        let tree = build_tree(&weighted, min_count);
        mine_tree(&tree, &[], min_count, max_len, &mut itemsets);
        itemsets.sort_by(|a, b| {
            a.items
                .len()
                .cmp(&b.items.len())
                .then_with(|| a.items.cmp(&b.items))
        });
    }

    debug!(
        "FP-growth: {} frequent itemsets from {} transactions over {} items",
        itemsets.len(),
        n,
        item_names.len()
    );
    Ok(FrequentItemsets { item_names, n_transactions: n, itemsets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn table() -> DataFrame {
        df![
            "a" => &[true, true, true, false],
            "b" => &[true, true, false, true],
            "c" => &[true, false, false, false]
        ]
        .unwrap()
    }

    fn count_of(sets: &FrequentItemsets, items: &[usize]) -> Option<usize> {
        sets.itemsets.iter().find(|s| s.items == items).map(|s| s.count)
    }

    #[test]
    fn counts_match_brute_force() {
        let sets = fpgrowth(&table(), 0.25, 3).unwrap();
        assert_eq!(count_of(&sets, &[0]), Some(3));
        assert_eq!(count_of(&sets, &[1]), Some(3));
        assert_eq!(count_of(&sets, &[2]), Some(1));
        assert_eq!(count_of(&sets, &[0, 1]), Some(2));
        assert_eq!(count_of(&sets, &[0, 2]), Some(1));
        assert_eq!(count_of(&sets, &[1, 2]), Some(1));
        assert_eq!(count_of(&sets, &[0, 1, 2]), Some(1));
        assert_eq!(sets.len(), 7);
    }

    #[test]
    fn min_support_prunes_rare_itemsets() {
        let sets = fpgrowth(&table(), 0.5, 3).unwrap();
        assert_eq!(count_of(&sets, &[2]), None);
        assert_eq!(count_of(&sets, &[0, 1]), Some(2));
        assert_eq!(sets.len(), 3);
    }

    #[test]
    fn max_len_bounds_itemset_size() {
        let sets = fpgrowth(&table(), 0.25, 2).unwrap();
        assert!(sets.itemsets.iter().all(|s| s.items.len() <= 2));
        assert_eq!(count_of(&sets, &[0, 1, 2]), None);
    }

    #[test]
    fn output_order_is_stable() {
        let a = fpgrowth(&table(), 0.25, 3).unwrap();
        let b = fpgrowth(&table(), 0.25, 3).unwrap();
        assert_eq!(a.itemsets, b.itemsets);
        assert_eq!(a.itemsets[0].items, vec![0]);
    }

    #[test]
    fn invalid_support_is_an_error() {
        assert!(fpgrowth(&table(), 0.0, 3).is_err());
    }
}

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use polars::prelude::*;
use tracing::info;

use crate::config::RuleParams;
use crate::features::basket::VIRUS_PREFIX;
use crate::mining::fp_growth::{fpgrowth, FrequentItemsets};
use crate::models::Rule;

/// Rule over column indices with the usual interest measures.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRule {
    pub antecedent: Vec<usize>,
    pub consequent: Vec<usize>,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Every split of every frequent itemset into antecedent => consequent with
/// confidence `>= min_confidence`.
pub fn association_rules(sets: &FrequentItemsets, min_confidence: f64) -> Vec<AssociationRule> {
    let counts: HashMap<&[usize], usize> = sets
        .itemsets
        .iter()
        .map(|s| (s.items.as_slice(), s.count))
        .collect();

    let mut rules = Vec::new();
    for set in sets.itemsets.iter().filter(|s| (2..64).contains(&s.items.len())) {
        let k = set.items.len();
        for mask in 1..(1u64 << k) - 1 {
            let (antecedent, consequent): (Vec<usize>, Vec<usize>) = {
                let mut a = Vec::new();
                let mut c = Vec::new();
                for (bit, &item) in set.items.iter().enumerate() {
                    if mask & (1u64 << bit) != 0 {
                        a.push(item);
                    } else {
                        c.push(item);
                    }
                }
                (a, c)
            };

            // subsets of a frequent itemset are always frequent
            let (Some(&a_count), Some(&c_count)) =
                (counts.get(antecedent.as_slice()), counts.get(consequent.as_slice()))
            else {
                continue;
            };

            let confidence = set.count as f64 / a_count as f64;
            if confidence < min_confidence {
                continue;
            }
            let lift = confidence / sets.support(c_count);
            rules.push(AssociationRule {
                antecedent,
                consequent,
                support: sets.support(set.count),
                confidence,
                lift,
            });
        }
    }
    rules
}

/// Mining-time ranking: lift, then confidence, then support, all descending.
pub fn mining_order(a: &Rule, b: &Rule) -> Ordering {
    b.lift
        .total_cmp(&a.lift)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.support.total_cmp(&a.support))
}

/// Keep rules predicting exactly one virus that pass the antecedent-size and
/// lift thresholds, ranked by [`mining_order`].
pub fn classification_rules(sets: &FrequentItemsets, params: &RuleParams) -> Vec<Rule> {
    let mut rules: Vec<Rule> = association_rules(sets, params.min_confidence)
        .into_iter()
        .filter(|r| {
            r.consequent.len() == 1 && sets.item_names[r.consequent[0]].starts_with(VIRUS_PREFIX)
        })
        .filter(|r| r.antecedent.len() >= params.min_antecedents)
        .filter(|r| r.lift >= params.min_lift)
        .map(|r| {
            let label = sets.item_names[r.consequent[0]][VIRUS_PREFIX.len()..].to_string();
            Rule {
                antecedent: sets.names(&r.antecedent).into_iter().map(str::to_string).collect(),
                consequent: label,
                confidence: r.confidence,
                lift: r.lift,
                support: r.support,
                antecedent_len: r.antecedent.len(),
            }
        })
        .collect();

    rules.sort_by(mining_order);
    rules
}

/// Mine the transaction frame and filter it down to the ranked rule table.
///
/// Zero surviving rules is a valid outcome.
pub fn mine_rules(transactions: &DataFrame, params: &RuleParams) -> Result<Vec<Rule>> {
    let sets = fpgrowth(transactions, params.min_support, params.max_antecedents)?;
    let rules = classification_rules(&sets, params);

    let mut per_label: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &rules {
        *per_label.entry(r.consequent.as_str()).or_default() += 1;
    }
    info!(
        "Mined {} frequent itemsets, kept {} classification rules {:?}",
        sets.len(),
        rules.len(),
        per_label
    );
    Ok(rules)
}

/// Rule table as a frame for CSV output.
pub fn rules_frame(rules: &[Rule]) -> Result<DataFrame> {
    let antecedents: Vec<String> = rules
        .iter()
        .map(|r| r.antecedent.iter().map(String::as_str).collect::<Vec<_>>().join(" & "))
        .collect();
    let consequents: Vec<&str> = rules.iter().map(|r| r.consequent.as_str()).collect();
    let support: Vec<f64> = rules.iter().map(|r| r.support).collect();
    let confidence: Vec<f64> = rules.iter().map(|r| r.confidence).collect();
    let lift: Vec<f64> = rules.iter().map(|r| r.lift).collect();
    let sizes: Vec<u64> = rules.iter().map(|r| r.antecedent_len as u64).collect();

    Ok(DataFrame::new(vec![
        Column::from(Series::new("antecedents".into(), antecedents)),
        Column::from(Series::new("consequent".into(), consequents)),
        Column::from(Series::new("support".into(), support)),
        Column::from(Series::new("confidence".into(), confidence)),
        Column::from(Series::new("lift".into(), lift)),
        Column::from(Series::new("antecedent_len".into(), sizes)),
    ])?)
}

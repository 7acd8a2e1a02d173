use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::features::basket::Basket;
use crate::models::{RepeatRecord, Rule};

/// Precedence of two matching rules at prediction time.
///
/// Confidence, then lift, then support, then antecedent size, all
/// descending. `Less` means `a` wins.
pub fn rule_precedence(a: &Rule, b: &Rule) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.lift.total_cmp(&a.lift))
        .then_with(|| b.support.total_cmp(&a.support))
        .then_with(|| b.antecedent_len.cmp(&a.antecedent_len))
}

/// Most frequent virus label, ties going to the label seen first.
pub fn majority_label(records: &[RepeatRecord]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        counts.entry(r.virus_name.as_str()).or_insert((0, i)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(label, _)| label.to_string())
}

/// Ranked rule table plus the fallback label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleClassifier {
    rules: Vec<Rule>,
    majority: String,
}

impl RuleClassifier {
    pub fn new(rules: Vec<Rule>, majority: String) -> Self {
        Self { rules, majority }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn majority(&self) -> &str {
        &self.majority
    }

    /// Highest-precedence rule whose antecedent is contained in the basket.
    /// On exact ties the rule ranked earlier in the table wins.
    pub fn best_rule(&self, basket: &Basket) -> Option<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.matches(basket))
            .min_by(|a, b| rule_precedence(a, b))
    }

    pub fn predict(&self, basket: &Basket) -> &str {
        match self.best_rule(basket) {
            Some(rule) => &rule.consequent,
            None => &self.majority,
        }
    }

    /// Predictions aligned with `baskets`.
    pub fn predict_batch(&self, baskets: &[Basket]) -> Vec<String> {
        baskets.par_iter().map(|b| self.predict(b).to_string()).collect()
    }
}

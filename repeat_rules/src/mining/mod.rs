//! Frequent itemsets and association rules.

pub mod fp_growth;
pub mod rules;

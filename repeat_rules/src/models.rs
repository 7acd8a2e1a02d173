use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One observed protein repeat occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatRecord {
    pub repeat: String,
    pub repeat_type: String,
    pub virus_name: String,
}

impl RepeatRecord {
    pub fn new(repeat: &str, repeat_type: &str, virus_name: &str) -> Self {
        Self {
            repeat: repeat.to_string(),
            repeat_type: repeat_type.to_string(),
            virus_name: virus_name.to_string(),
        }
    }
}

/// Association rule predicting exactly one virus label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub antecedent: BTreeSet<String>,
    pub consequent: String,
    pub confidence: f64,
    pub lift: f64,
    pub support: f64,
    pub antecedent_len: usize,
}

impl Rule {
    /// True when every antecedent item is present in the basket.
    pub fn matches(&self, basket: &BTreeSet<String>) -> bool {
        self.antecedent.is_subset(basket)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lhs: Vec<&str> = self.antecedent.iter().map(String::as_str).collect();
        write!(
            f,
            "{{{}}} => {} (conf={:.3}, lift={:.3}, supp={:.4})",
            lhs.join(", "),
            self.consequent,
            self.confidence,
            self.lift,
            self.support
        )
    }
}

/// Class rebalancing applied to the training split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResampleStrategy {
    #[default]
    None,
    Under,
    Over,
}

impl fmt::Display for ResampleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResampleStrategy::None => "none",
            ResampleStrategy::Under => "under",
            ResampleStrategy::Over => "over",
        };
        write!(f, "{s}")
    }
}

/// Protein families present in the repeat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protein {
    Spike,
    Nucleocapsid,
}

impl Protein {
    /// Synonyms used for the protein in sequence headers.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Protein::Spike => &["spike protein", "spike glycoprotein", "S protein"],
            Protein::Nucleocapsid => &[
                "nucleocapsid protein",
                "nucleocapsid phosphoprotein",
                "N protein",
            ],
        }
    }
}

impl fmt::Display for Protein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protein::Spike => "spike",
            Protein::Nucleocapsid => "nucleocapsid",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_matches_subset_only() {
        let rule = Rule {
            antecedent: ["P1=A", "RT=in"].iter().map(|s| s.to_string()).collect(),
            consequent: "BCOV".to_string(),
            confidence: 1.0,
            lift: 1.5,
            support: 0.5,
            antecedent_len: 2,
        };
        let hit: BTreeSet<String> =
            ["P1=A", "P2=N", "RT=in"].iter().map(|s| s.to_string()).collect();
        let miss: BTreeSet<String> = ["P1=A", "P2=N"].iter().map(|s| s.to_string()).collect();
        assert!(rule.matches(&hit));
        assert!(!rule.matches(&miss));
    }
}

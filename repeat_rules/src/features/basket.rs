//! Market-basket view of a repeat record.
//!
//! Every record becomes a deduplicated, sorted set of categorical items:
//!
//! * `P{i}={aa}` for each non-pad positional slot,
//! * `LEN={bucket}` for the true (truncated) length,
//! * `BG={xy}` for each distinct contiguous n-gram (`TG=` for trigrams),
//! * `AA={aa}` for each distinct residue,
//! * `RT={code}` for the repeat type when enabled,
//! * `VIRUS={name}` for training baskets only.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::config::BasketConfig;
use crate::features::positional::PositionalEncoder;
use crate::models::RepeatRecord;

/// Canonical item set of one record.
pub type Basket = BTreeSet<String>;

pub const VIRUS_PREFIX: &str = "VIRUS=";

/// Distinct contiguous windows of `n` characters.
pub fn ngrams(chars: &[char], n: usize) -> BTreeSet<String> {
    if n == 0 || chars.len() < n {
        return BTreeSet::new();
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

fn ngram_tag(n: usize) -> String {
    match n {
        2 => "BG".to_string(),
        3 => "TG".to_string(),
        _ => format!("NG{n}"),
    }
}

#[derive(Debug, Clone)]
pub struct BasketBuilder {
    encoder: PositionalEncoder,
    config: BasketConfig,
}

impl BasketBuilder {
    pub fn new(width: usize, config: BasketConfig) -> Self {
        Self {
            encoder: PositionalEncoder::new(width, config.pad),
            config,
        }
    }

    /// Items of one repeat. `virus` is only passed for training baskets.
    pub fn items(&self, repeat: &str, repeat_type: &str, virus: Option<&str>) -> Basket {
        let slots = self.encoder.encode(repeat);
        let mut items = Basket::new();

        for (i, &ch) in slots.iter().enumerate() {
            if ch != self.encoder.pad() {
                items.insert(format!("P{}={}", i + 1, ch));
            }
        }

        // truncated raw repeat, same suffix the slots hold
        let raw: Vec<char> = slots.into_iter().filter(|&c| c != self.encoder.pad()).collect();

        items.insert(format!("LEN={}", self.config.length_buckets.label(raw.len())));

        let tag = ngram_tag(self.config.ngram_size);
        for gram in ngrams(&raw, self.config.ngram_size) {
            items.insert(format!("{tag}={gram}"));
        }

        for ch in &raw {
            items.insert(format!("AA={ch}"));
        }

        if self.config.include_repeat_type && !repeat_type.is_empty() {
            items.insert(format!("RT={repeat_type}"));
        }

        if let Some(name) = virus {
            items.insert(format!("{VIRUS_PREFIX}{name}"));
        }

        items
    }

    /// Basket with the `VIRUS=` item, used for mining.
    pub fn training_basket(&self, record: &RepeatRecord) -> Basket {
        self.items(&record.repeat, &record.repeat_type, Some(&record.virus_name))
    }

    /// Basket without the answer, used for inference.
    pub fn query_basket(&self, record: &RepeatRecord) -> Basket {
        self.items(&record.repeat, &record.repeat_type, None)
    }

    pub fn build_all(&self, records: &[RepeatRecord], include_virus: bool) -> Vec<Basket> {
        records
            .par_iter()
            .map(|r| {
                if include_virus {
                    self.training_basket(r)
                } else {
                    self.query_basket(r)
                }
            })
            .collect()
    }
}

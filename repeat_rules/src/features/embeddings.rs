//! ProtVec 3-gram embeddings.
//!
//! The table is read once and then only borrowed, there is no global
//! lookup state.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ProtVecTable {
    k: usize,
    dim: usize,
    vectors: HashMap<String, Vec<f64>>,
}

impl ProtVecTable {
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f64>)>,
    {
        let mut vectors = HashMap::new();
        let mut dim = None;
        let mut k = None;
        for (gram, v) in entries {
            let d = *dim.get_or_insert(v.len());
            ensure!(v.len() == d, "embedding for '{}' has {} dims, expected {}", gram, v.len(), d);
            let n = *k.get_or_insert(gram.chars().count());
            ensure!(gram.chars().count() == n, "mixed k-mer sizes in embedding table ('{}')", gram);
            vectors.insert(gram, v);
        }
        let (Some(k), Some(dim)) = (k, dim) else {
            bail!("embedding table is empty");
        };
        Ok(Self { k, dim, vectors })
    }

    /// Tab separated `gram <TAB> v1 ... vd`; surrounding quotes are stripped.
    pub fn from_tsv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening embedding table {}", path.display()))?;

        let mut entries = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("reading {} line {}", path.display(), line + 1))?;
            let mut fields = record.iter().map(|f| f.trim().trim_matches('"'));
            let Some(gram) = fields.next() else { continue };
            let values = fields
                .filter(|f| !f.is_empty())
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("parsing {} line {}", path.display(), line + 1))?;
            entries.push((gram.to_string(), values));
        }

        let table = Self::from_entries(entries)?;
        info!("Loaded {} {}-gram embeddings of dimension {}", table.len(), table.k, table.dim);
        Ok(table)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Mean vector of the known k-mers of `repeat`, zeros if none is known.
    pub fn encode(&self, repeat: &str) -> Vec<f64> {
        let chars: Vec<char> = repeat.chars().collect();
        let mut acc = vec![0.0; self.dim];
        let mut hits = 0usize;
        if chars.len() >= self.k {
            for window in chars.windows(self.k) {
                let gram: String = window.iter().collect();
                if let Some(v) = self.vectors.get(&gram) {
                    acc.iter_mut().zip(v).for_each(|(a, x)| *a += x);
                    hits += 1;
                }
            }
        }
        if hits > 0 {
            acc.iter_mut().for_each(|a| *a /= hits as f64);
        }
        acc
    }

    pub fn encode_all<S: AsRef<str>>(&self, repeats: &[S]) -> Array2<f64> {
        let mut x = Array2::<f64>::zeros((repeats.len(), self.dim));
        for (i, r) in repeats.iter().enumerate() {
            for (j, v) in self.encode(r.as_ref()).into_iter().enumerate() {
                x[[i, j]] = v;
            }
        }
        x
    }
}

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use anyhow::{ensure, Result};
use ndarray::Array2;

/// Evaluation of one prediction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Row/column order of `confusion_matrix`.
    pub labels: Vec<String>,
    /// Rows are true labels, columns predicted labels.
    pub confusion_matrix: Array2<u64>,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Metrics {
    /// Accuracy, support-weighted precision / recall / F1 and the confusion
    /// matrix. `labels` fixes the class order; without it the sorted union of
    /// observed labels is used. Returns `None` for an empty evaluation set.
    pub fn compute<S: AsRef<str>>(
        y_true: &[S],
        y_pred: &[S],
        labels: Option<&[String]>,
    ) -> Result<Option<Self>> {
        ensure!(
            y_true.len() == y_pred.len(),
            "prediction count {} does not match label count {}",
            y_pred.len(),
            y_true.len()
        );
        if y_true.is_empty() {
            return Ok(None);
        }

        let labels: Vec<String> = match labels {
            Some(l) => l.to_vec(),
            None => y_true
                .iter()
                .chain(y_pred)
                .map(|s| s.as_ref().to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        let index: HashMap<&str, usize> =
            labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();

        let k = labels.len();
        let mut cm = Array2::<u64>::zeros((k, k));
        let mut correct = 0u64;
        for (t, p) in y_true.iter().zip(y_pred) {
            let (t, p) = (t.as_ref(), p.as_ref());
            if t == p {
                correct += 1;
            }
            if let (Some(&i), Some(&j)) = (index.get(t), index.get(p)) {
                cm[[i, j]] += 1;
            }
        }

        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut f1 = 0.0;
        let mut total_support = 0u64;
        for c in 0..k {
            let tp = cm[[c, c]];
            let support: u64 = cm.row(c).sum();
            let predicted: u64 = cm.column(c).sum();
            let p = ratio(tp, predicted);
            let r = ratio(tp, support);
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
            precision += p * support as f64;
            recall += r * support as f64;
            f1 += f * support as f64;
            total_support += support;
        }
        let w = |v: f64| if total_support == 0 { 0.0 } else { v / total_support as f64 };

        Ok(Some(Metrics {
            accuracy: correct as f64 / y_true.len() as f64,
            precision: w(precision),
            recall: w(recall),
            f1: w(f1),
            labels,
            confusion_matrix: cm,
        }))
    }

    /// Confusion matrix as aligned text, one row per true label.
    pub fn confusion_table(&self) -> String {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .chain(self.confusion_matrix.iter().map(|v| v.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        let mut out = format!("{:>width$}", "true\\pred");
        for l in &self.labels {
            out.push_str(&format!(" {:>width$}", l));
        }
        out.push('\n');
        for (i, l) in self.labels.iter().enumerate() {
            out.push_str(&format!("{:>width$}", l));
            for v in self.confusion_matrix.row(i) {
                out.push_str(&format!(" {:>width$}", v));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let y = ["BCOV", "MERS", "BCOV"];
        let m = Metrics::compute(&y, &y, None).unwrap().unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.labels, vec!["BCOV".to_string(), "MERS".to_string()]);
        assert_eq!(m.confusion_matrix[[0, 0]], 2);
        assert_eq!(m.confusion_matrix[[1, 1]], 1);
    }

    #[test]
    fn weighted_scores_match_hand_computation() {
        let y_true = ["A", "A", "A", "B"];
        let y_pred = ["A", "A", "B", "B"];
        let m = Metrics::compute(&y_true, &y_pred, None).unwrap().unwrap();
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        // A: p=1, r=2/3 ; B: p=1/2, r=1 ; weights 3:1
        let p = (3.0 * 1.0 + 0.5) / 4.0;
        let r = (3.0 * (2.0 / 3.0) + 1.0) / 4.0;
        let fa = 2.0 * 1.0 * (2.0 / 3.0) / (1.0 + 2.0 / 3.0);
        let fb = 2.0 * 0.5 * 1.0 / 1.5;
        let f = (3.0 * fa + fb) / 4.0;
        assert!((m.precision - p).abs() < 1e-12);
        assert!((m.recall - r).abs() < 1e-12);
        assert!((m.f1 - f).abs() < 1e-12);
        assert_eq!(m.confusion_matrix[[0, 1]], 1);
    }

    #[test]
    fn fixed_label_set_orders_the_matrix() {
        let labels = vec!["MERS".to_string(), "BCOV".to_string(), "HKU1".to_string()];
        let m = Metrics::compute(&["BCOV"], &["MERS"], Some(labels.as_slice())).unwrap().unwrap();
        assert_eq!(m.confusion_matrix.shape(), &[3, 3]);
        assert_eq!(m.confusion_matrix[[1, 0]], 1);
        assert!(m.confusion_table().contains("HKU1"));
    }

    #[test]
    fn empty_evaluation_has_no_metrics() {
        let empty: [&str; 0] = [];
        assert!(Metrics::compute(&empty, &empty, None).unwrap().is_none());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(Metrics::compute(&["A"], &["A", "B"], None).is_err());
    }
}

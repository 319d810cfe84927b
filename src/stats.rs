use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::PerturboError;

/// Confusion matrix over the full class catalog.
///
/// Rows are reference classes, columns are predicted classes, both in
/// catalog order. Classes absent from a particular test split keep their
/// all-zero rows so matrices from different repeats stay comparable.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    counts: Array2<u64>,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from parallel index slices.
    ///
    /// # Arguments
    ///
    /// * `classes` - The class catalog; indices refer into this list.
    /// * `reference` - True class index per test row.
    /// * `predicted` - Predicted class index per test row.
    ///
    /// # Returns
    ///
    /// The counts table, or a `Data` error when the slices disagree in
    /// length or an index falls outside the catalog.
    pub fn from_indices(
        classes: &[String],
        reference: &[usize],
        predicted: &[usize],
    ) -> Result<ConfusionMatrix, PerturboError> {
        if reference.len() != predicted.len() {
            return Err(PerturboError::Data(format!(
                "confusion matrix needs matching lengths, got {} reference and {} predicted",
                reference.len(),
                predicted.len()
            )));
        }
        let n = classes.len();
        let mut counts = Array2::zeros((n, n));
        for (&r, &p) in reference.iter().zip(predicted.iter()) {
            if r >= n || p >= n {
                return Err(PerturboError::Data(format!(
                    "class index out of range: reference {} predicted {} with {} classes",
                    r, p, n
                )));
            }
            counts[(r, p)] += 1;
        }
        Ok(ConfusionMatrix {
            classes: classes.to_vec(),
            counts,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    fn true_positives(&self, class: usize) -> u64 {
        self.counts[(class, class)]
    }

    fn predicted_total(&self, class: usize) -> u64 {
        self.counts.column(class).sum()
    }

    fn reference_total(&self, class: usize) -> u64 {
        self.counts.row(class).sum()
    }

    /// Precision for one class. An undefined 0/0 ratio coerces to 0.
    pub fn precision(&self, class: usize) -> f64 {
        ratio_or_zero(self.true_positives(class), self.predicted_total(class))
    }

    /// Recall for one class. An undefined 0/0 ratio coerces to 0.
    pub fn recall(&self, class: usize) -> f64 {
        ratio_or_zero(self.true_positives(class), self.reference_total(class))
    }

    /// Per-class F1, the harmonic mean of precision and recall. When both
    /// are zero the score coerces to 0 rather than NaN.
    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Unweighted mean F1 over every catalog class, including classes with
    /// no rows in this split (they contribute 0).
    pub fn macro_f1(&self) -> f64 {
        let n = self.classes.len();
        if n == 0 {
            return 0.0;
        }
        (0..n).map(|c| self.f1(c)).sum::<f64>() / n as f64
    }
}

fn ratio_or_zero(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

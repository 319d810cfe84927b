//! Data structures and helpers for marker datasets.
//!
//! This module defines `MarkerDataset`, the labeled-plus-unlabeled feature
//! table consumed by optimization and classification, and the stratified
//! splitting helpers used by the nested resampling loop.
use log::{debug, info};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::PerturboError;

/// Label marking a row whose class is still to be predicted.
pub const UNKNOWN_LABEL: &str = "unknown";

/// A feature table with one class label per row, where rows labeled
/// [`UNKNOWN_LABEL`] are the ones classification will assign.
///
/// The class catalog is derived once at construction, in first-appearance
/// order over the labeled rows, and every downstream score table and
/// confusion matrix uses that order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MarkerDataset {
    /// Feature (column) names.
    pub feature_names: Vec<String>,
    /// Feature matrix, one row per item.
    pub x: Array2<f64>,
    /// Per-row class label, [`UNKNOWN_LABEL`] for rows to classify.
    pub labels: Vec<String>,
    /// Per-row identifier carried through to output tables.
    pub row_ids: Vec<String>,
    /// Class catalog in first-appearance order of the labeled rows.
    pub classes: Vec<String>,
    /// Human-readable processing history.
    pub processing: Vec<String>,
}

impl MarkerDataset {
    /// Build a dataset and derive its class catalog.
    ///
    /// # Arguments
    ///
    /// * `feature_names` - One name per feature column.
    /// * `x` - Feature matrix, one row per item.
    /// * `labels` - Class label per row, [`UNKNOWN_LABEL`] for unassigned rows.
    /// * `row_ids` - Identifier per row, carried into output tables.
    ///
    /// # Returns
    ///
    /// The dataset, or a `Data` error for mismatched lengths, non-finite
    /// feature values, or a table with no labeled rows at all.
    pub fn new(
        feature_names: Vec<String>,
        x: Array2<f64>,
        labels: Vec<String>,
        row_ids: Vec<String>,
    ) -> Result<MarkerDataset, PerturboError> {
        if labels.len() != x.nrows() {
            return Err(PerturboError::Data(format!(
                "{} labels for {} rows",
                labels.len(),
                x.nrows()
            )));
        }
        if row_ids.len() != x.nrows() {
            return Err(PerturboError::Data(format!(
                "{} row ids for {} rows",
                row_ids.len(),
                x.nrows()
            )));
        }
        if feature_names.len() != x.ncols() {
            return Err(PerturboError::Data(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        for (i, row) in x.outer_iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(PerturboError::Data(format!(
                        "non-finite value {} in row {} feature {}",
                        value, row_ids[i], feature_names[j]
                    )));
                }
            }
        }

        let mut classes: Vec<String> = Vec::new();
        for label in &labels {
            if label != UNKNOWN_LABEL && !classes.contains(label) {
                classes.push(label.clone());
            }
        }
        if classes.is_empty() {
            return Err(PerturboError::Data(
                "dataset has no labeled rows".to_string(),
            ));
        }

        Ok(MarkerDataset {
            feature_names,
            x,
            labels,
            row_ids,
            classes,
            processing: Vec::new(),
        })
    }

    /// Row indices carrying a known class label.
    pub fn labeled_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() != UNKNOWN_LABEL)
            .map(|(i, _)| i)
            .collect()
    }

    /// Row indices still labeled [`UNKNOWN_LABEL`].
    pub fn unlabeled_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == UNKNOWN_LABEL)
            .map(|(i, _)| i)
            .collect()
    }

    fn class_members(&self, class: &str) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == class)
            .map(|(i, _)| i)
            .collect()
    }

    /// Labeled row count per catalog class, in catalog order.
    pub fn class_counts(&self) -> Vec<usize> {
        self.classes
            .iter()
            .map(|class| self.class_members(class).len())
            .collect()
    }

    /// Catalog position of a label, `None` for unknown or foreign labels.
    pub fn class_index(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    /// New dataset containing the given rows, in the given order.
    ///
    /// The class catalog is carried over unchanged so score-table columns
    /// stay aligned across subsets.
    pub fn select(&self, indices: &[usize]) -> MarkerDataset {
        MarkerDataset {
            feature_names: self.feature_names.clone(),
            x: self.x.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
            classes: self.classes.clone(),
            processing: self.processing.clone(),
        }
    }

    /// Feature rows and catalog class indices for the given labeled rows.
    ///
    /// Passing an unlabeled row is a caller bug and produces a `Data` error.
    pub fn training_arrays(
        &self,
        rows: &[usize],
    ) -> Result<(Array2<f64>, Vec<usize>), PerturboError> {
        let mut class_indices = Vec::with_capacity(rows.len());
        for &row in rows {
            match self.class_index(&self.labels[row]) {
                Some(idx) => class_indices.push(idx),
                None => {
                    return Err(PerturboError::Data(format!(
                        "row {} has no class label",
                        self.row_ids[row]
                    )))
                }
            }
        }
        Ok((self.x.select(Axis(0), rows), class_indices))
    }

    /// Split the labeled rows into outer train and test sets, stratified by
    /// class.
    ///
    /// Each class contributes `ceil(count * test_fraction)` test rows,
    /// sampled without replacement. Both returned index lists refer to the
    /// original row numbering and are sorted ascending.
    pub fn stratified_holdout(
        &self,
        rng: &mut StdRng,
        test_fraction: f64,
    ) -> Result<(Vec<usize>, Vec<usize>), PerturboError> {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for class in &self.classes {
            let mut members = self.class_members(class);
            let n_test = ((members.len() as f64) * test_fraction).ceil() as usize;
            if n_test >= members.len() {
                return Err(PerturboError::Data(format!(
                    "class {} has {} labeled rows and all of them would land in the test split",
                    class,
                    members.len()
                )));
            }
            members.shuffle(rng);
            test.extend_from_slice(&members[..n_test]);
            train.extend_from_slice(&members[n_test..]);
        }
        train.sort_unstable();
        test.sort_unstable();
        Ok((train, test))
    }

    /// Partition the given labeled rows into `k` folds, stratified by class.
    ///
    /// Members of each class are shuffled and dealt round-robin, so per-class
    /// fold sizes differ by at most one.
    pub fn stratified_folds(&self, rng: &mut StdRng, k: usize, rows: &[usize]) -> Vec<Vec<usize>> {
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
        for class in &self.classes {
            let mut members: Vec<usize> = rows
                .iter()
                .copied()
                .filter(|&row| self.labels[row].as_str() == class.as_str())
                .collect();
            members.shuffle(rng);
            for (position, row) in members.into_iter().enumerate() {
                folds[position % k].push(row);
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }
        folds
    }

    /// Log row, feature and per-class counts at info level.
    pub fn log_summary(&self) {
        info!(
            "dataset: {} rows ({} labeled, {} unknown), {} features, {} classes",
            self.x.nrows(),
            self.labeled_indices().len(),
            self.unlabeled_indices().len(),
            self.feature_names.len(),
            self.classes.len()
        );
        for (class, count) in self.classes.iter().zip(self.class_counts()) {
            debug!("class {}: {} labeled rows", class, count);
        }
    }
}

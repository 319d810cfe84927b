//! The PerTurbo kernel classifier.
//!
//! Each class is summarized by the inverted Gaussian kernel matrix of its
//! training rows. A query row is scored against class `c` as
//! `k^T K_c^-1 k`, where `k` holds the query's kernel similarities to the
//! class rows. Scores live in [0, 1] and a row sitting on the class
//! manifold scores near 1.
use std::fmt;

use log::{debug, warn};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{check_strategy_pairing, InversionMethod, RegularizationMethod};
use crate::error::PerturboError;
use crate::math::kernel::{gaussian, kernel_matrix, kernel_vector};
use crate::math::linalg::regularized_inverse;

/// Hyperparameters of one trained model.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PerturboParams {
    /// Gaussian kernel bandwidth.
    pub sigma: f64,
    /// Regularization strength, or spectrum fraction for trunc.
    pub regul: f64,
    pub inversion: InversionMethod,
    pub regularization: RegularizationMethod,
}

impl fmt::Display for PerturboParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "sigma={}, regul={}, inversion={}, regularization={}",
            self.sigma, self.regul, self.inversion, self.regularization
        )
    }
}

/// Training state for one class.
#[derive(Debug, Clone)]
struct ClassBlock {
    label: String,
    rows: Array2<f64>,
    inv_kernel: Array2<f64>,
}

/// A fitted PerTurbo model over a fixed class catalog.
#[derive(Debug, Clone)]
pub struct PerturboModel {
    classes: Vec<String>,
    blocks: Vec<ClassBlock>,
    params: PerturboParams,
}

impl PerturboModel {
    /// Train a model by building and inverting one kernel matrix per class.
    ///
    /// # Arguments
    ///
    /// * `x` - Training feature rows.
    /// * `y` - Catalog class index per training row.
    /// * `classes` - The class catalog; every class needs at least one row.
    /// * `params` - Hyperparameters, checked against the pairing table first.
    ///
    /// # Returns
    ///
    /// The fitted model, or a `Configuration`/`Data`/`Numerical` error.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[usize],
        classes: &[String],
        params: PerturboParams,
    ) -> Result<PerturboModel, PerturboError> {
        Self::fit_with_kernel(x, y, classes, params, &gaussian)
    }

    /// [`PerturboModel::fit`] with a caller-supplied kernel function.
    ///
    /// Scoring must then go through [`PerturboModel::score_matrix_with_kernel`]
    /// with the same function.
    pub fn fit_with_kernel<F>(
        x: ArrayView2<f64>,
        y: &[usize],
        classes: &[String],
        params: PerturboParams,
        kernel: &F,
    ) -> Result<PerturboModel, PerturboError>
    where
        F: Fn(ArrayView1<f64>, ArrayView1<f64>, f64) -> f64,
    {
        check_strategy_pairing(params.inversion, params.regularization)?;
        if y.len() != x.nrows() {
            return Err(PerturboError::Data(format!(
                "{} class indices for {} training rows",
                y.len(),
                x.nrows()
            )));
        }
        if !params.sigma.is_finite() || params.sigma <= 0.0 {
            return Err(PerturboError::Configuration(format!(
                "sigma must be finite and positive, got {}",
                params.sigma
            )));
        }
        if !params.regul.is_finite() || params.regul <= 0.0 {
            return Err(PerturboError::Configuration(format!(
                "regul must be finite and positive, got {}",
                params.regul
            )));
        }
        if params.regularization == RegularizationMethod::Trunc && params.regul > 1.0 {
            return Err(PerturboError::Configuration(format!(
                "trunc regularization keeps a fraction of the spectrum, so regul must be at most 1.0, got {}",
                params.regul
            )));
        }

        let mut params = params;
        if params.regularization == RegularizationMethod::None && params.regul != 1.0 {
            warn!(
                "regularization is none; ignoring regul={} and using 1.0",
                params.regul
            );
            params.regul = 1.0;
        }

        let mut blocks = Vec::with_capacity(classes.len());
        for (class_idx, label) in classes.iter().enumerate() {
            let member_rows: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &class)| class == class_idx)
                .map(|(i, _)| i)
                .collect();
            if member_rows.is_empty() {
                return Err(PerturboError::Data(format!(
                    "class {} has no training rows",
                    label
                )));
            }
            let rows = x.select(Axis(0), &member_rows);
            let k = kernel_matrix(rows.view(), params.sigma, kernel);
            let inv_kernel = regularized_inverse(
                &k,
                params.inversion,
                params.regularization,
                params.sigma,
                params.regul,
            )?;
            debug!(
                "class {}: kernel of {} rows inverted",
                label,
                member_rows.len()
            );
            blocks.push(ClassBlock {
                label: label.clone(),
                rows,
                inv_kernel,
            });
        }

        Ok(PerturboModel {
            classes: classes.to_vec(),
            blocks,
            params,
        })
    }

    /// Score every row of `x` against every class.
    ///
    /// Entry `(i, c)` is the perturbation score of row `i` under class `c`,
    /// clamped into [0, 1]. Columns follow the catalog order given at fit
    /// time.
    pub fn score_matrix(&self, x: ArrayView2<f64>) -> Array2<f64> {
        self.score_matrix_with_kernel(x, &gaussian)
    }

    /// [`PerturboModel::score_matrix`] with the kernel function the model
    /// was fitted with.
    pub fn score_matrix_with_kernel<F>(&self, x: ArrayView2<f64>, kernel: &F) -> Array2<f64>
    where
        F: Fn(ArrayView1<f64>, ArrayView1<f64>, f64) -> f64,
    {
        let mut scores = Array2::zeros((x.nrows(), self.blocks.len()));
        for (i, row) in x.outer_iter().enumerate() {
            for (c, block) in self.blocks.iter().enumerate() {
                let k = kernel_vector(block.rows.view(), row, self.params.sigma, kernel);
                let ak = block.inv_kernel.dot(&k);
                scores[(i, c)] = k.dot(&ak).clamp(0.0, 1.0);
            }
        }
        scores
    }

    /// Predicted catalog class index per row of `x`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Vec<usize> {
        predict_from_scores(&self.score_matrix(x))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn params(&self) -> &PerturboParams {
        &self.params
    }

    /// Training row count per class, in catalog order.
    pub fn class_sizes(&self) -> Vec<usize> {
        self.blocks.iter().map(|block| block.rows.nrows()).collect()
    }

    /// Label of the class at a catalog position.
    pub fn class_label(&self, index: usize) -> &str {
        &self.blocks[index].label
    }
}

/// Per-row argmax over a score table. Only a strictly greater score replaces
/// the current best, so ties resolve to the earlier catalog class.
pub fn predict_from_scores(scores: &Array2<f64>) -> Vec<usize> {
    scores
        .outer_iter()
        .map(|row| {
            let mut best = 0;
            for (c, &value) in row.iter().enumerate() {
                if value > row[best] {
                    best = c;
                }
            }
            best
        })
        .collect()
}

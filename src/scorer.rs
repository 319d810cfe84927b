//! Grid evaluation of hyperparameter combinations on one train/validation
//! split, and the per-fold score tables it produces.
use log::trace;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::{FoldReducer, InversionMethod, RegularizationMethod, SearchGrid, TieBreak};
use crate::error::PerturboError;
use crate::models::perturbo::{PerturboModel, PerturboParams};
use crate::stats::ConfusionMatrix;

/// Macro-F1 per grid cell for one train/validation split.
///
/// Rows follow the sigma axis and columns the regul axis, both in grid
/// order, which makes tie-breaking between equal cells deterministic.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    pub sigma: Vec<f64>,
    pub regul: Vec<f64>,
    pub scores: Array2<f64>,
}

impl ScoreMatrix {
    /// Cell with the highest score, as (sigma index, regul index).
    ///
    /// `FirstSeen` keeps the first maximum in row-major order;
    /// `HighestRegularization` prefers the largest regul value among tied
    /// cells, falling back to first-seen within equal regul.
    pub fn best_cell(&self, tie_break: TieBreak) -> (usize, usize) {
        let mut best = (0, 0);
        for i in 0..self.scores.nrows() {
            for j in 0..self.scores.ncols() {
                let better = match tie_break {
                    TieBreak::FirstSeen => self.scores[(i, j)] > self.scores[best],
                    TieBreak::HighestRegularization => {
                        self.scores[(i, j)] > self.scores[best]
                            || (self.scores[(i, j)] == self.scores[best]
                                && self.regul[j] > self.regul[best.1])
                    }
                };
                if better {
                    best = (i, j);
                }
            }
        }
        best
    }

    /// Sigma value, regul value and score of the best cell.
    pub fn best_values(&self, tie_break: TieBreak) -> (f64, f64, f64) {
        let (i, j) = self.best_cell(tie_break);
        (self.sigma[i], self.regul[j], self.scores[(i, j)])
    }
}

/// Collapse per-fold score matrices cell-wise into one summary matrix.
///
/// All matrices must cover the same grid; the reducer runs once per cell
/// over the fold values.
pub fn summarize(folds: &[ScoreMatrix], reducer: FoldReducer) -> Result<ScoreMatrix, PerturboError> {
    let first = folds.first().ok_or_else(|| {
        PerturboError::Data("no fold score matrices to summarize".to_string())
    })?;
    for fold in &folds[1..] {
        if fold.sigma != first.sigma || fold.regul != first.regul {
            return Err(PerturboError::Data(
                "fold score matrices cover different grids".to_string(),
            ));
        }
    }

    let mut scores = Array2::zeros(first.scores.dim());
    let mut cell = Vec::with_capacity(folds.len());
    for i in 0..scores.nrows() {
        for j in 0..scores.ncols() {
            cell.clear();
            cell.extend(folds.iter().map(|fold| fold.scores[(i, j)]));
            scores[(i, j)] = reducer.reduce(&cell);
        }
    }
    Ok(ScoreMatrix {
        sigma: first.sigma.clone(),
        regul: first.regul.clone(),
        scores,
    })
}

/// Evaluate the full grid on one train/validation split.
///
/// Fits one model per (sigma, regul) cell on the training rows and scores
/// it on the validation rows with macro F1 over the full catalog. A failed
/// cell aborts the whole call with its `Numerical` error.
#[allow(clippy::too_many_arguments)]
pub fn score_grid(
    train_x: ArrayView2<f64>,
    train_y: &[usize],
    val_x: ArrayView2<f64>,
    val_y: &[usize],
    classes: &[String],
    grid: &SearchGrid,
    inversion: InversionMethod,
    regularization: RegularizationMethod,
) -> Result<ScoreMatrix, PerturboError> {
    let mut scores = Array2::zeros((grid.sigma.len(), grid.regul.len()));
    for (i, &sigma) in grid.sigma.iter().enumerate() {
        for (j, &regul) in grid.regul.iter().enumerate() {
            let params = PerturboParams {
                sigma,
                regul,
                inversion,
                regularization,
            };
            let model = PerturboModel::fit(train_x, train_y, classes, params)?;
            let predicted = model.predict(val_x);
            let confusion = ConfusionMatrix::from_indices(classes, val_y, &predicted)?;
            let f1 = confusion.macro_f1();
            trace!("grid cell sigma={} regul={}: macro F1 {:.4}", sigma, regul, f1);
            scores[(i, j)] = f1;
        }
    }
    Ok(ScoreMatrix {
        sigma: grid.sigma.clone(),
        regul: grid.regul.clone(),
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn tied_matrix() -> ScoreMatrix {
        ScoreMatrix {
            sigma: vec![0.5, 1.0],
            regul: vec![0.1, 1.0],
            scores: array![[0.9, 0.9], [0.9, 0.5]],
        }
    }

    #[test]
    fn first_seen_takes_the_earliest_maximum() {
        assert_eq!(tied_matrix().best_cell(TieBreak::FirstSeen), (0, 0));
    }

    #[test]
    fn highest_regularization_prefers_larger_regul_among_ties() {
        let matrix = tied_matrix();
        assert_eq!(matrix.best_cell(TieBreak::HighestRegularization), (0, 1));
        let (sigma, regul, score) = matrix.best_values(TieBreak::HighestRegularization);
        assert_eq!(sigma, 0.5);
        assert_eq!(regul, 1.0);
        assert_eq!(score, 0.9);
    }

    #[test]
    fn summarize_applies_the_reducer_cell_wise() {
        let fold_a = ScoreMatrix {
            sigma: vec![1.0],
            regul: vec![0.1, 1.0],
            scores: array![[0.8, 0.2]],
        };
        let fold_b = ScoreMatrix {
            sigma: vec![1.0],
            regul: vec![0.1, 1.0],
            scores: array![[0.6, 0.4]],
        };
        let folds = vec![fold_a, fold_b];

        let mean = summarize(&folds, FoldReducer::Mean).unwrap();
        assert!((mean.scores[(0, 0)] - 0.7).abs() < 1e-12);
        assert!((mean.scores[(0, 1)] - 0.3).abs() < 1e-12);

        let min = summarize(&folds, FoldReducer::Min).unwrap();
        assert_eq!(min.scores[(0, 0)], 0.6);
        let max = summarize(&folds, FoldReducer::Max).unwrap();
        assert_eq!(max.scores[(0, 1)], 0.4);
    }

    #[test]
    fn summarize_rejects_mismatched_grids() {
        let fold_a = ScoreMatrix {
            sigma: vec![1.0],
            regul: vec![0.1],
            scores: array![[0.8]],
        };
        let fold_b = ScoreMatrix {
            sigma: vec![2.0],
            regul: vec![0.1],
            scores: array![[0.6]],
        };
        let result = summarize(&[fold_a, fold_b], FoldReducer::Mean);
        assert!(matches!(result, Err(PerturboError::Data(_))));
    }

    #[test]
    fn summarize_of_nothing_is_an_error() {
        assert!(matches!(
            summarize(&[], FoldReducer::Mean),
            Err(PerturboError::Data(_))
        ));
    }
}

//! The serializable result of a nested-resampling optimization run.
//!
//! Optimization is expensive and typically runs once; the report captures
//! everything needed to audit it and to train the final classifier, so it
//! can be stored and reloaded without redoing any computation.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{FoldReducer, InversionMethod, RegularizationMethod, SearchGrid, TieBreak};
use crate::error::PerturboError;
use crate::models::perturbo::PerturboParams;
use crate::scorer::ScoreMatrix;
use crate::stats::ConfusionMatrix;

/// Everything recorded for one outer repeat.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RepeatResult {
    /// Macro F1 of the refit model on the outer test split.
    pub f1: f64,
    /// Chosen kernel bandwidth.
    pub sigma: f64,
    /// Chosen regularization strength.
    pub regul: f64,
    /// One score matrix per inner fold.
    pub fold_scores: Vec<ScoreMatrix>,
    /// Cell-wise reduction of `fold_scores`.
    pub summary: ScoreMatrix,
    /// Confusion matrix of the refit model on the outer test split.
    pub confusion: ConfusionMatrix,
    /// Original row indices of the outer test split.
    pub test_indices: Vec<usize>,
    /// Outer training row count.
    pub n_train: usize,
    /// Outer test row count.
    pub n_test: usize,
}

/// The resampling design an optimization ran with.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ResamplingDesign {
    pub times: usize,
    pub xval: usize,
    pub test_fraction: f64,
    pub reducer: FoldReducer,
    pub tie_break: TieBreak,
    pub inversion: InversionMethod,
    pub regularization: RegularizationMethod,
    pub grid: SearchGrid,
}

/// Size bookkeeping for the dataset the optimization saw.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_features: usize,
    pub n_labeled: usize,
    pub n_unknown: usize,
    pub classes: Vec<String>,
    pub class_counts: Vec<usize>,
}

/// Complete result of one optimization run: per-repeat results, the design
/// that produced them, dataset bookkeeping, and the master seed used.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub repeats: Vec<RepeatResult>,
    pub design: ResamplingDesign,
    pub dataset: DatasetSummary,
    /// Master seed the run used, whether supplied or generated.
    pub seed: u64,
}

impl OptimizationReport {
    /// Macro F1 per repeat, in repeat order.
    pub fn f1_scores(&self) -> Vec<f64> {
        self.repeats.iter().map(|repeat| repeat.f1).collect()
    }

    pub fn mean_f1(&self) -> f64 {
        if self.repeats.is_empty() {
            return 0.0;
        }
        FoldReducer::Mean.reduce(&self.f1_scores())
    }

    pub fn median_f1(&self) -> f64 {
        if self.repeats.is_empty() {
            return 0.0;
        }
        FoldReducer::Median.reduce(&self.f1_scores())
    }

    /// Hyperparameters to train the final classifier with.
    ///
    /// Picks the (sigma, regul) pair chosen by the most repeats. Pairs tied
    /// on frequency break toward the higher mean F1, then toward first
    /// appearance in repeat order.
    pub fn best_params(&self) -> Result<PerturboParams, PerturboError> {
        if self.repeats.is_empty() {
            return Err(PerturboError::MissingParameter(
                "report contains no repeats to choose hyperparameters from".to_string(),
            ));
        }

        // Keyed by bit pattern so distinct f64 values never collide; vector
        // order preserves first appearance for the final tie-break.
        struct Candidate {
            key: (u64, u64),
            sigma: f64,
            regul: f64,
            count: usize,
            f1_total: f64,
        }
        let mut candidates: Vec<Candidate> = Vec::new();
        for repeat in &self.repeats {
            let key = (repeat.sigma.to_bits(), repeat.regul.to_bits());
            match candidates.iter_mut().find(|c| c.key == key) {
                Some(candidate) => {
                    candidate.count += 1;
                    candidate.f1_total += repeat.f1;
                }
                None => candidates.push(Candidate {
                    key,
                    sigma: repeat.sigma,
                    regul: repeat.regul,
                    count: 1,
                    f1_total: repeat.f1,
                }),
            }
        }

        let mut best = 0;
        for idx in 1..candidates.len() {
            let challenger = &candidates[idx];
            let incumbent = &candidates[best];
            let challenger_mean = challenger.f1_total / challenger.count as f64;
            let incumbent_mean = incumbent.f1_total / incumbent.count as f64;
            if challenger.count > incumbent.count
                || (challenger.count == incumbent.count && challenger_mean > incumbent_mean)
            {
                best = idx;
            }
        }

        Ok(PerturboParams {
            sigma: candidates[best].sigma,
            regul: candidates[best].regul,
            inversion: self.design.inversion,
            regularization: self.design.regularization,
        })
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "nested resampling: {} repeats of {}-fold cross-validation, {:.0}% test per class",
            self.design.times,
            self.design.xval,
            self.design.test_fraction * 100.0
        )?;
        writeln!(
            f,
            "grid: {} sigma x {} regul values, {} inversion, {} regularization",
            self.design.grid.sigma.len(),
            self.design.grid.regul.len(),
            self.design.inversion,
            self.design.regularization
        )?;
        writeln!(f, "seed: {}", self.seed)?;
        write!(
            f,
            "macro F1 over {} repeats: mean {:.4}, median {:.4}",
            self.repeats.len(),
            self.mean_f1(),
            self.median_f1()
        )
    }
}

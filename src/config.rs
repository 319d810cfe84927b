use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use itertools_num::linspace;
use log::warn;

use crate::error::PerturboError;

/// Strategy used to invert (or pseudo-invert) each per-class kernel matrix.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InversionMethod {
    Cholesky,
    MoorePenrose,
    Solve,
    Svd,
}

impl fmt::Display for InversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            InversionMethod::Cholesky => "cholesky",
            InversionMethod::MoorePenrose => "moore_penrose",
            InversionMethod::Solve => "solve",
            InversionMethod::Svd => "svd",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InversionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cholesky" => Ok(InversionMethod::Cholesky),
            "moore_penrose" | "moore-penrose" => Ok(InversionMethod::MoorePenrose),
            "solve" => Ok(InversionMethod::Solve),
            "svd" => Ok(InversionMethod::Svd),
            _ => Err(format!(
                "Unknown inversion method: {}. Expected one of: cholesky, moore_penrose, solve, svd",
                s
            )),
        }
    }
}

/// How the kernel matrix is conditioned before inversion.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegularizationMethod {
    /// No adjustment. The regularization axis is forced to the single value 1.0.
    None,
    /// Add p times the identity to the kernel matrix before inverting.
    Tikhonov,
    /// Keep the top p-fraction of singular values, zero the rest. Requires SVD.
    Trunc,
}

impl fmt::Display for RegularizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RegularizationMethod::None => "none",
            RegularizationMethod::Tikhonov => "tikhonov",
            RegularizationMethod::Trunc => "trunc",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RegularizationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RegularizationMethod::None),
            "tikhonov" => Ok(RegularizationMethod::Tikhonov),
            "trunc" => Ok(RegularizationMethod::Trunc),
            _ => Err(format!(
                "Unknown regularization method: {}. Expected one of: none, tikhonov, trunc",
                s
            )),
        }
    }
}

/// Reject invalid (inversion, regularization) pairings before any matrix work.
///
/// Truncated-spectrum regularization rewrites the singular values directly, so
/// it is only meaningful with SVD inversion. Every other pairing is valid.
pub fn check_strategy_pairing(
    inversion: InversionMethod,
    regularization: RegularizationMethod,
) -> Result<(), PerturboError> {
    match (inversion, regularization) {
        (InversionMethod::Svd, _) => Ok(()),
        (other, RegularizationMethod::Trunc) => Err(PerturboError::Configuration(format!(
            "trunc regularization requires svd inversion, got {}",
            other
        ))),
        _ => Ok(()),
    }
}

/// Hyperparameter grid: kernel bandwidth values crossed with regularization
/// strengths. Axis order is preserved everywhere downstream, so tie-breaking
/// between equal-scoring cells is deterministic.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SearchGrid {
    pub sigma: Vec<f64>,
    pub regul: Vec<f64>,
}

impl SearchGrid {
    pub fn new(sigma: Vec<f64>, regul: Vec<f64>) -> Self {
        Self { sigma, regul }
    }

    /// `n` values evenly spaced in log10 between `10^lo` and `10^hi` inclusive.
    pub fn log10_axis(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        linspace(lo, hi, n).map(|e| 10f64.powf(e)).collect()
    }

    /// `n` values evenly spaced in log2 between `2^lo` and `2^hi` inclusive.
    pub fn log2_axis(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        linspace(lo, hi, n).map(|e| 2f64.powf(e)).collect()
    }

    /// Check both axes are non-empty, finite and strictly positive, and that
    /// truncation fractions stay within (0, 1].
    pub fn validate(&self, regularization: RegularizationMethod) -> Result<(), PerturboError> {
        if self.sigma.is_empty() {
            return Err(PerturboError::Configuration(
                "sigma grid axis is empty".to_string(),
            ));
        }
        if self.regul.is_empty() {
            return Err(PerturboError::Configuration(
                "regul grid axis is empty".to_string(),
            ));
        }
        for &s in &self.sigma {
            if !s.is_finite() || s <= 0.0 {
                return Err(PerturboError::Configuration(format!(
                    "sigma grid values must be finite and positive, got {}",
                    s
                )));
            }
        }
        for &p in &self.regul {
            if !p.is_finite() || p <= 0.0 {
                return Err(PerturboError::Configuration(format!(
                    "regul grid values must be finite and positive, got {}",
                    p
                )));
            }
            if regularization == RegularizationMethod::Trunc && p > 1.0 {
                return Err(PerturboError::Configuration(format!(
                    "trunc regularization keeps a fraction of the spectrum, so regul must be at most 1.0, got {}",
                    p
                )));
            }
        }
        Ok(())
    }
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            sigma: SearchGrid::log10_axis(-1.0, 1.0, 3),
            regul: SearchGrid::log2_axis(-2.0, 2.0, 3),
        }
    }
}

/// How the per-fold score matrices are collapsed cell-wise into one summary.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FoldReducer {
    Mean,
    Median,
    Min,
    Max,
}

impl Default for FoldReducer {
    fn default() -> Self {
        FoldReducer::Mean
    }
}

impl FoldReducer {
    /// Collapse one grid cell's per-fold scores. `values` must be non-empty.
    pub fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            FoldReducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            FoldReducer::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            FoldReducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            FoldReducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Which grid cell wins when several tie at the maximum summary score.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First tied cell in row-major (sigma-outer, regul-inner) order.
    FirstSeen,
    /// Among tied cells, the one with the largest regularization value.
    HighestRegularization,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::FirstSeen
    }
}

/// How much score detail the final classification attaches to each row.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoresMode {
    /// Predictions only.
    None,
    /// One score per row: the score of the predicted class.
    Prediction,
    /// The full per-class score table.
    All,
}

impl Default for ScoresMode {
    fn default() -> Self {
        ScoresMode::Prediction
    }
}

/// Full configuration of one nested-resampling optimization run.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OptimizationConfig {
    pub grid: SearchGrid,
    pub inversion: InversionMethod,
    pub regularization: RegularizationMethod,
    /// Number of outer hold-out repeats.
    pub times: usize,
    /// Number of inner cross-validation folds per repeat.
    pub xval: usize,
    /// Fraction of each class held out as the outer test set.
    pub test_fraction: f64,
    pub reducer: FoldReducer,
    pub tie_break: TieBreak,
    /// Master seed. Auto-generated and recorded in the report when absent.
    pub seed: Option<u64>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            grid: SearchGrid::default(),
            inversion: InversionMethod::Cholesky,
            regularization: RegularizationMethod::Tikhonov,
            times: 50,
            xval: 5,
            test_fraction: 0.2,
            reducer: FoldReducer::default(),
            tie_break: TieBreak::default(),
            seed: None,
        }
    }
}

impl OptimizationConfig {
    /// Reject inconsistent settings before any data is touched.
    pub fn validate(&self) -> Result<(), PerturboError> {
        check_strategy_pairing(self.inversion, self.regularization)?;
        self.grid.validate(self.regularization)?;
        if self.times < 1 {
            return Err(PerturboError::Configuration(
                "times must be at least 1".to_string(),
            ));
        }
        if self.xval < 2 {
            return Err(PerturboError::Configuration(format!(
                "xval must be at least 2, got {}",
                self.xval
            )));
        }
        if !self.test_fraction.is_finite()
            || self.test_fraction <= 0.0
            || self.test_fraction >= 1.0
        {
            return Err(PerturboError::Configuration(format!(
                "test_fraction must lie strictly between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }

    /// Validate, then apply the one lossy normalization: without
    /// regularization the regul axis is meaningless, so it collapses to the
    /// single value 1.0 and the caller is warned rather than failed.
    pub fn normalized(&self) -> Result<OptimizationConfig, PerturboError> {
        self.validate()?;
        let mut normalized = self.clone();
        if normalized.regularization == RegularizationMethod::None
            && normalized.grid.regul != vec![1.0]
        {
            warn!(
                "regularization is none; ignoring the {} configured regul values and using 1.0",
                normalized.grid.regul.len()
            );
            normalized.grid.regul = vec![1.0];
        }
        Ok(normalized)
    }
}

//! Nested resampling: the outer repeat loop, inner cross-validation, grid
//! search per fold, and assembly of the optimization report.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::OptimizationConfig;
use crate::data_handling::MarkerDataset;
use crate::error::PerturboError;
use crate::models::perturbo::{PerturboModel, PerturboParams};
use crate::report::{DatasetSummary, OptimizationReport, RepeatResult, ResamplingDesign};
use crate::scorer::{score_grid, summarize};
use crate::stats::ConfusionMatrix;

/// Runs the nested resampling loop and assembles the report.
///
/// Outer repeats are embarrassingly parallel: each derives its own RNG
/// stream from the master seed and touches no shared state beyond a
/// progress counter, so the report is bit-identical however the thread
/// pool schedules them.
pub struct NestedOptimizer {
    config: OptimizationConfig,
    progress: Arc<AtomicUsize>,
}

impl NestedOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        NestedOptimizer {
            config,
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Completed inner-fold grid searches so far. One unit per
    /// (repeat, fold) pair; a full run counts `times * xval` units.
    pub fn completed_units(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Run the full nested optimization over the labeled rows of `dataset`.
    ///
    /// Configuration and dataset shape problems fail fast before any repeat
    /// starts; numeric failures inside a repeat abort the run wrapped in
    /// `RepeatFailed` with the offending repeat and fold.
    pub fn optimize(&self, dataset: &MarkerDataset) -> Result<OptimizationReport, PerturboError> {
        let config = self.config.normalized()?;

        if dataset.classes.len() < 2 {
            return Err(PerturboError::Data(format!(
                "optimization needs at least 2 classes, found {}",
                dataset.classes.len()
            )));
        }
        // Every class must keep at least 2 training rows after the outer
        // hold-out, or some inner fold would see the class empty.
        for (class, count) in dataset.classes.iter().zip(dataset.class_counts()) {
            let n_test = ((count as f64) * config.test_fraction).ceil() as usize;
            if count.saturating_sub(n_test) < 2 {
                return Err(PerturboError::Data(format!(
                    "class {} has {} labeled rows, leaving fewer than 2 to train on after holding out {}",
                    class, count, n_test
                )));
            }
        }

        let seed = config.seed.unwrap_or_else(rand::random::<u64>);
        info!(
            "starting optimization: {} repeats of {}-fold cross-validation over {} grid cells, seed {}",
            config.times,
            config.xval,
            config.grid.sigma.len() * config.grid.regul.len(),
            seed
        );
        self.progress.store(0, Ordering::Relaxed);

        let repeats: Vec<RepeatResult> = (0..config.times)
            .into_par_iter()
            .map(|repeat| self.run_repeat(dataset, &config, seed, repeat))
            .collect::<Result<Vec<_>, PerturboError>>()?;

        let report = OptimizationReport {
            repeats,
            design: ResamplingDesign {
                times: config.times,
                xval: config.xval,
                test_fraction: config.test_fraction,
                reducer: config.reducer,
                tie_break: config.tie_break,
                inversion: config.inversion,
                regularization: config.regularization,
                grid: config.grid.clone(),
            },
            dataset: DatasetSummary {
                n_rows: dataset.x.nrows(),
                n_features: dataset.x.ncols(),
                n_labeled: dataset.labeled_indices().len(),
                n_unknown: dataset.unlabeled_indices().len(),
                classes: dataset.classes.clone(),
                class_counts: dataset.class_counts(),
            },
            seed,
        };
        info!(
            "optimization finished: mean macro F1 {:.4} over {} repeats",
            report.mean_f1(),
            report.repeats.len()
        );
        Ok(report)
    }

    /// One outer repeat: hold-out split, inner k-fold grid search, summary,
    /// best-cell selection, refit, and test scoring.
    fn run_repeat(
        &self,
        dataset: &MarkerDataset,
        config: &OptimizationConfig,
        master_seed: u64,
        repeat: usize,
    ) -> Result<RepeatResult, PerturboError> {
        let mut rng = StdRng::seed_from_u64(sub_seed(master_seed, repeat));

        let (train_rows, test_rows) = dataset
            .stratified_holdout(&mut rng, config.test_fraction)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let folds = dataset.stratified_folds(&mut rng, config.xval, &train_rows);

        let mut fold_scores = Vec::with_capacity(config.xval);
        for (fold_idx, fold) in folds.iter().enumerate() {
            let training: Vec<usize> = train_rows
                .iter()
                .copied()
                .filter(|row| !fold.contains(row))
                .collect();
            let (train_x, train_y) = dataset
                .training_arrays(&training)
                .map_err(|e| e.in_repeat(repeat, Some(fold_idx)))?;
            let (val_x, val_y) = dataset
                .training_arrays(fold)
                .map_err(|e| e.in_repeat(repeat, Some(fold_idx)))?;
            let matrix = score_grid(
                train_x.view(),
                &train_y,
                val_x.view(),
                &val_y,
                &dataset.classes,
                &config.grid,
                config.inversion,
                config.regularization,
            )
            .map_err(|e| e.in_repeat(repeat, Some(fold_idx)))?;
            self.progress.fetch_add(1, Ordering::Relaxed);
            fold_scores.push(matrix);
        }

        let summary = summarize(&fold_scores, config.reducer)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let (sigma, regul, _) = summary.best_values(config.tie_break);

        // Refit on the full outer training set, score the held-out split.
        let params = PerturboParams {
            sigma,
            regul,
            inversion: config.inversion,
            regularization: config.regularization,
        };
        let (train_x, train_y) = dataset
            .training_arrays(&train_rows)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let (test_x, test_y) = dataset
            .training_arrays(&test_rows)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let model = PerturboModel::fit(train_x.view(), &train_y, &dataset.classes, params)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let predicted = model.predict(test_x.view());
        let confusion = ConfusionMatrix::from_indices(&dataset.classes, &test_y, &predicted)
            .map_err(|e| e.in_repeat(repeat, None))?;
        let f1 = confusion.macro_f1();
        debug!(
            "repeat {}: chose sigma={} regul={}, outer macro F1 {:.4}",
            repeat, sigma, regul, f1
        );

        Ok(RepeatResult {
            f1,
            sigma,
            regul,
            fold_scores,
            summary,
            confusion,
            n_train: train_rows.len(),
            n_test: test_rows.len(),
            test_indices: test_rows,
        })
    }
}

/// One-shot wrapper around [`NestedOptimizer`] for callers that do not need
/// to watch progress.
pub fn optimize(
    dataset: &MarkerDataset,
    config: OptimizationConfig,
) -> Result<OptimizationReport, PerturboError> {
    NestedOptimizer::new(config).optimize(dataset)
}

/// Per-repeat RNG seed, a splitmix64 step away from the master seed.
/// Repeats draw nothing from a shared stream, so they can run in any order.
fn sub_seed(master: u64, repeat: usize) -> u64 {
    let mut z = master.wrapping_add(
        (repeat as u64)
            .wrapping_add(1)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15),
    );
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_seeds_are_deterministic_and_distinct() {
        assert_eq!(sub_seed(42, 0), sub_seed(42, 0));
        assert_ne!(sub_seed(42, 0), sub_seed(42, 1));
        assert_ne!(sub_seed(42, 1), sub_seed(42, 2));
        assert_ne!(sub_seed(42, 0), sub_seed(43, 0));
    }
}

//! Final classification: train on every labeled row with tuned
//! hyperparameters and label the unknown rows.
use chrono::Utc;
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ScoresMode;
use crate::data_handling::MarkerDataset;
use crate::error::PerturboError;
use crate::models::perturbo::{predict_from_scores, PerturboModel, PerturboParams};
use crate::report::OptimizationReport;

/// Where the final classifier gets its hyperparameters.
#[derive(Debug, Clone, Copy)]
pub enum ParamsSource<'a> {
    /// Explicit hyperparameters, tuned elsewhere.
    Explicit(PerturboParams),
    /// The most frequently selected parameters of an optimization report.
    Report(&'a OptimizationReport),
}

impl ParamsSource<'_> {
    fn resolve(&self) -> Result<PerturboParams, PerturboError> {
        match self {
            ParamsSource::Explicit(params) => Ok(*params),
            ParamsSource::Report(report) => report.best_params(),
        }
    }
}

/// The input dataset augmented with predictions and, depending on the
/// scores mode, per-row confidence detail.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ClassifiedDataset {
    /// The dataset, with a provenance note appended to its processing log.
    pub dataset: MarkerDataset,
    /// Predicted (or retained) class label per row.
    pub predictions: Vec<String>,
    /// Score of the predicted class per row, under [`ScoresMode::Prediction`].
    pub prediction_scores: Option<Vec<f64>>,
    /// Full per-class score table, under [`ScoresMode::All`].
    pub class_scores: Option<Array2<f64>>,
    /// Hyperparameters the final model was trained with.
    pub params: PerturboParams,
}

/// Classify the unknown rows of a dataset.
///
/// Trains one model on all labeled rows, then assigns every unknown row the
/// best-scoring catalog class. Labeled rows keep their original class with
/// full confidence, so the output table is a strict augmentation of the
/// input.
///
/// # Arguments
///
/// * `dataset` - The labeled-plus-unknown feature table.
/// * `source` - Explicit hyperparameters or an optimization report.
/// * `scores_mode` - How much score detail the result carries.
///
/// # Returns
///
/// The classified dataset, or the first `Configuration`/`Data`/`Numerical`
/// error hit while resolving parameters or training.
pub fn classify(
    dataset: &MarkerDataset,
    source: ParamsSource,
    scores_mode: ScoresMode,
) -> Result<ClassifiedDataset, PerturboError> {
    let params = source.resolve()?;
    let labeled = dataset.labeled_indices();
    let (train_x, train_y) = dataset.training_arrays(&labeled)?;
    let model = PerturboModel::fit(train_x.view(), &train_y, &dataset.classes, params)?;

    // Score every row once; labeled rows are overridden below.
    let mut table = model.score_matrix(dataset.x.view());
    let predicted_indices = predict_from_scores(&table);

    let n = dataset.x.nrows();
    let mut predictions = Vec::with_capacity(n);
    let mut best_scores = vec![0.0; n];
    for row in 0..n {
        match dataset.class_index(&dataset.labels[row]) {
            Some(class) => {
                predictions.push(dataset.labels[row].clone());
                best_scores[row] = 1.0;
                for c in 0..dataset.classes.len() {
                    table[(row, c)] = if c == class { 1.0 } else { 0.0 };
                }
            }
            None => {
                let class = predicted_indices[row];
                predictions.push(dataset.classes[class].clone());
                best_scores[row] = table[(row, class)];
            }
        }
    }

    info!(
        "classified {} unknown rows ({})",
        dataset.unlabeled_indices().len(),
        params
    );

    let mut classified_dataset = dataset.clone();
    classified_dataset.processing.push(format!(
        "Classified with perTurbo ({}) on {}",
        params,
        Utc::now().to_rfc3339()
    ));

    let (prediction_scores, class_scores) = match scores_mode {
        ScoresMode::None => (None, None),
        ScoresMode::Prediction => (Some(best_scores), None),
        ScoresMode::All => (None, Some(table)),
    };

    Ok(ClassifiedDataset {
        dataset: classified_dataset,
        predictions,
        prediction_scores,
        class_scores,
        params,
    })
}

//! Synthetic marker datasets for demos and tests.
use log::debug;
use ndarray::Array2;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

use crate::data_handling::{MarkerDataset, UNKNOWN_LABEL};
use crate::error::PerturboError;

/// One Gaussian cluster of a synthetic dataset.
#[derive(Debug, Clone)]
pub struct ClusterSpec {
    /// Class label for the labeled rows.
    pub label: String,
    /// Cluster center; its length fixes the feature count.
    pub center: Vec<f64>,
    /// Standard deviation around the center, applied per feature.
    pub spread: f64,
    /// Labeled rows to draw.
    pub n_labeled: usize,
    /// Rows drawn from the same cluster but labeled unknown.
    pub n_unknown: usize,
}

/// Draw a labeled-plus-unknown dataset of Gaussian clusters.
///
/// Feature names are `f1..fd`, row ids `<label>_<i>` for labeled rows and
/// `unknown_<label>_<i>` for unknown ones. Generation is fully determined
/// by `seed`, so two calls with the same specs and seed produce equal
/// datasets.
pub fn gaussian_clusters(specs: &[ClusterSpec], seed: u64) -> Result<MarkerDataset, PerturboError> {
    let first = specs.first().ok_or_else(|| {
        PerturboError::Configuration("no cluster specs given".to_string())
    })?;
    let dim = first.center.len();
    if dim == 0 {
        return Err(PerturboError::Configuration(
            "cluster centers need at least one dimension".to_string(),
        ));
    }
    for spec in specs {
        if spec.center.len() != dim {
            return Err(PerturboError::Configuration(format!(
                "cluster {} has a {}-dimensional center, expected {}",
                spec.label,
                spec.center.len(),
                dim
            )));
        }
        if !spec.spread.is_finite() || spec.spread < 0.0 {
            return Err(PerturboError::Configuration(format!(
                "cluster {} has invalid spread {}",
                spec.label, spec.spread
            )));
        }
    }

    let standard_normal = Normal::new(0.0, 1.0)
        .map_err(|e| PerturboError::Configuration(format!("standard normal: {}", e)))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut values = Vec::new();
    let mut labels = Vec::new();
    let mut row_ids = Vec::new();
    for spec in specs {
        for i in 0..spec.n_labeled {
            for &center in &spec.center {
                values.push(center + spec.spread * standard_normal.sample(&mut rng));
            }
            labels.push(spec.label.clone());
            row_ids.push(format!("{}_{}", spec.label, i + 1));
        }
        for i in 0..spec.n_unknown {
            for &center in &spec.center {
                values.push(center + spec.spread * standard_normal.sample(&mut rng));
            }
            labels.push(UNKNOWN_LABEL.to_string());
            row_ids.push(format!("unknown_{}_{}", spec.label, i + 1));
        }
    }

    let n_rows = labels.len();
    let feature_names = (1..=dim).map(|j| format!("f{}", j)).collect();
    let x = Array2::from_shape_vec((n_rows, dim), values)
        .map_err(|e| PerturboError::Data(e.to_string()))?;
    let mut dataset = MarkerDataset::new(feature_names, x, labels, row_ids)?;
    dataset.processing.push(format!(
        "Simulated {} rows in {} clusters with seed {}",
        n_rows,
        specs.len(),
        seed
    ));
    debug!(
        "generated synthetic dataset: {} rows, {} features, {} classes",
        n_rows,
        dim,
        dataset.classes.len()
    );
    Ok(dataset)
}

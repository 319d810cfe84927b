use anyhow::Result;

use perturbo::config::{InversionMethod, RegularizationMethod};
use perturbo::models::{PerturboModel, PerturboParams};
use perturbo::synthetic::{gaussian_clusters, ClusterSpec};

fn cluster(label: &str, center: [f64; 2]) -> ClusterSpec {
    ClusterSpec {
        label: label.to_string(),
        center: center.to_vec(),
        spread: 0.3,
        n_labeled: 15,
        n_unknown: 4,
    }
}

fn main() -> Result<()> {
    env_logger::init();

    // Three organelle-like clusters with a handful of unassigned rows each.
    let specs = [
        cluster("er", [0.0, 0.0]),
        cluster("golgi", [4.0, 0.0]),
        cluster("pm", [0.0, 4.0]),
    ];
    let dataset = gaussian_clusters(&specs, 7)?;
    dataset.log_summary();

    let labeled = dataset.labeled_indices();
    let (train_x, train_y) = dataset.training_arrays(&labeled)?;
    let params = PerturboParams {
        sigma: 1.0,
        regul: 0.1,
        inversion: InversionMethod::Cholesky,
        regularization: RegularizationMethod::Tikhonov,
    };
    let model = PerturboModel::fit(train_x.view(), &train_y, &dataset.classes, params)?;
    println!(
        "Trained on {} labeled rows, {:?} per class",
        labeled.len(),
        model.class_sizes()
    );

    // Score and label the unassigned rows.
    let unknown = dataset.unlabeled_indices();
    let queries = dataset.select(&unknown);
    let scores = model.score_matrix(queries.x.view());
    let predicted = model.predict(queries.x.view());

    println!("\nper-class scores for the unassigned rows:");
    for (i, row_id) in queries.row_ids.iter().enumerate() {
        let row_scores: Vec<String> = dataset
            .classes
            .iter()
            .enumerate()
            .map(|(c, class)| format!("{}={:.3}", class, scores[(i, c)]))
            .collect();
        println!(
            "  {:<14} {}  -> {}",
            row_id,
            row_scores.join(" "),
            dataset.classes[predicted[i]]
        );
    }

    Ok(())
}

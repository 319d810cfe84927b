use anyhow::{Context, Result};

use perturbo::classifier::{classify, ParamsSource};
use perturbo::config::{OptimizationConfig, ScoresMode, SearchGrid};
use perturbo::io::write_classified_table;
use perturbo::optimizer::NestedOptimizer;
use perturbo::synthetic::{gaussian_clusters, ClusterSpec};

fn cluster(label: &str, center: [f64; 2]) -> ClusterSpec {
    ClusterSpec {
        label: label.to_string(),
        center: center.to_vec(),
        spread: 0.4,
        n_labeled: 20,
        n_unknown: 5,
    }
}

fn main() -> Result<()> {
    env_logger::init();

    // Usage: cargo run --example perturbo_optimization -- [output-csv] [times]
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "classified.csv".to_string());
    let times = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10);

    let specs = [
        cluster("er", [0.0, 0.0]),
        cluster("golgi", [4.0, 0.0]),
        cluster("pm", [0.0, 4.0]),
    ];
    let dataset = gaussian_clusters(&specs, 42)?;
    dataset.log_summary();

    let config = OptimizationConfig {
        grid: SearchGrid::new(
            SearchGrid::log10_axis(-1.0, 1.0, 5),
            SearchGrid::log2_axis(-2.0, 2.0, 5),
        ),
        times,
        seed: Some(42),
        ..OptimizationConfig::default()
    };
    let optimizer = NestedOptimizer::new(config);
    let report = optimizer.optimize(&dataset)?;
    println!("{}", report);
    println!("chosen hyperparameters: {}", report.best_params()?);

    let classified = classify(&dataset, ParamsSource::Report(&report), ScoresMode::Prediction)?;
    write_classified_table(&classified, &output)
        .with_context(|| format!("Failed to write {}", output))?;
    println!("classified table written to {}", output);

    Ok(())
}

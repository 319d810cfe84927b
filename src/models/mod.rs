pub mod perturbo;

pub use perturbo::{predict_from_scores, PerturboModel, PerturboParams};

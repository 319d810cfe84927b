//! perturbo: kernel-based subcellular localisation classification.
//!
//! This crate implements the PerTurbo classifier together with the nested
//! resampling machinery needed to tune it: repeated stratified hold-out
//! around an inner cross-validated grid search over kernel bandwidth and
//! regularization strength, a serializable optimization report, and a final
//! classification pass that labels unknown rows with confidence scores.
//!
//! The typical flow is `io::read_feature_table` (or `synthetic` data) into
//! `optimizer::optimize`, then `classifier::classify` with the resulting
//! report, and `io::write_classified_table` for the augmented output.
pub mod classifier;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod optimizer;
pub mod report;
pub mod scorer;
pub mod stats;
pub mod synthetic;

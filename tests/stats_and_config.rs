//! Integration tests for classification metrics and configuration types.

use perturbo::config::{
    check_strategy_pairing, FoldReducer, InversionMethod, OptimizationConfig,
    RegularizationMethod, ScoresMode, SearchGrid, TieBreak,
};
use perturbo::error::PerturboError;
use perturbo::stats::ConfusionMatrix;

fn classes(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Classification metrics
// ---------------------------------------------------------------------------

#[test]
fn perfect_predictions_score_unit_f1() {
    let catalog = classes(&["a", "b"]);
    let cm = ConfusionMatrix::from_indices(&catalog, &[0, 0, 1, 1], &[0, 0, 1, 1]).unwrap();
    assert_eq!(cm.precision(0), 1.0);
    assert_eq!(cm.recall(1), 1.0);
    assert_eq!(cm.macro_f1(), 1.0);
}

#[test]
fn mixed_predictions_match_hand_computed_f1() {
    let catalog = classes(&["a", "b", "c"]);
    let cm =
        ConfusionMatrix::from_indices(&catalog, &[0, 0, 1, 1, 2, 2], &[0, 1, 1, 1, 2, 0]).unwrap();
    // a: precision 1/2, recall 1/2 -> F1 0.5
    // b: precision 2/3, recall 1   -> F1 0.8
    // c: precision 1,   recall 1/2 -> F1 2/3
    assert!((cm.f1(0) - 0.5).abs() < 1e-12);
    assert!((cm.f1(1) - 0.8).abs() < 1e-12);
    assert!((cm.f1(2) - 2.0 / 3.0).abs() < 1e-12);
    let expected = (0.5 + 0.8 + 2.0 / 3.0) / 3.0;
    assert!((cm.macro_f1() - expected).abs() < 1e-12);
}

#[test]
fn class_absent_from_split_coerces_to_zero() {
    // Catalog has three classes but the split only exercises two; the third
    // has 0/0 precision and recall, which is policy-coerced to 0, not NaN.
    let catalog = classes(&["a", "b", "c"]);
    let cm = ConfusionMatrix::from_indices(&catalog, &[0, 0, 1], &[0, 0, 1]).unwrap();
    assert_eq!(cm.f1(2), 0.0);
    assert!(!cm.macro_f1().is_nan());
    assert!((cm.macro_f1() - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn never_predicted_class_has_zero_precision() {
    let catalog = classes(&["a", "b"]);
    let cm = ConfusionMatrix::from_indices(&catalog, &[0, 1, 1], &[0, 0, 0]).unwrap();
    assert_eq!(cm.precision(1), 0.0);
    assert_eq!(cm.recall(1), 0.0);
    assert_eq!(cm.f1(1), 0.0);
}

#[test]
fn mismatched_lengths_are_a_data_error() {
    let catalog = classes(&["a", "b"]);
    let result = ConfusionMatrix::from_indices(&catalog, &[0, 1], &[0]);
    assert!(matches!(result, Err(PerturboError::Data(_))));
}

#[test]
fn out_of_catalog_index_is_a_data_error() {
    let catalog = classes(&["a", "b"]);
    let result = ConfusionMatrix::from_indices(&catalog, &[0, 2], &[0, 1]);
    assert!(matches!(result, Err(PerturboError::Data(_))));
}

// ---------------------------------------------------------------------------
// Strategy pairing table
// ---------------------------------------------------------------------------

#[test]
fn none_and_tikhonov_pair_with_every_inversion() {
    let inversions = [
        InversionMethod::Cholesky,
        InversionMethod::MoorePenrose,
        InversionMethod::Solve,
        InversionMethod::Svd,
    ];
    for inv in inversions {
        assert!(check_strategy_pairing(inv, RegularizationMethod::None).is_ok());
        assert!(check_strategy_pairing(inv, RegularizationMethod::Tikhonov).is_ok());
    }
}

#[test]
fn trunc_pairs_only_with_svd() {
    assert!(check_strategy_pairing(InversionMethod::Svd, RegularizationMethod::Trunc).is_ok());
    for inv in [
        InversionMethod::Cholesky,
        InversionMethod::MoorePenrose,
        InversionMethod::Solve,
    ] {
        let result = check_strategy_pairing(inv, RegularizationMethod::Trunc);
        assert!(matches!(result, Err(PerturboError::Configuration(_))));
    }
}

// ---------------------------------------------------------------------------
// Search grid
// ---------------------------------------------------------------------------

#[test]
fn log_axes_hit_their_endpoints() {
    let sigma = SearchGrid::log10_axis(-1.0, 1.0, 3);
    assert_eq!(sigma.len(), 3);
    assert!((sigma[0] - 0.1).abs() < 1e-12);
    assert!((sigma[1] - 1.0).abs() < 1e-12);
    assert!((sigma[2] - 10.0).abs() < 1e-12);

    let regul = SearchGrid::log2_axis(-2.0, 2.0, 3);
    assert!((regul[0] - 0.25).abs() < 1e-12);
    assert!((regul[1] - 1.0).abs() < 1e-12);
    assert!((regul[2] - 4.0).abs() < 1e-12);
}

#[test]
fn empty_or_nonpositive_axes_are_rejected() {
    let empty = SearchGrid::new(vec![], vec![1.0]);
    assert!(empty.validate(RegularizationMethod::Tikhonov).is_err());

    let negative = SearchGrid::new(vec![1.0, -0.5], vec![1.0]);
    assert!(negative.validate(RegularizationMethod::Tikhonov).is_err());

    let nan = SearchGrid::new(vec![1.0], vec![f64::NAN]);
    assert!(nan.validate(RegularizationMethod::Tikhonov).is_err());
}

#[test]
fn trunc_limits_regul_to_the_unit_interval() {
    let grid = SearchGrid::new(vec![1.0], vec![0.5, 2.0]);
    // Fine as a Tikhonov strength, invalid as a spectrum fraction.
    assert!(grid.validate(RegularizationMethod::Tikhonov).is_ok());
    assert!(matches!(
        grid.validate(RegularizationMethod::Trunc),
        Err(PerturboError::Configuration(_))
    ));
}

// ---------------------------------------------------------------------------
// Enum parsing and display
// ---------------------------------------------------------------------------

#[test]
fn inversion_method_parses_known_names() {
    let inv: InversionMethod = "cholesky".parse().unwrap();
    assert_eq!(inv, InversionMethod::Cholesky);
    let inv: InversionMethod = "Moore_Penrose".parse().unwrap();
    assert_eq!(inv, InversionMethod::MoorePenrose);
    let result: Result<InversionMethod, _> = "qr".parse();
    assert!(result.is_err());
}

#[test]
fn regularization_method_parses_known_names() {
    let reg: RegularizationMethod = "tikhonov".parse().unwrap();
    assert_eq!(reg, RegularizationMethod::Tikhonov);
    let reg: RegularizationMethod = "TRUNC".parse().unwrap();
    assert_eq!(reg, RegularizationMethod::Trunc);
    let result: Result<RegularizationMethod, _> = "ridge".parse();
    assert!(result.is_err());
}

#[test]
fn display_output_parses_back() {
    for inv in [
        InversionMethod::Cholesky,
        InversionMethod::MoorePenrose,
        InversionMethod::Solve,
        InversionMethod::Svd,
    ] {
        let parsed: InversionMethod = inv.to_string().parse().unwrap();
        assert_eq!(parsed, inv);
    }
}

// ---------------------------------------------------------------------------
// Fold reducers
// ---------------------------------------------------------------------------

#[test]
fn reducers_collapse_fold_scores() {
    let values = [0.2, 0.8, 0.4, 0.6];
    assert!((FoldReducer::Mean.reduce(&values) - 0.5).abs() < 1e-12);
    assert!((FoldReducer::Median.reduce(&values) - 0.5).abs() < 1e-12);
    assert_eq!(FoldReducer::Min.reduce(&values), 0.2);
    assert_eq!(FoldReducer::Max.reduce(&values), 0.8);

    // Odd length takes the middle element directly.
    assert_eq!(FoldReducer::Median.reduce(&[0.9, 0.1, 0.5]), 0.5);
}

// ---------------------------------------------------------------------------
// Optimization configuration
// ---------------------------------------------------------------------------

#[test]
fn default_config_matches_documented_design() {
    let config = OptimizationConfig::default();
    assert_eq!(config.times, 50);
    assert_eq!(config.xval, 5);
    assert!((config.test_fraction - 0.2).abs() < 1e-12);
    assert_eq!(config.inversion, InversionMethod::Cholesky);
    assert_eq!(config.regularization, RegularizationMethod::Tikhonov);
    assert_eq!(config.reducer, FoldReducer::Mean);
    assert_eq!(config.tie_break, TieBreak::FirstSeen);
    assert_eq!(config.grid.sigma.len(), 3);
    assert_eq!(config.grid.regul.len(), 3);
    assert!(config.seed.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_settings_fail_validation() {
    let bad_xval = OptimizationConfig {
        xval: 1,
        ..OptimizationConfig::default()
    };
    assert!(bad_xval.validate().is_err());

    let bad_fraction = OptimizationConfig {
        test_fraction: 1.0,
        ..OptimizationConfig::default()
    };
    assert!(bad_fraction.validate().is_err());

    let bad_times = OptimizationConfig {
        times: 0,
        ..OptimizationConfig::default()
    };
    assert!(bad_times.validate().is_err());

    let bad_pairing = OptimizationConfig {
        inversion: InversionMethod::Cholesky,
        regularization: RegularizationMethod::Trunc,
        ..OptimizationConfig::default()
    };
    assert!(matches!(
        bad_pairing.validate(),
        Err(PerturboError::Configuration(_))
    ));
}

#[test]
fn none_regularization_collapses_the_regul_axis() {
    let mut config = OptimizationConfig::default();
    config.regularization = RegularizationMethod::None;
    config.grid.regul = vec![0.25, 1.0, 4.0];
    let normalized = config.normalized().unwrap();
    assert_eq!(normalized.grid.regul, vec![1.0]);
    // The sigma axis is untouched.
    assert_eq!(normalized.grid.sigma, config.grid.sigma);
}

#[test]
fn config_round_trips_json() {
    let mut config = OptimizationConfig::default();
    config.seed = Some(99);
    config.tie_break = TieBreak::HighestRegularization;
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("tikhonov"));
    assert!(json.contains("highest_regularization"));
    let back: OptimizationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.seed, Some(99));
    assert_eq!(back.tie_break, TieBreak::HighestRegularization);
    assert_eq!(back.grid, config.grid);
}

#[test]
fn scores_mode_default_is_prediction() {
    assert_eq!(ScoresMode::default(), ScoresMode::Prediction);
}

//! Integration tests for MarkerDataset construction and stratified splitting.

use ndarray::Array2;
use perturbo::data_handling::{MarkerDataset, UNKNOWN_LABEL};
use perturbo::error::PerturboError;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// 14 rows: er x5, golgi x4, pm x3 plus two unknowns, with distinct features.
fn toy_dataset() -> MarkerDataset {
    let names = labels(&[
        "er", "golgi", "er", "pm", "unknown", "golgi", "er", "golgi", "pm", "er", "unknown", "er",
        "golgi", "pm",
    ]);
    let x = Array2::from_shape_fn((14, 2), |(i, j)| (i * 10 + j) as f64);
    let row_ids = (0..14).map(|i| format!("r{}", i)).collect();
    MarkerDataset::new(labels(&["f1", "f2"]), x, names, row_ids).unwrap()
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn catalog_follows_first_appearance_order() {
    let dataset = toy_dataset();
    assert_eq!(dataset.classes, labels(&["er", "golgi", "pm"]));
    assert_eq!(dataset.class_counts(), vec![5, 4, 3]);
    assert_eq!(dataset.labeled_indices().len(), 12);
    assert_eq!(dataset.unlabeled_indices(), vec![4, 10]);
    assert_eq!(dataset.class_index("pm"), Some(2));
    assert_eq!(dataset.class_index(UNKNOWN_LABEL), None);
}

#[test]
fn mismatched_lengths_are_rejected() {
    let x = Array2::from_shape_vec((2, 2), vec![1.0; 4]).unwrap();
    let result = MarkerDataset::new(
        labels(&["f1", "f2"]),
        x.clone(),
        labels(&["a"]), // wrong length
        labels(&["r0", "r1"]),
    );
    assert!(matches!(result, Err(PerturboError::Data(_))));

    let result = MarkerDataset::new(
        labels(&["f1"]), // wrong column count
        x,
        labels(&["a", "b"]),
        labels(&["r0", "r1"]),
    );
    assert!(matches!(result, Err(PerturboError::Data(_))));
}

#[test]
fn non_finite_values_name_the_offending_cell() {
    let x = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, f64::NAN]).unwrap();
    let err = MarkerDataset::new(
        labels(&["f1", "f2"]),
        x,
        labels(&["a", "b"]),
        labels(&["r0", "r1"]),
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("r1"), "unexpected message: {}", message);
    assert!(message.contains("f2"), "unexpected message: {}", message);
}

#[test]
fn fully_unlabeled_table_is_rejected() {
    let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
    let result = MarkerDataset::new(
        labels(&["f1"]),
        x,
        labels(&["unknown", "unknown"]),
        labels(&["r0", "r1"]),
    );
    assert!(matches!(result, Err(PerturboError::Data(_))));
}

// ---------------------------------------------------------------------------
// Row selection
// ---------------------------------------------------------------------------

#[test]
fn select_keeps_given_order_and_full_catalog() {
    let dataset = toy_dataset();
    let subset = dataset.select(&[3, 0]);
    assert_eq!(subset.row_ids, labels(&["r3", "r0"]));
    assert_eq!(subset.labels, labels(&["pm", "er"]));
    assert_eq!(subset.x.row(0).to_vec(), vec![30.0, 31.0]);
    assert_eq!(subset.x.row(1).to_vec(), vec![0.0, 1.0]);
    // The catalog survives even though the subset has no golgi row.
    assert_eq!(subset.classes, dataset.classes);
}

#[test]
fn training_arrays_map_labels_to_catalog_indices() {
    let dataset = toy_dataset();
    let (x, y) = dataset.training_arrays(&[0, 1, 3]).unwrap();
    assert_eq!(y, vec![0, 1, 2]);
    assert_eq!(x.row(1).to_vec(), vec![10.0, 11.0]);
}

#[test]
fn training_arrays_reject_unlabeled_rows() {
    let dataset = toy_dataset();
    let err = dataset.training_arrays(&[0, 4]).unwrap_err();
    assert!(err.to_string().contains("r4"));
}

// ---------------------------------------------------------------------------
// Stratified hold-out
// ---------------------------------------------------------------------------

#[test]
fn holdout_takes_the_ceiling_per_class() {
    let dataset = toy_dataset();
    let mut rng = StdRng::seed_from_u64(7);
    let (train, test) = dataset.stratified_holdout(&mut rng, 0.25).unwrap();

    // ceil(5 * 0.25) = 2, ceil(4 * 0.25) = 1, ceil(3 * 0.25) = 1.
    assert_eq!(test.len(), 4);
    assert_eq!(train.len(), 8);
    let test_count = |class: &str| {
        test.iter()
            .filter(|&&i| dataset.labels[i] == class)
            .count()
    };
    assert_eq!(test_count("er"), 2);
    assert_eq!(test_count("golgi"), 1);
    assert_eq!(test_count("pm"), 1);

    // Both halves are sorted, disjoint and together cover the labeled rows.
    assert!(train.windows(2).all(|w| w[0] < w[1]));
    assert!(test.windows(2).all(|w| w[0] < w[1]));
    let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
    all.sort_unstable();
    assert_eq!(all, dataset.labeled_indices());
}

#[test]
fn holdout_is_reproducible_from_the_seed() {
    let dataset = toy_dataset();
    let mut a = StdRng::seed_from_u64(11);
    let mut b = StdRng::seed_from_u64(11);
    assert_eq!(
        dataset.stratified_holdout(&mut a, 0.2).unwrap(),
        dataset.stratified_holdout(&mut b, 0.2).unwrap()
    );
}

#[test]
fn holdout_rejects_a_class_it_would_empty() {
    let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let dataset = MarkerDataset::new(
        labels(&["f1"]),
        x,
        labels(&["a", "a", "a", "b"]),
        labels(&["r0", "r1", "r2", "r3"]),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let err = dataset.stratified_holdout(&mut rng, 0.5).unwrap_err();
    assert!(matches!(err, PerturboError::Data(_)));
    assert!(err.to_string().contains('b'));
}

// ---------------------------------------------------------------------------
// Stratified folds
// ---------------------------------------------------------------------------

#[test]
fn folds_partition_the_rows_with_balanced_classes() {
    let dataset = toy_dataset();
    let rows = dataset.labeled_indices();
    let mut rng = StdRng::seed_from_u64(3);
    let folds = dataset.stratified_folds(&mut rng, 3, &rows);

    assert_eq!(folds.len(), 3);
    let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, rows);

    // Round-robin dealing keeps per-class fold counts within one of even.
    for fold in &folds {
        assert!(fold.windows(2).all(|w| w[0] < w[1]));
        for (class, total) in [("er", 5usize), ("golgi", 4), ("pm", 3)] {
            let count = fold
                .iter()
                .filter(|&&i| dataset.labels[i] == class)
                .count();
            assert!(
                count >= total / 3 && count <= total / 3 + 1,
                "{} rows of {} in one of 3 folds",
                count,
                class
            );
        }
    }
}

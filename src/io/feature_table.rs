//! Delimited marker-table reader and classified-table writer.
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use csv::StringRecord;
use ndarray::Array2;

use crate::classifier::ClassifiedDataset;
use crate::data_handling::{MarkerDataset, UNKNOWN_LABEL};

/// Configuration for reading delimited marker tables.
#[derive(Debug, Clone)]
pub struct FeatureTableConfig {
    /// Column holding the class label per row.
    pub label_column: String,
    /// Optional column holding row identifiers; row numbers otherwise.
    pub id_column: Option<String>,
    /// Label value marking rows still to classify.
    pub unknown_value: String,
}

impl Default for FeatureTableConfig {
    fn default() -> Self {
        Self {
            label_column: "markers".to_string(),
            id_column: None,
            unknown_value: UNKNOWN_LABEL.to_string(),
        }
    }
}

/// Read a delimited marker table with the default configuration.
pub fn read_feature_table<P: AsRef<Path>>(path: P) -> Result<MarkerDataset> {
    read_feature_table_with_config(path, &FeatureTableConfig::default())
}

/// Read a delimited marker table.
///
/// The delimiter follows the file extension (tab for `.tsv`, comma
/// otherwise). Every column other than the label and id columns is parsed
/// as a numeric feature; rows whose label equals the configured unknown
/// value come out labeled [`UNKNOWN_LABEL`].
pub fn read_feature_table_with_config<P: AsRef<Path>>(
    path: P,
    config: &FeatureTableConfig,
) -> Result<MarkerDataset> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open feature table: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let id_idx = match &config.id_column {
        Some(name) => Some(
            find_column(&headers, name).ok_or_else(|| anyhow!("Missing id column '{}'", name))?,
        ),
        None => None,
    };

    let feature_indices: Vec<usize> = (0..headers.len())
        .filter(|&idx| idx != label_idx && Some(idx) != id_idx)
        .collect();
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns detected in header"));
    }
    let feature_names: Vec<String> = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    let mut values = Vec::new();
    let mut labels = Vec::new();
    let mut row_ids = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?
            .trim();
        labels.push(if label == config.unknown_value {
            UNKNOWN_LABEL.to_string()
        } else {
            label.to_string()
        });

        let id = match id_idx {
            Some(idx) => record.get(idx).unwrap_or_default().trim().to_string(),
            None => String::new(),
        };
        row_ids.push(if id.is_empty() {
            format!("row_{}", row_idx + 1)
        } else {
            id
        });

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?;
            let parsed = value.trim().parse::<f64>().with_context(|| {
                format!(
                    "Invalid feature '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            values.push(parsed);
        }
    }

    let n_rows = labels.len();
    let x = Array2::from_shape_vec((n_rows, feature_indices.len()), values)
        .context("Failed to build feature matrix")?;
    let mut dataset = MarkerDataset::new(feature_names, x, labels, row_ids)?;
    dataset.processing.push(format!(
        "Loaded {} rows from {} on {}",
        n_rows,
        path.display(),
        Utc::now().to_rfc3339()
    ));
    Ok(dataset)
}

/// Write a classified dataset as a delimited table.
///
/// Emits one row per input row: identifier, features, the original label,
/// the prediction, and whatever score detail the classification carried.
pub fn write_classified_table<P: AsRef<Path>>(
    classified: &ClassifiedDataset,
    output_path: P,
) -> Result<()> {
    let path = output_path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_writer(BufWriter::new(file));

    let dataset = &classified.dataset;
    let mut header: Vec<String> = Vec::with_capacity(dataset.feature_names.len() + 4);
    header.push("id".to_string());
    header.extend(dataset.feature_names.iter().cloned());
    header.push("markers".to_string());
    header.push("prediction".to_string());
    if classified.prediction_scores.is_some() {
        header.push("score".to_string());
    }
    if classified.class_scores.is_some() {
        for class in &dataset.classes {
            header.push(format!("score_{}", class));
        }
    }
    writer.write_record(&header)?;

    for row in 0..dataset.x.nrows() {
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        record.push(dataset.row_ids[row].clone());
        for value in dataset.x.row(row).iter() {
            record.push(value.to_string());
        }
        record.push(dataset.labels[row].clone());
        record.push(classified.predictions[row].clone());
        if let Some(scores) = &classified.prediction_scores {
            record.push(scores[row].to_string());
        }
        if let Some(table) = &classified.class_scores {
            for c in 0..dataset.classes.len() {
                record.push(table[(row, c)].to_string());
            }
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

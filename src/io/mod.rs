//! IO utilities for loading marker tables and writing classification results.

pub mod feature_table;

pub use feature_table::{
    read_feature_table, read_feature_table_with_config, write_classified_table,
    FeatureTableConfig,
};

//! Housing data acquisition, exploration and splitting

pub mod explore;
pub mod loader;
pub mod split;

pub use explore::{
    correlations_with, incomplete_rows, summarize, value_counts, with_combined_attributes,
    ColumnSummary, NumericStats,
};
pub use loader::{
    extract_archive, fetch_housing_data, load_housing_data, matrix_to_frame, read_csv, write_csv,
    HOUSING_ARCHIVE, HOUSING_CSV,
};
pub use split::{
    category_proportions, income_categories, income_category, shuffled_split, split_by_id,
    stratified_split, stratified_train_test_split, take_rows, test_set_check, train_test_split,
};

use crate::error::{HousingError, Result};
use ndarray::Array1;
use polars::prelude::*;

/// Split a frame into predictors (every column but `target`) and labels
pub fn split_labels(df: &DataFrame, target: &str) -> Result<(DataFrame, Array1<f64>)> {
    let labels_column = df
        .column(target)
        .map_err(|_| HousingError::FeatureNotFound(target.to_string()))?
        .cast(&DataType::Float64)?;

    let labels = labels_column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| HousingError::DataError(format!("row {} has no {}", row, target)))
        })
        .collect::<Result<Array1<f64>>>()?;

    Ok((df.drop(target)?, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_labels() {
        let df = df!(
            "median_income" => &[1.0, 2.0],
            "median_house_value" => &[100i64, 200],
        )
        .unwrap();

        let (predictors, labels) = split_labels(&df, "median_house_value").unwrap();
        assert_eq!(predictors.width(), 1);
        assert_eq!(labels.to_vec(), vec![100.0, 200.0]);
    }

    #[test]
    fn test_split_labels_missing_target() {
        let df = df!("a" => &[1.0]).unwrap();
        assert!(matches!(split_labels(&df, "b"), Err(HousingError::FeatureNotFound(_))));
    }
}

//! Categorical encoding implementations

use crate::error::{HousingError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Type of encoder to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncoderType {
    /// One indicator column per category
    OneHot,
    /// A single column holding the category index
    Ordinal,
}

/// Categorical encoder for one text column.
///
/// Categories are learned at fit time and kept sorted; a value outside the
/// learned set is an error at transform time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    encoder_type: EncoderType,
    column: Option<String>,
    categories: Vec<String>,
    // category -> index into `categories`
    mapping: HashMap<String, usize>,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(encoder_type: EncoderType) -> Self {
        Self {
            encoder_type,
            column: None,
            categories: Vec::new(),
            mapping: HashMap::new(),
        }
    }

    /// Learned categories in output order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of output columns produced by `transform`
    pub fn n_output_columns(&self) -> usize {
        match self.encoder_type {
            EncoderType::OneHot => self.categories.len(),
            EncoderType::Ordinal => 1,
        }
    }

    /// Output column names
    pub fn feature_names(&self) -> Vec<String> {
        match self.encoder_type {
            EncoderType::OneHot => self.categories.clone(),
            EncoderType::Ordinal => self.column.iter().cloned().collect(),
        }
    }

    /// Fit the encoder to one column of the data
    pub fn fit(&mut self, df: &DataFrame, column: &str) -> Result<&mut Self> {
        let ca = Self::string_column(df, column)?;

        let mut seen = BTreeSet::new();
        for value in ca.into_iter() {
            let value = value.ok_or_else(|| {
                HousingError::DataError(format!("null value in categorical column {}", column))
            })?;
            seen.insert(value.to_string());
        }

        self.categories = seen.into_iter().collect();
        self.mapping = self
            .categories
            .iter()
            .enumerate()
            .map(|(idx, cat)| (cat.clone(), idx))
            .collect();
        self.column = Some(column.to_string());

        Ok(self)
    }

    /// Transform the fitted column of `df` into a numeric block
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let column = self.column.as_deref().ok_or(HousingError::ModelNotFitted)?;
        let ca = Self::string_column(df, column)?;

        let codes = ca
            .into_iter()
            .map(|value| match value {
                Some(v) => self.mapping.get(v).copied().ok_or_else(|| HousingError::UnknownCategory {
                    column: column.to_string(),
                    value: v.to_string(),
                }),
                None => Err(HousingError::DataError(format!(
                    "null value in categorical column {}",
                    column
                ))),
            })
            .collect::<Result<Vec<usize>>>()?;

        let encoded = match self.encoder_type {
            EncoderType::OneHot => {
                let mut out = Array2::zeros((codes.len(), self.categories.len()));
                for (row, &code) in codes.iter().enumerate() {
                    out[[row, code]] = 1.0;
                }
                out
            }
            EncoderType::Ordinal => {
                Array2::from_shape_fn((codes.len(), 1), |(row, _)| codes[row] as f64)
            }
        };

        Ok(encoded)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, column: &str) -> Result<Array2<f64>> {
        self.fit(df, column)?;
        self.transform(df)
    }

    fn string_column<'a>(df: &'a DataFrame, column: &str) -> Result<&'a StringChunked> {
        df.column(column)
            .map_err(|_| HousingError::FeatureNotFound(column.to_string()))?
            .str()
            .map_err(|e| HousingError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proximity_df(values: &[&str]) -> DataFrame {
        DataFrame::new(vec![Column::new("ocean_proximity".into(), values)]).unwrap()
    }

    #[test]
    fn test_onehot_encoding() {
        let df = proximity_df(&["NEAR BAY", "INLAND", "<1H OCEAN", "INLAND"]);

        let mut encoder = Encoder::new(EncoderType::OneHot);
        let result = encoder.fit_transform(&df, "ocean_proximity").unwrap();

        assert_eq!(encoder.categories(), &["<1H OCEAN", "INLAND", "NEAR BAY"]);
        assert_eq!(result.dim(), (4, 3));
        assert_eq!(result.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(result.row(1).to_vec(), vec![0.0, 1.0, 0.0]);
        // Exactly one indicator per row
        assert!(result.rows().into_iter().all(|r| r.sum() == 1.0));
    }

    #[test]
    fn test_ordinal_encoding() {
        let df = proximity_df(&["NEAR BAY", "INLAND", "NEAR BAY"]);

        let mut encoder = Encoder::new(EncoderType::Ordinal);
        let result = encoder.fit_transform(&df, "ocean_proximity").unwrap();

        assert_eq!(result.dim(), (3, 1));
        assert_eq!(result.column(0).to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(encoder.feature_names(), vec!["ocean_proximity".to_string()]);
    }

    #[test]
    fn test_unknown_category_is_error() {
        let mut encoder = Encoder::new(EncoderType::OneHot);
        encoder.fit(&proximity_df(&["INLAND", "NEAR BAY"]), "ocean_proximity").unwrap();

        let err = encoder.transform(&proximity_df(&["ISLAND"])).unwrap_err();
        match err {
            HousingError::UnknownCategory { column, value } => {
                assert_eq!(column, "ocean_proximity");
                assert_eq!(value, "ISLAND");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let mut encoder = Encoder::new(EncoderType::OneHot);
        let err = encoder.fit(&proximity_df(&["INLAND"]), "nope").unwrap_err();
        assert!(matches!(err, HousingError::FeatureNotFound(_)));
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = Encoder::new(EncoderType::OneHot);
        assert!(matches!(
            encoder.transform(&proximity_df(&["INLAND"])),
            Err(HousingError::ModelNotFitted)
        ));
    }
}

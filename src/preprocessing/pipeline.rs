//! Data preparation pipeline

use crate::error::{HousingError, Result};
use super::{
    attributes::{AttributeIndices, CombinedAttributesAdder},
    config::PreparationConfig,
    encoder::Encoder,
    imputer::Imputer,
    numeric_matrix,
    scaler::Scaler,
    Transformer,
};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Numeric branch: impute, derive ratio attributes, scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericPipeline {
    imputer: Imputer,
    attribs_adder: CombinedAttributesAdder,
    scaler: Scaler,
}

impl NumericPipeline {
    /// Assemble the three steps in their fixed order
    pub fn new(imputer: Imputer, attribs_adder: CombinedAttributesAdder, scaler: Scaler) -> Self {
        Self {
            imputer,
            attribs_adder,
            scaler,
        }
    }

    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    pub fn attribs_adder(&self) -> &CombinedAttributesAdder {
        &self.attribs_adder
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }
}

impl Transformer for NumericPipeline {
    /// Each step is fitted on the output of the previous one.
    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let imputed = self.imputer.fit_transform(x)?;
        let derived = self.attribs_adder.fit_transform(&imputed)?;
        self.scaler.fit(&derived)?;
        Ok(self)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let imputed = self.imputer.transform(x)?;
        let derived = self.attribs_adder.transform(&imputed)?;
        self.scaler.transform(&derived)
    }
}

/// Full preparation pipeline over a housing frame.
///
/// Numeric columns (every column except the categorical one) go through the
/// [`NumericPipeline`]; the categorical column is encoded. The output matrix
/// holds the numeric block followed by the encoded block, rows in input
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationPipeline {
    config: PreparationConfig,
    numeric_columns: Vec<String>,
    numeric: NumericPipeline,
    encoder: Encoder,
    is_fitted: bool,
    /// Timing: seconds spent in last fit call
    fit_time: Option<f64>,
}

impl PreparationPipeline {
    /// Build a pipeline for a frame with the given column ordering.
    ///
    /// Column positions for the attribute adder are resolved here, so a
    /// missing column fails before any data flows.
    pub fn new<S: AsRef<str>>(columns: &[S], config: PreparationConfig) -> Result<Self> {
        let categorical = config.categorical_column.as_str();
        if !columns.iter().any(|c| c.as_ref() == categorical) {
            return Err(HousingError::FeatureNotFound(categorical.to_string()));
        }

        let numeric_columns: Vec<String> = columns
            .iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| c != categorical)
            .collect();

        let indices = AttributeIndices::from_columns(&numeric_columns)?;
        let numeric = NumericPipeline::new(
            Imputer::new(config.impute_strategy.clone()),
            CombinedAttributesAdder::with_bedrooms_per_room(indices, config.add_bedrooms_per_room),
            Scaler::new(config.scaler_type.clone()),
        );
        let encoder = Encoder::new(config.encoder_type.clone());

        debug!(
            n_numeric = numeric_columns.len(),
            categorical = %categorical,
            ?indices,
            "Preparation pipeline constructed"
        );

        Ok(Self {
            config,
            numeric_columns,
            numeric,
            encoder,
            is_fitted: false,
            fit_time: None,
        })
    }

    /// Build a pipeline from a frame's own column ordering
    pub fn for_frame(df: &DataFrame, config: PreparationConfig) -> Result<Self> {
        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        Self::new(&columns, config)
    }

    /// Fit every stage on `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();

        let x = numeric_matrix(df, &self.numeric_columns)?;
        self.numeric.fit(&x)?;
        self.encoder.fit(df, &self.config.categorical_column)?;

        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());

        info!(
            rows = df.height(),
            features = self.n_output_features(),
            categories = self.encoder.categories().len(),
            "Preparation pipeline fitted"
        );
        Ok(self)
    }

    /// Transform `df` with the statistics learned at fit time
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(HousingError::ModelNotFitted);
        }

        let x = numeric_matrix(df, &self.numeric_columns)?;
        let numeric = self.numeric.transform(&x)?;
        let categorical = self.encoder.transform(df)?;

        Ok(concatenate(Axis(1), &[numeric.view(), categorical.view()])?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Output column names: numeric, derived, then encoded
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        names.extend(
            self.numeric
                .attribs_adder()
                .derived_names()
                .into_iter()
                .map(String::from),
        );
        names.extend(self.encoder.feature_names());
        names
    }

    /// Width of the prepared matrix; encoded columns count only after fit
    pub fn n_output_features(&self) -> usize {
        self.numeric_columns.len()
            + self.numeric.attribs_adder().n_derived()
            + self.encoder.n_output_columns()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn numeric_pipeline(&self) -> &NumericPipeline {
        &self.numeric
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Seconds spent in the last fit call
    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::EncoderType;

    fn create_test_dataframe() -> DataFrame {
        df!(
            "longitude" => &[-122.23, -122.22, -122.24, -122.25, -121.0],
            "total_rooms" => &[880.0, 7099.0, 1467.0, 1274.0, 1627.0],
            "total_bedrooms" => &[Some(129.0), Some(1106.0), None, Some(235.0), Some(280.0)],
            "population" => &[322.0, 2401.0, 496.0, 558.0, 565.0],
            "households" => &[126.0, 1138.0, 177.0, 219.0, 259.0],
            "ocean_proximity" => &["NEAR BAY", "NEAR BAY", "INLAND", "<1H OCEAN", "INLAND"],
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_creation() {
        let df = create_test_dataframe();
        let pipeline = PreparationPipeline::for_frame(&df, PreparationConfig::default()).unwrap();
        assert!(!pipeline.is_fitted());
        assert_eq!(pipeline.numeric_columns().len(), 5);
        assert!(!pipeline.numeric_columns().contains(&"ocean_proximity".to_string()));
    }

    #[test]
    fn test_missing_categorical_column() {
        let err = PreparationPipeline::new(
            &["total_rooms", "total_bedrooms", "population", "households"],
            PreparationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HousingError::FeatureNotFound(ref c) if c == "ocean_proximity"));
    }

    #[test]
    fn test_fit_transform_shape() {
        let df = create_test_dataframe();
        let mut pipeline = PreparationPipeline::for_frame(&df, PreparationConfig::default()).unwrap();
        let prepared = pipeline.fit_transform(&df).unwrap();

        // 5 numeric + 3 derived + 3 categories
        assert_eq!(prepared.dim(), (5, 11));
        assert_eq!(pipeline.feature_names().len(), 11);
        assert!(prepared.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_numeric_block_is_standardized() {
        let df = create_test_dataframe();
        let mut pipeline = PreparationPipeline::for_frame(&df, PreparationConfig::default()).unwrap();
        let prepared = pipeline.fit_transform(&df).unwrap();

        for j in 0..8 {
            let column = prepared.column(j);
            assert!(column.mean().unwrap().abs() < 1e-9);
        }
    }

    #[test]
    fn test_ordinal_encoder_variant() {
        let df = create_test_dataframe();
        let config = PreparationConfig::new()
            .with_encoder(EncoderType::Ordinal)
            .with_bedrooms_per_room(false);
        let mut pipeline = PreparationPipeline::for_frame(&df, config).unwrap();
        let prepared = pipeline.fit_transform(&df).unwrap();
        assert_eq!(prepared.ncols(), 5 + 2 + 1);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = create_test_dataframe();
        let pipeline = PreparationPipeline::for_frame(&df, PreparationConfig::default()).unwrap();
        assert!(matches!(pipeline.transform(&df), Err(HousingError::ModelNotFitted)));
    }
}

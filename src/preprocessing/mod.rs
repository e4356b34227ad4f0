//! Data preparation module
//!
//! Provides the pieces of the housing preparation pipeline:
//! - Missing value imputation (median by default)
//! - Combined attribute derivation (ratio features)
//! - Feature scaling (StandardScaler, MinMaxScaler)
//! - Categorical encoding (OneHot, Ordinal)
//! - The assembled numeric + categorical preparation pipeline

mod config;
mod imputer;
mod scaler;
mod encoder;
mod attributes;
mod pipeline;

pub use config::PreparationConfig;
pub use imputer::{Imputer, ImputeStrategy};
pub use scaler::{Scaler, ScalerType};
pub use encoder::{Encoder, EncoderType};
pub use attributes::{AttributeIndices, CombinedAttributesAdder, REQUIRED_ATTRIBUTES};
pub use pipeline::{NumericPipeline, PreparationPipeline};

use crate::error::{HousingError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Fit/transform capability shared by every numeric preparation step.
///
/// `fit` learns whatever the step needs from a table and returns the step
/// itself; `transform` produces a new table and never mutates its input.
pub trait Transformer {
    /// Learn statistics from `x`
    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self>;

    /// Apply the step to `x`
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Extract named columns as a row-major `f64` matrix.
///
/// Integer columns are cast to Float64; nulls become `NaN` so the imputer
/// can find them.
pub fn numeric_matrix<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((df.height(), columns.len()));

    for (j, name) in columns.iter().enumerate() {
        let name = name.as_ref();
        let column = df
            .column(name)
            .map_err(|_| HousingError::FeatureNotFound(name.to_string()))?;
        let casted = column
            .cast(&DataType::Float64)
            .map_err(|e| HousingError::DataError(format!("column {}: {}", name, e)))?;
        let ca = casted.f64()?;

        for (i, value) in ca.into_iter().enumerate() {
            matrix[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }

    Ok(matrix)
}

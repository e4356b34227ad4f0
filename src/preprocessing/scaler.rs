//! Feature scaling implementations

use crate::error::{HousingError, Result};
use super::Transformer;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: Array1<f64>, // mean or min
    scale: Array1<f64>,  // std or range
}

/// Feature scaler over every column of a numeric table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Option<ScalerParams>,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: None,
        }
    }

    /// Learned per-column centre (mean for standard scaling)
    pub fn center(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.center)
    }

    /// Learned per-column scale (standard deviation for standard scaling)
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.scale)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.checked_params(x)?;
        Ok(x * &params.scale + &params.center)
    }

    fn checked_params(&self, x: &Array2<f64>) -> Result<&ScalerParams> {
        let params = self.params.as_ref().ok_or(HousingError::ModelNotFitted)?;
        if x.ncols() != params.center.len() {
            return Err(HousingError::ShapeError {
                expected: format!("{} columns", params.center.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(params)
    }

    // Non-finite inputs are not filtered; they flow into the statistics.
    fn compute_params(&self, x: &Array2<f64>) -> Result<ScalerParams> {
        if x.nrows() == 0 {
            return Err(HousingError::PreprocessingError(
                "cannot fit a scaler on an empty table".to_string(),
            ));
        }

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
                    HousingError::ComputationError("mean of empty axis".to_string())
                })?;
                let std = x.std_axis(Axis(0), 0.0);
                Ok(ScalerParams {
                    center: mean,
                    scale: std.mapv(|s| if s == 0.0 { 1.0 } else { s }),
                })
            }
            ScalerType::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));
                let range = &max - &min;
                Ok(ScalerParams {
                    center: min,
                    scale: range.mapv(|r| if r == 0.0 { 1.0 } else { r }),
                })
            }
        }
    }
}

impl Transformer for Scaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.params = Some(self.compute_params(x)?);
        Ok(self)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.checked_params(x)?;
        Ok((x - &params.center) / &params.scale)
    }
}

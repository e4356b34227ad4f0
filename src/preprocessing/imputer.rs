//! Missing value imputation strategies

use crate::error::{HousingError, Result};
use super::Transformer;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean
    Mean,
    /// Replace with median
    Median,
    /// Replace with mode / most frequent value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
}

/// Imputer for numeric tables where `NaN` marks a missing entry.
///
/// One fill value per column is learned by `fit` and reused unchanged by
/// every later `transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    statistics: Option<Array1<f64>>,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            statistics: None,
        }
    }

    /// The configured strategy
    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    /// Learned fill value per column, `None` before fit
    pub fn statistics(&self) -> Option<&Array1<f64>> {
        self.statistics.as_ref()
    }

    fn compute_fill_value(&self, column: ArrayView1<f64>, idx: usize) -> Result<f64> {
        if let ImputeStrategy::Constant(val) = self.strategy {
            return Ok(val);
        }

        let mut present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return Err(HousingError::PreprocessingError(format!(
                "column {} has no observed values to impute from",
                idx
            )));
        }

        let value = match self.strategy {
            ImputeStrategy::Mean => present.iter().sum::<f64>() / present.len() as f64,
            ImputeStrategy::Median => median(&mut present),
            ImputeStrategy::MostFrequent => most_frequent(&present),
            ImputeStrategy::Constant(val) => val,
        };

        Ok(value)
    }
}

/// Median of the slice, averaging the two middle values for even lengths
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Most frequent value; ties go to the smallest value
fn most_frequent(values: &[f64]) -> f64 {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &val in values {
        *counts.entry(val.to_bits()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(bits, count)| (f64::from_bits(bits), count))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
        .map(|(val, _)| val)
        .unwrap_or(0.0)
}

impl Transformer for Imputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let fill_values = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(idx, column)| self.compute_fill_value(column, idx))
            .collect::<Result<Vec<_>>>()?;

        debug!(strategy = ?self.strategy, n_columns = fill_values.len(), "Imputer fitted");
        self.statistics = Some(Array1::from_vec(fill_values));
        Ok(self)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let statistics = self.statistics.as_ref().ok_or(HousingError::ModelNotFitted)?;

        if x.ncols() != statistics.len() {
            return Err(HousingError::ShapeError {
                expected: format!("{} columns", statistics.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut result = x.clone();
        for (mut column, &fill) in result.axis_iter_mut(Axis(1)).zip(statistics.iter()) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }

        Ok(result)
    }
}

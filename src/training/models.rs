//! Regressor trait and evaluation metrics

use crate::error::{HousingError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Metrics for regression evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        // R²
        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        })
    }
}

/// Mean of squared differences between targets and predictions
pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let diff = y_true - y_pred;
    Ok(diff.mapv(|d| d * d).sum() / y_true.len() as f64)
}

/// Coefficient of determination
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    RegressionMetrics::compute(y_true, y_pred).map(|m| m.r2)
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(HousingError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(HousingError::ValidationError(
            "cannot score an empty target".to_string(),
        ));
    }
    Ok(())
}

/// Trait for regression models
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Short display name
    fn name(&self) -> &'static str;
}

/// Shape check shared by every `fit`
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(HousingError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(HousingError::TrainingError("no training samples".to_string()));
    }
    if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(HousingError::ValidationError(format!(
            "input contains NaN or infinity at row {}, column {}",
            row, col
        )));
    }
    if let Some(row) = y.iter().position(|v| !v.is_finite()) {
        return Err(HousingError::ValidationError(format!(
            "target contains NaN or infinity at row {}",
            row
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();

        assert!((metrics.mse - 0.006).abs() < 1e-9);
        assert!((metrics.rmse - 0.006f64.sqrt()).abs() < 1e-9);
        assert!((metrics.mae - 0.06).abs() < 1e-9);
        assert!(metrics.r2 > 0.9);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_mean_squared_error() {
        let mse = mean_squared_error(&array![0.0, 0.0], &array![3.0, -1.0]).unwrap();
        assert_eq!(mse, 5.0);
    }

    #[test]
    fn test_perfect_prediction_r2() {
        let y = array![3.0, 1.0, 2.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_check_xy_rejects_non_finite() {
        let y = array![1.0, 2.0];
        let err = check_xy(&array![[1.0], [f64::INFINITY]], &y).unwrap_err();
        assert!(matches!(err, HousingError::ValidationError(_)));

        let err = check_xy(&array![[1.0], [2.0]], &array![1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, HousingError::ValidationError(_)));

        assert!(check_xy(&array![[1.0], [2.0]], &y).is_ok());
    }

    #[test]
    fn test_length_mismatch() {
        let err = mean_squared_error(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, HousingError::ShapeError { .. }));
    }
}

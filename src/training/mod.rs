//! Model training module
//!
//! Provides the regressors the checklist compares and the tools to evaluate
//! them:
//! - Linear regression (ordinary least squares)
//! - Decision tree and random forest regressors
//! - K-Fold cross-validation with pluggable scoring
//! - Exhaustive grid search over hyperparameter grids

mod models;
pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod grid_search;

pub use models::{mean_squared_error, r2_score, RegressionMetrics, Regressor};
pub use cross_validation::{
    cross_val_score, cross_validate, rmse_scores, CVResults, CVSplit, CVStrategy, CrossValidator,
    FoldScores, Scoring,
};
pub use linear_models::LinearRegression;
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use grid_search::{
    format_params, housing_param_grid, CvResult, GridSearchCV, ParamGrid, ParamValue, Params,
    Tunable,
};

/// Features paired with their importances, most important first
pub fn ranked_importances(importances: &[f64], names: &[String]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

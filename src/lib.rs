//! Housing checklist - end-to-end regression on the California housing data
//!
//! This crate provides:
//! - Dataset download, loading, exploration and train/test splitting
//! - A preparation pipeline: median imputation, combined ratio attributes,
//!   standardization and one-hot encoding of the proximity category
//! - Linear, decision tree and random forest regressors
//! - K-Fold cross-validation and exhaustive grid search
//!
//! # Modules
//!
//! - [`data`] - Download, CSV I/O, exploration, splitting
//! - [`preprocessing`] - Imputation, attribute derivation, scaling, encoding
//! - [`training`] - Regressors, metrics, cross-validation, grid search
//! - [`config`] - Checklist run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data and models
pub mod data;
pub mod preprocessing;
pub mod training;

// Services
pub mod cli;

pub use error::{HousingError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{HousingError, Result};

    // Configuration
    pub use crate::config::ChecklistConfig;

    // Data
    pub use crate::data::{
        load_housing_data, split_labels, stratified_train_test_split, train_test_split,
    };

    // Preprocessing
    pub use crate::preprocessing::{
        AttributeIndices, CombinedAttributesAdder, Encoder, EncoderType, ImputeStrategy, Imputer,
        PreparationConfig, PreparationPipeline, Scaler, ScalerType, Transformer,
    };

    // Training
    pub use crate::training::{
        cross_val_score, CrossValidator, DecisionTreeRegressor, GridSearchCV, LinearRegression,
        RandomForestRegressor, RegressionMetrics, Regressor, Scoring,
    };
}

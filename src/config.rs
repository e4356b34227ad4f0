//! Checklist run configuration

use crate::error::{HousingError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the handson-ml dataset mirror
pub const DOWNLOAD_ROOT: &str = "https://raw.githubusercontent.com/ageron/handson-ml/master/";

/// Configuration for a full checklist run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Root URL the dataset archive is fetched from
    pub download_root: String,

    /// Directory holding `housing.tgz` and `housing.csv`
    pub housing_path: PathBuf,

    /// Label column
    pub target_column: String,

    /// The single text column, one-hot encoded
    pub categorical_column: String,

    /// Fraction of districts held out as the test set
    pub test_ratio: f64,

    /// Seed for splits, folds and forests
    pub random_state: u64,

    /// Folds for model comparison
    pub cv_folds: usize,

    /// Folds for each grid search candidate
    pub grid_search_folds: usize,

    /// Whether the attribute adder appends bedrooms_per_room
    pub add_bedrooms_per_room: bool,

    /// Trees in the untuned random forest
    pub forest_estimators: usize,
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            download_root: DOWNLOAD_ROOT.to_string(),
            housing_path: PathBuf::from("datasets").join("housing"),
            target_column: "median_house_value".to_string(),
            categorical_column: "ocean_proximity".to_string(),
            test_ratio: 0.2,
            random_state: 42,
            cv_folds: 10,
            grid_search_folds: 5,
            add_bedrooms_per_room: true,
            forest_estimators: 100,
        }
    }
}

impl ChecklistConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Full URL of the dataset archive
    pub fn housing_url(&self) -> String {
        format!("{}datasets/housing/housing.tgz", self.download_root)
    }

    /// Builder method to set the data directory
    pub fn with_housing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.housing_path = path.into();
        self
    }

    /// Builder method to set the test ratio
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the model comparison fold count
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the grid search fold count
    pub fn with_grid_search_folds(mut self, folds: usize) -> Self {
        self.grid_search_folds = folds;
        self
    }

    /// Builder method to toggle the bedrooms_per_room attribute
    pub fn with_bedrooms_per_room(mut self, enabled: bool) -> Self {
        self.add_bedrooms_per_room = enabled;
        self
    }

    /// Check value ranges before anything runs
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(HousingError::InvalidParameter {
                name: "test_ratio".to_string(),
                value: self.test_ratio.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        for (name, folds) in [("cv_folds", self.cv_folds), ("grid_search_folds", self.grid_search_folds)] {
            if folds < 2 {
                return Err(HousingError::InvalidParameter {
                    name: name.to_string(),
                    value: folds.to_string(),
                    reason: "must be at least 2".to_string(),
                });
            }
        }
        if self.forest_estimators == 0 {
            return Err(HousingError::ConfigError(
                "forest_estimators must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

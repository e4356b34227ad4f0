//! Preparation pipeline configuration

use serde::{Deserialize, Serialize};
use super::{ScalerType, EncoderType, ImputeStrategy};

/// Configuration for the preparation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationConfig {
    /// Strategy for filling missing numeric values
    pub impute_strategy: ImputeStrategy,

    /// Scaler applied after attribute derivation
    pub scaler_type: ScalerType,

    /// Encoder for the categorical column
    pub encoder_type: EncoderType,

    /// Name of the single categorical column
    pub categorical_column: String,

    /// Append bedrooms_per_room in the attribute adder
    pub add_bedrooms_per_room: bool,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            impute_strategy: ImputeStrategy::Median,
            scaler_type: ScalerType::Standard,
            encoder_type: EncoderType::OneHot,
            categorical_column: "ocean_proximity".to_string(),
            add_bedrooms_per_room: true,
        }
    }
}

impl PreparationConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set impute strategy
    pub fn with_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set encoder type
    pub fn with_encoder(mut self, encoder_type: EncoderType) -> Self {
        self.encoder_type = encoder_type;
        self
    }

    /// Builder method to set the categorical column
    pub fn with_categorical_column(mut self, name: impl Into<String>) -> Self {
        self.categorical_column = name.into();
        self
    }

    /// Builder method to toggle bedrooms_per_room
    pub fn with_bedrooms_per_room(mut self, enabled: bool) -> Self {
        self.add_bedrooms_per_room = enabled;
        self
    }
}

//! Combined attribute derivation
//!
//! Appends per-household and per-room ratios to a numeric table. The
//! positions of the source columns are resolved once, by name, and carried in
//! an [`AttributeIndices`] value; nothing is hard-coded.

use crate::error::{HousingError, Result};
use super::Transformer;
use ndarray::{concatenate, stack, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Source columns the adder reads, in role order
pub const REQUIRED_ATTRIBUTES: [&str; 4] = ["total_rooms", "total_bedrooms", "population", "households"];

/// Column positions of the four source attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeIndices {
    pub rooms: usize,
    pub bedrooms: usize,
    pub population: usize,
    pub households: usize,
}

impl AttributeIndices {
    /// Resolve positions by looking the required names up in `columns`
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c.as_ref() == name)
                .ok_or_else(|| HousingError::FeatureNotFound(name.to_string()))
        };

        Ok(Self {
            rooms: position(REQUIRED_ATTRIBUTES[0])?,
            bedrooms: position(REQUIRED_ATTRIBUTES[1])?,
            population: position(REQUIRED_ATTRIBUTES[2])?,
            households: position(REQUIRED_ATTRIBUTES[3])?,
        })
    }

    fn max_index(&self) -> usize {
        self.rooms.max(self.bedrooms).max(self.population).max(self.households)
    }
}

/// Stateless transformer that appends ratio features.
///
/// Appended columns, in order: `rooms_per_household`,
/// `population_per_household` and, when enabled, `bedrooms_per_room`.
/// Zero denominators are not guarded and produce `inf` or `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAttributesAdder {
    indices: AttributeIndices,
    add_bedrooms_per_room: bool,
}

impl CombinedAttributesAdder {
    /// Create an adder that also appends bedrooms_per_room
    pub fn new(indices: AttributeIndices) -> Self {
        Self::with_bedrooms_per_room(indices, true)
    }

    /// Create an adder with an explicit bedrooms_per_room setting
    pub fn with_bedrooms_per_room(indices: AttributeIndices, add_bedrooms_per_room: bool) -> Self {
        Self {
            indices,
            add_bedrooms_per_room,
        }
    }

    pub fn indices(&self) -> &AttributeIndices {
        &self.indices
    }

    pub fn add_bedrooms_per_room(&self) -> bool {
        self.add_bedrooms_per_room
    }

    /// Names of the appended columns
    pub fn derived_names(&self) -> Vec<&'static str> {
        let mut names = vec!["rooms_per_household", "population_per_household"];
        if self.add_bedrooms_per_room {
            names.push("bedrooms_per_room");
        }
        names
    }

    /// Number of appended columns
    pub fn n_derived(&self) -> usize {
        if self.add_bedrooms_per_room { 3 } else { 2 }
    }
}

impl Transformer for CombinedAttributesAdder {
    fn fit(&mut self, _x: &Array2<f64>) -> Result<&mut Self> {
        Ok(self)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let needed = self.indices.max_index() + 1;
        if x.ncols() < needed {
            return Err(HousingError::ShapeError {
                expected: format!("at least {} columns", needed),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let rooms = x.column(self.indices.rooms);
        let households = x.column(self.indices.households);

        let rooms_per_household: Array1<f64> = &rooms / &households;
        let population_per_household: Array1<f64> = &x.column(self.indices.population) / &households;

        let derived = if self.add_bedrooms_per_room {
            let bedrooms_per_room: Array1<f64> = &x.column(self.indices.bedrooms) / &rooms;
            stack(
                Axis(1),
                &[rooms_per_household.view(), population_per_household.view(), bedrooms_per_room.view()],
            )?
        } else {
            stack(Axis(1), &[rooms_per_household.view(), population_per_household.view()])?
        };

        Ok(concatenate(Axis(1), &[x.view(), derived.view()])?)
    }
}

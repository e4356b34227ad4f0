//! Tabular exploration helpers

use crate::error::{HousingError, Result};
use crate::preprocessing::{
    numeric_matrix, AttributeIndices, CombinedAttributesAdder, Transformer, REQUIRED_ATTRIBUTES,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptive statistics for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    /// Non-null values
    pub count: usize,
    pub nulls: usize,
    /// Numeric columns only
    pub stats: Option<NumericStats>,
    /// Distinct non-null values, text columns only
    pub unique: Option<usize>,
}

/// Pandas-style `describe` figures; std uses one degree of freedom and
/// quantiles interpolate linearly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl NumericStats {
    fn from_values(values: &mut [f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            mean,
            std,
            min: values[0],
            q25: quantile_sorted(values, 0.25),
            median: quantile_sorted(values, 0.5),
            q75: quantile_sorted(values, 0.75),
            max: values[values.len() - 1],
        })
    }
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn is_text(column: &Column) -> bool {
    matches!(column.dtype(), DataType::String)
}

/// Column values as `f64`, nulls kept as `None`
fn float_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Summarise every column of `df`
pub fn summarize(df: &DataFrame) -> Result<Vec<ColumnSummary>> {
    df.get_columns()
        .iter()
        .map(|column| -> Result<ColumnSummary> {
            let nulls = column.null_count();
            let count = column.len() - nulls;

            let (stats, unique) = if is_text(column) {
                let distinct = column.as_materialized_series().drop_nulls().n_unique()?;
                (None, Some(distinct))
            } else {
                let mut values: Vec<f64> = float_values(column)?.into_iter().flatten().collect();
                (NumericStats::from_values(&mut values), None)
            };

            Ok(ColumnSummary {
                name: column.name().to_string(),
                dtype: column.dtype().to_string(),
                count,
                nulls,
                stats,
                unique,
            })
        })
        .collect()
}

/// Occurrences of each distinct value of a text column, most frequent first
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let ca = df
        .column(column)
        .map_err(|_| HousingError::FeatureNotFound(column.to_string()))?
        .str()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(sorted)
}

/// Pearson correlation over rows where both values are present
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Correlation of every numeric column with `target`, strongest positive
/// first; undefined correlations sort last
pub fn correlations_with(df: &DataFrame, target: &str) -> Result<Vec<(String, f64)>> {
    let target_column = df
        .column(target)
        .map_err(|_| HousingError::FeatureNotFound(target.to_string()))?;
    let target_values = float_values(target_column)?;

    let mut correlations = df
        .get_columns()
        .iter()
        .filter(|column| !is_text(column))
        .map(|column| {
            let values = float_values(column)?;
            Ok((column.name().to_string(), pearson(&values, &target_values)))
        })
        .collect::<Result<Vec<(String, f64)>>>()?;

    correlations.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        _ => b.1.total_cmp(&a.1),
    });
    Ok(correlations)
}

/// Copy of `df` with the combined attributes appended as columns.
///
/// Ratios come from [`CombinedAttributesAdder`]; a NaN ratio (a null source
/// value or 0/0) is stored as null.
pub fn with_combined_attributes(df: &DataFrame) -> Result<DataFrame> {
    let source = numeric_matrix(df, &REQUIRED_ATTRIBUTES)?;
    let indices = AttributeIndices::from_columns(&REQUIRED_ATTRIBUTES)?;
    let adder = CombinedAttributesAdder::new(indices);
    let derived = adder.transform(&source)?;

    let mut out = df.clone();
    for (offset, name) in adder.derived_names().into_iter().enumerate() {
        let values: Float64Chunked = derived
            .column(REQUIRED_ATTRIBUTES.len() + offset)
            .iter()
            .map(|v| (!v.is_nan()).then_some(*v))
            .collect();
        out.with_column(values.with_name(name.into()).into_series())?;
    }
    Ok(out)
}

/// Up to `limit` rows that have at least one null
pub fn incomplete_rows(df: &DataFrame, limit: usize) -> Result<DataFrame> {
    let mut mask = BooleanChunked::full("incomplete".into(), false, df.height());
    for column in df.get_columns() {
        let nulls = column.as_materialized_series().is_null();
        mask = &mask | &nulls;
    }
    Ok(df.filter(&mask)?.head(Some(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "total_rooms" => &[10.0, 8.0, 6.0, 12.0],
            "total_bedrooms" => &[Some(2.0), None, Some(3.0), Some(4.0)],
            "population" => &[20.0, 6.0, 9.0, 30.0],
            "households" => &[5.0, 2.0, 3.0, 6.0],
            "median_house_value" => &[100.0, 90.0, 60.0, 120.0],
            "ocean_proximity" => &["INLAND", "NEAR BAY", "INLAND", "ISLAND"],
        )
        .unwrap()
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&sample()).unwrap();
        assert_eq!(summary.len(), 6);

        let bedrooms = &summary[1];
        assert_eq!(bedrooms.count, 3);
        assert_eq!(bedrooms.nulls, 1);
        let stats = bedrooms.stats.unwrap();
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.std, 1.0);

        let proximity = &summary[5];
        assert!(proximity.stats.is_none());
        assert_eq!(proximity.unique, Some(3));
    }

    #[test]
    fn test_quantile_interpolates() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        let stats = NumericStats::from_values(&mut values).unwrap();
        assert_eq!(stats.q25, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q75, 3.25);
    }

    #[test]
    fn test_value_counts() {
        let counts = value_counts(&sample(), "ocean_proximity").unwrap();
        assert_eq!(counts[0], ("INLAND".to_string(), 2));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_correlations_sorted_with_target_first() {
        let correlations = correlations_with(&sample(), "median_house_value").unwrap();
        assert_eq!(correlations[0].0, "median_house_value");
        assert!((correlations[0].1 - 1.0).abs() < 1e-12);
        assert!(correlations[1].1 < correlations[0].1);
        assert!(correlations.iter().all(|(name, _)| name != "ocean_proximity"));
    }

    #[test]
    fn test_with_combined_attributes() {
        let df = with_combined_attributes(&sample()).unwrap();
        assert_eq!(df.width(), 9);

        let rph = df.column("rooms_per_household").unwrap().f64().unwrap();
        assert_eq!(rph.get(0), Some(2.0));
        let bpr = df.column("bedrooms_per_room").unwrap().f64().unwrap();
        assert_eq!(bpr.get(1), None);
    }

    #[test]
    fn test_combined_attributes_match_adder_on_zero_households() {
        let mut df = sample();
        df.with_column(Series::new("households".into(), &[5.0, 2.0, 0.0, 6.0]))
            .unwrap();
        let df = with_combined_attributes(&df).unwrap();

        let rph = df.column("rooms_per_household").unwrap().f64().unwrap();
        assert!(rph.get(2).unwrap().is_infinite());
        let pph = df.column("population_per_household").unwrap().f64().unwrap();
        assert_eq!(pph.get(0), Some(4.0));
        assert!(pph.get(2).unwrap().is_infinite());
    }

    #[test]
    fn test_incomplete_rows() {
        let rows = incomplete_rows(&sample(), 5).unwrap();
        assert_eq!(rows.height(), 1);
        let rooms = rows.column("total_rooms").unwrap().f64().unwrap();
        assert_eq!(rooms.get(0), Some(8.0));
    }
}

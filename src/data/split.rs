//! Train/test splitting: random, hash-based and stratified

use crate::error::{HousingError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::info;

/// Income category bin edges; category `k` covers `(EDGES[k-1], EDGES[k]]`
const INCOME_EDGES: [f64; 5] = [0.0, 1.5, 3.0, 4.5, 6.0];

/// Shuffle `0..n` and take the first `floor(n * test_ratio)` indices as the
/// test set. Returns `(train, test)`.
pub fn shuffled_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_ratio).floor() as usize).min(n);
    let train = indices.split_off(test_size);
    (train, indices)
}

/// Whether a row identifier falls in the test set.
///
/// Stable across dataset refreshes: the CRC32 of the identifier's 8
/// little-endian bytes is compared against `test_ratio * 2^32`.
pub fn test_set_check(identifier: i64, test_ratio: f64) -> bool {
    (crc32fast::hash(&identifier.to_le_bytes()) as f64) < test_ratio * 4_294_967_296.0
}

/// Partition row positions by [`test_set_check`] on their identifiers.
/// Returns `(train, test)`.
pub fn split_by_id(ids: &[i64], test_ratio: f64) -> (Vec<usize>, Vec<usize>) {
    (0..ids.len()).partition(|&i| !test_set_check(ids[i], test_ratio))
}

/// Bin a median income into categories 1..=5.
///
/// Edges are 1.5, 3.0, 4.5 and 6.0, right-inclusive; non-positive and NaN
/// incomes have no category.
pub fn income_category(median_income: f64) -> Option<u32> {
    if !(median_income > INCOME_EDGES[0]) {
        return None;
    }
    let category = INCOME_EDGES[1..]
        .iter()
        .position(|&edge| median_income <= edge)
        .map_or(5, |pos| pos + 1);
    Some(category as u32)
}

/// One stratified shuffle split.
///
/// The test set has `ceil(n * test_ratio)` rows, allocated to each stratum in
/// proportion to its size (largest remainder, ties to the larger stratum).
/// Rows are drawn at random within each stratum. Returns `(train, test)`.
pub fn stratified_split(strata: &[u32], test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(HousingError::InvalidParameter {
            name: "test_ratio".to_string(),
            value: test_ratio.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n = strata.len();
    let test_size = ((n as f64 * test_ratio).ceil() as usize).min(n);
    if test_size == 0 || test_size == n {
        return Err(HousingError::ValidationError(format!(
            "cannot split {} rows with test ratio {}",
            n, test_ratio
        )));
    }

    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in strata.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }

    // Largest remainder allocation
    let mut allocation: Vec<(u32, usize, f64)> = groups
        .iter()
        .map(|(&label, members)| {
            let exact = members.len() as f64 * test_size as f64 / n as f64;
            (label, exact.floor() as usize, exact - exact.floor())
        })
        .collect();
    let mut remaining = test_size - allocation.iter().map(|a| a.1).sum::<usize>();

    let mut by_remainder: Vec<usize> = (0..allocation.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        allocation[b]
            .2
            .total_cmp(&allocation[a].2)
            .then_with(|| groups[&allocation[b].0].len().cmp(&groups[&allocation[a].0].len()))
    });
    for idx in by_remainder {
        if remaining == 0 {
            break;
        }
        allocation[idx].1 += 1;
        remaining -= 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - test_size);
    let mut test = Vec::with_capacity(test_size);

    for (label, n_test, _) in allocation {
        let mut members = groups[&label].clone();
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok((train, test))
}

/// Share of each label, keyed by label
pub fn category_proportions(labels: &[u32]) -> BTreeMap<u32, f64> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    let n = labels.len().max(1) as f64;
    counts.into_iter().map(|(k, c)| (k, c as f64 / n)).collect()
}

/// Select rows by position, in the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Income category of every row of `df`, from the named income column
pub fn income_categories(df: &DataFrame, income_column: &str) -> Result<Vec<u32>> {
    let column = df
        .column(income_column)
        .map_err(|_| HousingError::FeatureNotFound(income_column.to_string()))?
        .cast(&DataType::Float64)?;

    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.and_then(income_category).ok_or_else(|| {
                HousingError::DataError(format!(
                    "row {} has no income category ({} = {:?})",
                    row, income_column, value
                ))
            })
        })
        .collect()
}

/// Purely random split of a frame. Returns `(train, test)`.
pub fn train_test_split(df: &DataFrame, test_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let (train_idx, test_idx) = shuffled_split(df.height(), test_ratio, seed);
    info!(train = train_idx.len(), test = test_idx.len(), "Random split");
    Ok((take_rows(df, &train_idx)?, take_rows(df, &test_idx)?))
}

/// Split a frame stratified on the income category of `income_column`.
///
/// The category is computed on the fly; neither output frame gains a column.
pub fn stratified_train_test_split(
    df: &DataFrame,
    income_column: &str,
    test_ratio: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let strata = income_categories(df, income_column)?;
    let (train_idx, test_idx) = stratified_split(&strata, test_ratio, seed)?;
    info!(train = train_idx.len(), test = test_idx.len(), "Stratified split on income category");
    Ok((take_rows(df, &train_idx)?, take_rows(df, &test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffled_split_sizes() {
        let (train, test) = shuffled_split(10, 0.25, 42);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffled_split_is_seeded() {
        assert_eq!(shuffled_split(50, 0.2, 7), shuffled_split(50, 0.2, 7));
        assert_ne!(shuffled_split(50, 0.2, 7).1, shuffled_split(50, 0.2, 8).1);
    }

    #[test]
    fn test_test_set_check_is_stable() {
        let ids: Vec<i64> = (0..1000).collect();
        let (train, test) = split_by_id(&ids, 0.2);
        assert_eq!(train.len() + test.len(), 1000);
        // Roughly the requested share
        assert!(test.len() > 120 && test.len() < 280, "test size {}", test.len());

        // Growing the id range never moves an old row across
        let more: Vec<i64> = (0..2000).collect();
        let (_, test_more) = split_by_id(&more, 0.2);
        assert!(test.iter().all(|i| test_more.contains(i)));
    }

    #[test]
    fn test_test_set_check_extremes() {
        assert!(!test_set_check(17, 0.0));
        assert!(test_set_check(17, 1.0));
    }

    #[test]
    fn test_income_category_bins() {
        assert_eq!(income_category(0.5), Some(1));
        assert_eq!(income_category(1.5), Some(1));
        assert_eq!(income_category(1.51), Some(2));
        assert_eq!(income_category(3.0), Some(2));
        assert_eq!(income_category(4.5), Some(3));
        assert_eq!(income_category(6.0), Some(4));
        assert_eq!(income_category(15.0001), Some(5));
        assert_eq!(income_category(0.0), None);
        assert_eq!(income_category(f64::NAN), None);
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        // 60% category 1, 30% category 2, 10% category 3
        let strata: Vec<u32> = (0..100)
            .map(|i| if i < 60 { 1 } else if i < 90 { 2 } else { 3 })
            .collect();

        let (train, test) = stratified_split(&strata, 0.2, 42).unwrap();
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);

        let test_labels: Vec<u32> = test.iter().map(|&i| strata[i]).collect();
        let props = category_proportions(&test_labels);
        assert_eq!(props[&1], 0.6);
        assert_eq!(props[&2], 0.3);
        assert_eq!(props[&3], 0.1);
    }

    #[test]
    fn test_stratified_split_rounds_up_test_size() {
        let strata = vec![1, 1, 1, 2, 2, 2, 2];
        let (train, test) = stratified_split(&strata, 0.2, 0).unwrap();
        // ceil(7 * 0.2) = 2
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 5);
    }

    #[test]
    fn test_stratified_split_rejects_bad_ratio() {
        assert!(stratified_split(&[1, 2, 3], 1.5, 0).is_err());
    }

    #[test]
    fn test_stratified_frame_split() {
        let incomes: Vec<f64> = (0..50).map(|i| 0.5 + i as f64 * 0.2).collect();
        let df = df!(
            "median_income" => &incomes,
            "id" => &(0..50).collect::<Vec<i64>>(),
        )
        .unwrap();

        let (train, test) = stratified_train_test_split(&df, "median_income", 0.2, 42).unwrap();
        assert_eq!(test.height(), 10);
        assert_eq!(train.height(), 40);
        assert_eq!(train.width(), 2);
    }

    #[test]
    fn test_take_rows_order() {
        let df = df!("x" => &[10i64, 20, 30]).unwrap();
        let picked = take_rows(&df, &[2, 0]).unwrap();
        let values: Vec<Option<i64>> = picked.column("x").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(30), Some(10)]);
    }
}

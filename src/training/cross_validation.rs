//! Cross-validation implementations

use crate::error::{HousingError, Result};
use super::models::{mean_squared_error, r2_score, Regressor};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Repeated shuffled K-Fold
    RepeatedKFold { n_splits: usize, n_repeats: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: false }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Unshuffled K-Fold with `n_splits` contiguous folds
    pub fn k_fold(n_splits: usize) -> Self {
        Self::new(CVStrategy::KFold { n_splits, shuffle: false })
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle, self.random_state)
            }
            CVStrategy::RepeatedKFold { n_splits, n_repeats } => {
                self.repeated_k_fold_split(n_samples, *n_splits, *n_repeats)
            }
        }
    }

    fn k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(HousingError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if n_samples < n_splits {
            return Err(HousingError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();

        if shuffle {
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        // The first n_samples % n_splits folds get one extra sample
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn repeated_k_fold_split(&self, n_samples: usize, n_splits: usize, n_repeats: usize) -> Result<Vec<CVSplit>> {
        let mut all_splits = Vec::with_capacity(n_splits * n_repeats);

        for repeat in 0..n_repeats {
            let seed = self.random_state.map(|s| s.wrapping_add(repeat as u64));
            let mut splits = self.k_fold_split(n_samples, n_splits, true, seed)?;

            // Fold indices stay unique across repeats
            for split in &mut splits {
                split.fold_idx += repeat * n_splits;
            }

            all_splits.extend(splits);
        }

        Ok(all_splits)
    }
}

/// Scoring rule; larger is always better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    /// Negated mean squared error
    NegMeanSquaredError,
    /// Coefficient of determination
    R2,
}

impl Scoring {
    /// Score predictions against targets
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        match self {
            Scoring::NegMeanSquaredError => mean_squared_error(y_true, y_pred).map(|mse| -mse),
            Scoring::R2 => r2_score(y_true, y_pred),
        }
    }
}

/// Per-fold scores from [`cross_validate`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldScores {
    pub test_scores: Vec<f64>,
    /// Scores on each fold's own training part, when requested
    pub train_scores: Option<Vec<f64>>,
}

/// Fit a fresh clone of `model` on every training fold and score it on the
/// held-out fold.
pub fn cross_validate<M>(
    model: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
    scoring: Scoring,
    return_train_score: bool,
) -> Result<FoldScores>
where
    M: Regressor + Clone,
{
    if x.nrows() != y.len() {
        return Err(HousingError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }

    let splits = cv.split(x.nrows())?;
    let mut test_scores = Vec::with_capacity(splits.len());
    let mut train_scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut fold_model = model.clone();
        fold_model.fit(&x_train, &y_train)?;

        let score = scoring.score(&y_test, &fold_model.predict(&x_test)?)?;
        debug!(model = fold_model.name(), fold = split.fold_idx, score, "Fold scored");
        test_scores.push(score);

        if return_train_score {
            train_scores.push(scoring.score(&y_train, &fold_model.predict(&x_train)?)?);
        }
    }

    Ok(FoldScores {
        test_scores,
        train_scores: return_train_score.then_some(train_scores),
    })
}

/// Held-out fold scores summarised as [`CVResults`]
pub fn cross_val_score<M>(
    model: &M,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
    scoring: Scoring,
) -> Result<CVResults>
where
    M: Regressor + Clone,
{
    let folds = cross_validate(model, x, y, cv, scoring, false)?;
    Ok(CVResults::from_scores(folds.test_scores))
}

/// Convert negated MSE scores to RMSE values
pub fn rmse_scores(neg_mse_scores: &[f64]) -> Vec<f64> {
    neg_mse_scores.iter().map(|s| (-s).sqrt()).collect()
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let (mean_score, std_score) = mean_std(&scores);

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Mean and population standard deviation, zeros for an empty slice
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

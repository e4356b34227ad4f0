//! Exhaustive hyperparameter search with cross-validation

use crate::error::{HousingError, Result};
use super::cross_validation::{cross_validate, mean_std, CrossValidator, Scoring};
use super::decision_tree::DecisionTreeRegressor;
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::random_forest::{MaxFeatures, RandomForestRegressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// A single hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
        }
    }
}

/// One hyperparameter assignment, keyed by parameter name
pub type Params = BTreeMap<String, ParamValue>;

/// Format an assignment as `{name: value, ...}`
pub fn format_params(params: &Params) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{{}}}", body.join(", "))
}

/// Candidate values per parameter. Parameters iterate in name order with the
/// last name varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidate values for one parameter
    pub fn with_param(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.params.insert(name.to_string(), values);
        self
    }

    /// Shorthand for integer-valued parameters
    pub fn with_ints(self, name: &str, values: &[i64]) -> Self {
        self.with_param(name, values.iter().map(|&v| ParamValue::Int(v)).collect())
    }

    /// Number of combinations in this grid
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, as a cartesian product
    pub fn combinations(&self) -> Vec<Params> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut combos: Vec<Params> = vec![Params::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), *value);
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

/// The two grids searched for the housing forest:
/// 12 bootstrapped candidates plus 6 without bootstrap.
pub fn housing_param_grid() -> Vec<ParamGrid> {
    vec![
        ParamGrid::new()
            .with_ints("n_estimators", &[3, 10, 30])
            .with_ints("max_features", &[2, 4, 6, 8]),
        ParamGrid::new()
            .with_param("bootstrap", vec![ParamValue::Bool(false)])
            .with_ints("n_estimators", &[3, 10])
            .with_ints("max_features", &[2, 3, 4]),
    ]
}

/// Models whose hyperparameters can be set by name
pub trait Tunable {
    /// Set one hyperparameter; unknown names and ill-typed values are errors
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Apply a whole assignment
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> HousingError {
    HousingError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn as_count(name: &str, value: &ParamValue) -> Result<usize> {
    match value {
        ParamValue::Int(i) if *i >= 1 => Ok(*i as usize),
        _ => Err(invalid(name, value, "expected a positive integer")),
    }
}

fn as_split_count(name: &str, value: &ParamValue) -> Result<usize> {
    match value {
        ParamValue::Int(i) if *i >= 2 => Ok(*i as usize),
        _ => Err(invalid(name, value, "expected an integer of at least 2")),
    }
}

fn as_bool(name: &str, value: &ParamValue) -> Result<bool> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        _ => Err(invalid(name, value, "expected a boolean")),
    }
}

impl Tunable for RandomForestRegressor {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = as_count(name, value)?,
            "max_depth" => self.max_depth = Some(as_count(name, value)?),
            "min_samples_split" => self.min_samples_split = as_split_count(name, value)?,
            "min_samples_leaf" => self.min_samples_leaf = as_count(name, value)?,
            "bootstrap" => self.bootstrap = as_bool(name, value)?,
            "max_features" => {
                self.max_features = match value {
                    ParamValue::Int(i) if *i >= 1 => MaxFeatures::Fixed(*i as usize),
                    ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
                    _ => return Err(invalid(name, value, "expected a count or a fraction in (0, 1]")),
                }
            }
            _ => return Err(invalid(name, value, "unknown parameter for RandomForestRegressor")),
        }
        Ok(())
    }
}

impl Tunable for DecisionTreeRegressor {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = Some(as_count(name, value)?),
            "min_samples_split" => self.min_samples_split = as_split_count(name, value)?,
            "min_samples_leaf" => self.min_samples_leaf = as_count(name, value)?,
            "max_features" => self.max_features = Some(as_count(name, value)?),
            _ => return Err(invalid(name, value, "unknown parameter for DecisionTreeRegressor")),
        }
        Ok(())
    }
}

impl Tunable for LinearRegression {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "fit_intercept" => self.fit_intercept = as_bool(name, value)?,
            _ => return Err(invalid(name, value, "unknown parameter for LinearRegression")),
        }
        Ok(())
    }
}

/// Cross-validated outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub params: Params,
    pub split_test_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// Mean score on the training folds, when requested
    pub mean_train_score: Option<f64>,
    /// 1 for the best candidate; ties share a rank
    pub rank_test_score: usize,
    pub fit_time_secs: f64,
}

/// Grid search over one or more [`ParamGrid`]s
#[derive(Debug, Clone)]
pub struct GridSearchCV<M> {
    estimator: M,
    param_grids: Vec<ParamGrid>,
    cv: CrossValidator,
    scoring: Scoring,
    return_train_score: bool,
    results: Vec<CvResult>,
    best_index: Option<usize>,
    best_estimator: Option<M>,
}

impl<M> GridSearchCV<M>
where
    M: Regressor + Tunable + Clone,
{
    /// Create a search with unshuffled 5-fold CV and negated MSE scoring
    pub fn new(estimator: M, param_grids: Vec<ParamGrid>) -> Self {
        Self {
            estimator,
            param_grids,
            cv: CrossValidator::k_fold(5),
            scoring: Scoring::NegMeanSquaredError,
            return_train_score: false,
            results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }

    /// Set fold count (unshuffled K-Fold)
    pub fn with_folds(mut self, n_splits: usize) -> Self {
        self.cv = CrossValidator::k_fold(n_splits);
        self
    }

    /// Set a custom splitter
    pub fn with_cv(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    /// Set scoring rule
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Also score every fold model on its own training part
    pub fn with_return_train_score(mut self, enabled: bool) -> Self {
        self.return_train_score = enabled;
        self
    }

    /// Total candidates across every grid
    pub fn n_candidates(&self) -> usize {
        self.param_grids.iter().map(ParamGrid::len).sum()
    }

    /// Evaluate every candidate, then refit the best one on all of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let candidates: Vec<Params> = self
            .param_grids
            .iter()
            .flat_map(ParamGrid::combinations)
            .collect();

        if candidates.is_empty() {
            return Err(HousingError::ConfigError("parameter grid is empty".to_string()));
        }

        info!(
            candidates = candidates.len(),
            estimator = self.estimator.name(),
            "Starting grid search"
        );

        let mut results = Vec::with_capacity(candidates.len());
        for params in candidates {
            let start = Instant::now();
            let mut model = self.estimator.clone();
            model.set_params(&params)?;

            let folds = cross_validate(&model, x, y, &self.cv, self.scoring, self.return_train_score)?;
            let (mean_test_score, std_test_score) = mean_std(&folds.test_scores);
            let mean_train_score = folds.train_scores.as_deref().map(|s| mean_std(s).0);

            debug!(params = %format_params(&params), mean_test_score, "Candidate scored");

            results.push(CvResult {
                params,
                split_test_scores: folds.test_scores,
                mean_test_score,
                std_test_score,
                mean_train_score,
                rank_test_score: 0,
                fit_time_secs: start.elapsed().as_secs_f64(),
            });
        }

        assign_ranks(&mut results);

        // First candidate among the top-ranked ones
        let best_index = results
            .iter()
            .position(|r| r.rank_test_score == 1)
            .ok_or_else(|| HousingError::ComputationError("no candidate could be ranked".to_string()))?;

        let mut best = self.estimator.clone();
        best.set_params(&results[best_index].params)?;
        best.fit(x, y)?;

        info!(
            best_params = %format_params(&results[best_index].params),
            best_score = results[best_index].mean_test_score,
            "Grid search finished"
        );

        self.results = results;
        self.best_index = Some(best_index);
        self.best_estimator = Some(best);

        Ok(self)
    }

    pub fn cv_results(&self) -> &[CvResult] {
        &self.results
    }

    pub fn best_params(&self) -> Option<&Params> {
        self.best_index.map(|i| &self.results[i].params)
    }

    /// Mean cross-validated score of the best candidate
    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.results[i].mean_test_score)
    }

    /// Best candidate refitted on the full data
    pub fn best_estimator(&self) -> Option<&M> {
        self.best_estimator.as_ref()
    }

    /// Take ownership of the refitted best candidate
    pub fn into_best_estimator(self) -> Option<M> {
        self.best_estimator
    }
}

/// Rank by mean test score, descending. NaN scores rank last.
fn assign_ranks(results: &mut [CvResult]) {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (results[a].mean_test_score, results[b].mean_test_score);
        match (sa.is_nan(), sb.is_nan()) {
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => sb.total_cmp(&sa),
        }
    });

    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for (position, &idx) in order.iter().enumerate() {
        let score = results[idx].mean_test_score;
        if previous.map_or(true, |p| p.to_bits() != score.to_bits()) {
            rank = position + 1;
            previous = Some(score);
        }
        results[idx].rank_test_score = rank;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::cross_validation::CVStrategy;

    #[test]
    fn test_housing_grid_has_eighteen_candidates() {
        let grids = housing_param_grid();
        assert_eq!(grids[0].len(), 12);
        assert_eq!(grids[1].len(), 6);

        let combos = grids[0].combinations();
        assert_eq!(combos.len(), 12);
        // Names iterate in order, last varying fastest
        assert_eq!(combos[0]["max_features"], ParamValue::Int(2));
        assert_eq!(combos[0]["n_estimators"], ParamValue::Int(3));
        assert_eq!(combos[1]["n_estimators"], ParamValue::Int(10));

        assert!(grids[1]
            .combinations()
            .iter()
            .all(|p| p["bootstrap"] == ParamValue::Bool(false)));
    }

    #[test]
    fn test_min_samples_split_below_two_is_rejected() {
        let mut forest = RandomForestRegressor::default();
        let err = forest.set_param("min_samples_split", &ParamValue::Int(1)).unwrap_err();
        assert!(matches!(err, HousingError::InvalidParameter { .. }));

        let mut tree = DecisionTreeRegressor::new();
        assert!(tree.set_param("min_samples_split", &ParamValue::Int(1)).is_err());
        tree.set_param("min_samples_split", &ParamValue::Int(4)).unwrap();
        assert_eq!(tree.min_samples_split, 4);
    }

    #[test]
    fn test_empty_grid() {
        assert_eq!(ParamGrid::new().len(), 0);
        assert!(ParamGrid::new().combinations().is_empty());
        assert!(ParamGrid::new().with_ints("n_estimators", &[]).is_empty());
    }

    #[test]
    fn test_set_param_on_forest() {
        let mut rf = RandomForestRegressor::new(100);
        rf.set_param("max_features", &ParamValue::Int(4)).unwrap();
        rf.set_param("bootstrap", &ParamValue::Bool(false)).unwrap();
        assert_eq!(rf.max_features, MaxFeatures::Fixed(4));
        assert!(!rf.bootstrap);

        let err = rf.set_param("learning_rate", &ParamValue::Float(0.1)).unwrap_err();
        assert!(matches!(err, HousingError::InvalidParameter { .. }));
        assert!(rf.set_param("n_estimators", &ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn test_ranks_share_ties() {
        let make = |score: f64| CvResult {
            params: Params::new(),
            split_test_scores: vec![],
            mean_test_score: score,
            std_test_score: 0.0,
            mean_train_score: None,
            rank_test_score: 0,
            fit_time_secs: 0.0,
        };
        let mut results = vec![make(-3.0), make(-1.0), make(-3.0), make(-2.0)];
        assign_ranks(&mut results);

        let ranks: Vec<usize> = results.iter().map(|r| r.rank_test_score).collect();
        assert_eq!(ranks, vec![3, 1, 3, 2]);
    }

    #[test]
    fn test_grid_search_picks_deeper_tree() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 10.0 { 0.0 } else if v < 20.0 { 5.0 } else { 20.0 });

        let grid = ParamGrid::new().with_ints("max_depth", &[1, 3]);
        let mut search = GridSearchCV::new(DecisionTreeRegressor::new(), vec![grid])
            .with_cv(
                CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true })
                    .with_random_state(0),
            )
            .with_return_train_score(true);
        search.fit(&x, &y).unwrap();

        assert_eq!(search.n_candidates(), 2);
        assert_eq!(search.best_params().unwrap()["max_depth"], ParamValue::Int(3));
        assert!(search.best_score().unwrap() > search.cv_results()[0].mean_test_score);
        assert!(search.cv_results().iter().all(|r| r.mean_train_score.is_some()));
        assert_eq!(search.best_estimator().unwrap().max_depth, Some(3));
    }

    #[test]
    fn test_empty_search_is_config_error() {
        let x = Array2::zeros((4, 1));
        let y = Array1::zeros(4);
        let mut search = GridSearchCV::new(LinearRegression::new(), vec![]);
        assert!(matches!(search.fit(&x, &y), Err(HousingError::ConfigError(_))));
    }

    #[test]
    fn test_param_value_json() {
        let params: Params = serde_json::from_str(r#"{"bootstrap": false, "n_estimators": 3}"#).unwrap();
        assert_eq!(params["bootstrap"], ParamValue::Bool(false));
        assert_eq!(params["n_estimators"], ParamValue::Int(3));
        assert_eq!(format_params(&params), "{bootstrap: false, n_estimators: 3}");
    }
}

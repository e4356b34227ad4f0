//! Integration test: regressors, cross-validation and grid search

use housing_checklist::training::{
    cross_val_score, cross_validate, ranked_importances, rmse_scores, CrossValidator,
    DecisionTreeRegressor, GridSearchCV, LinearRegression, MaxFeatures, ParamGrid, ParamValue,
    RandomForestRegressor, RegressionMetrics, Regressor, Scoring,
};
use housing_checklist::error::HousingError;
use ndarray::{Array1, Array2};

/// y = 3·x0 - 2·x1 + 0.5·x2 + 10, no noise
fn regression_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => i as f64,
        1 => ((i * 7) % 11) as f64,
        _ => ((i * 3) % 5) as f64,
    });
    let y = x
        .rows()
        .into_iter()
        .map(|r| 3.0 * r[0] - 2.0 * r[1] + 0.5 * r[2] + 10.0)
        .collect::<Array1<f64>>();
    (x, y)
}

fn training_rmse<M: Regressor>(model: &M, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
    let predictions = model.predict(x).unwrap();
    RegressionMetrics::compute(y, &predictions).unwrap().rmse
}

#[test]
fn test_linear_regression_recovers_plane() {
    let (x, y) = regression_data(60);
    let mut model = LinearRegression::new();
    model.fit(&x, &y).unwrap();

    let coefficients = model.coefficients.as_ref().unwrap();
    assert!((coefficients[0] - 3.0).abs() < 1e-8);
    assert!((coefficients[1] + 2.0).abs() < 1e-8);
    assert!((coefficients[2] - 0.5).abs() < 1e-8);
    assert!((model.intercept.unwrap() - 10.0).abs() < 1e-6);
    assert!(training_rmse(&model, &x, &y) < 1e-6);
}

#[test]
fn test_unbounded_tree_memorizes_training_set() {
    let (x, y) = regression_data(60);
    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x, &y).unwrap();

    assert!(training_rmse(&tree, &x, &y) < 1e-9);
    assert!(tree.get_n_leaves() > 1);
}

#[test]
fn test_forest_importances_favor_dominant_feature() {
    let (x, y) = regression_data(80);
    let mut forest = RandomForestRegressor::new(20).with_random_state(42);
    forest.fit(&x, &y).unwrap();

    let importances = forest.feature_importances().unwrap();
    assert!((importances.sum() - 1.0).abs() < 1e-9);

    let names = vec!["x0".to_string(), "x1".to_string(), "x2".to_string()];
    let ranked = ranked_importances(importances.as_slice().unwrap(), &names);
    assert_eq!(ranked[0].0, "x0");

    let spread = y.std(0.0);
    assert!(training_rmse(&forest, &x, &y) < spread / 4.0);
}

#[test]
fn test_cross_validation_prefers_linear_model_on_linear_data() {
    let (x, y) = regression_data(60);
    let cv = CrossValidator::k_fold(5);

    let linear = cross_val_score(&LinearRegression::new(), &x, &y, &cv, Scoring::NegMeanSquaredError).unwrap();
    let tree = cross_val_score(&DecisionTreeRegressor::new(), &x, &y, &cv, Scoring::NegMeanSquaredError).unwrap();

    assert_eq!(linear.n_folds, 5);
    assert!(linear.mean_score > tree.mean_score);
    assert!(rmse_scores(&linear.scores).iter().all(|s| *s < 1e-6));
    assert!(rmse_scores(&tree.scores).iter().all(|s| s.is_finite() && *s >= 0.0));
}

#[test]
fn test_cross_validate_train_scores() {
    let (x, y) = regression_data(40);
    let cv = CrossValidator::k_fold(4);

    let folds = cross_validate(&DecisionTreeRegressor::new(), &x, &y, &cv, Scoring::NegMeanSquaredError, true).unwrap();
    let train = folds.train_scores.unwrap();
    assert_eq!(train.len(), 4);
    // An unbounded tree fits its own training folds exactly
    assert!(train.iter().all(|s| s.abs() < 1e-9));
}

#[test]
fn test_grid_search_over_forest() {
    let (x, y) = regression_data(60);
    let grid = ParamGrid::new()
        .with_ints("n_estimators", &[3, 10])
        .with_ints("max_features", &[1, 3]);

    let mut search = GridSearchCV::new(
        RandomForestRegressor::default().with_random_state(42),
        vec![grid],
    )
    .with_folds(3)
    .with_return_train_score(true);
    search.fit(&x, &y).unwrap();

    let results = search.cv_results();
    assert_eq!(results.len(), 4);
    assert!(results.iter().any(|r| r.rank_test_score == 1));
    assert!(results.iter().all(|r| r.split_test_scores.len() == 3));
    assert!(results.iter().all(|r| r.mean_train_score.is_some()));

    let best_params = search.best_params().unwrap().clone();
    let best = search.best_estimator().unwrap();
    match best_params["n_estimators"] {
        ParamValue::Int(n) => assert_eq!(best.n_trees(), n as usize),
        ref other => panic!("unexpected value {:?}", other),
    }
    match best_params["max_features"] {
        ParamValue::Int(n) => assert_eq!(best.max_features, MaxFeatures::Fixed(n as usize)),
        ref other => panic!("unexpected value {:?}", other),
    }

    let best_score = search.best_score().unwrap();
    assert!(results.iter().all(|r| r.mean_test_score <= best_score));
}

#[test]
fn test_grid_search_rejects_unknown_parameter() {
    let (x, y) = regression_data(30);
    let grid = ParamGrid::new().with_ints("n_neighbors", &[3]);
    let mut search = GridSearchCV::new(DecisionTreeRegressor::new(), vec![grid]).with_folds(3);
    assert!(search.fit(&x, &y).is_err());
}

#[test]
fn test_regressors_reject_non_finite_input() {
    let (mut x, y) = regression_data(30);
    x[[7, 1]] = f64::NAN;
    x[[12, 0]] = f64::INFINITY;

    let models: Vec<Box<dyn Regressor>> = vec![
        Box::new(LinearRegression::new()),
        Box::new(DecisionTreeRegressor::new()),
        Box::new(RandomForestRegressor::new(5).with_random_state(42)),
    ];
    for mut model in models {
        let err = model.fit(&x, &y).unwrap_err();
        assert!(matches!(err, HousingError::ValidationError(_)), "{}: {:?}", model.name(), err);
    }

    let mut y_bad = y.clone();
    y_bad[3] = f64::NAN;
    let (x, _) = regression_data(30);
    assert!(Regressor::fit(&mut LinearRegression::new(), &x, &y_bad).is_err());
}

#[test]
fn test_tree_and_forest_reject_nan_feature() {
    let x = ndarray::array![[1.0], [2.0], [3.0], [f64::NAN]];
    let y = ndarray::array![0.0, 0.0, 0.0, 100.0];

    assert!(DecisionTreeRegressor::new().fit(&x, &y).is_err());
    assert!(RandomForestRegressor::new(3).with_random_state(42).fit(&x, &y).is_err());
}

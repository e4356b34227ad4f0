//! Housing checklist CLI
//!
//! Command-line interface for fetching, exploring and preparing the housing
//! data, and for running the full model comparison.

use clap::{Parser, Subcommand};
use colored::*;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ChecklistConfig;
use crate::data::{
    category_proportions, correlations_with, fetch_housing_data, incomplete_rows,
    income_categories, load_housing_data, matrix_to_frame, shuffled_split, split_labels,
    stratified_split, stratified_train_test_split, summarize, value_counts,
    with_combined_attributes, write_csv,
};
use crate::preprocessing::{PreparationConfig, PreparationPipeline};
use crate::training::{
    cross_val_score, format_params, housing_param_grid, ranked_importances, rmse_scores,
    CVResults, CrossValidator, DecisionTreeRegressor, GridSearchCV, LinearRegression,
    RandomForestRegressor, RegressionMetrics, Regressor, Scoring,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<24} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn rule(width: usize) {
    println!("  {}", dim(&"─".repeat(width)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "housing-checklist")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "End-to-end machine learning checklist on the California housing dataset")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file; missing keys take their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download and extract the housing archive
    Fetch {
        /// Archive URL (defaults to the configured download root)
        #[arg(long)]
        url: Option<String>,

        /// Housing data directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Describe the dataset and compare split strategies
    Explore {
        /// Housing data directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Fit the preparation pipeline on the training set and save its output
    Prepare {
        /// Housing data directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the whole checklist: split, prepare, compare, tune, evaluate
    Run {
        /// Housing data directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Evaluate the untuned forest instead of searching the grid
        #[arg(long)]
        skip_grid_search: bool,
    },
}

/// Resolve the run configuration from an optional file and a directory override
pub fn load_config(path: Option<&Path>, dir: Option<PathBuf>) -> anyhow::Result<ChecklistConfig> {
    let mut config = match path {
        Some(path) => ChecklistConfig::load(path)?,
        None => ChecklistConfig::default(),
    };
    if let Some(dir) = dir {
        config = config.with_housing_path(dir);
    }
    config.validate()?;
    Ok(config)
}

fn preparation_config(config: &ChecklistConfig) -> PreparationConfig {
    PreparationConfig::new()
        .with_categorical_column(config.categorical_column.clone())
        .with_bedrooms_per_room(config.add_bedrooms_per_room)
}

fn load_training_set(config: &ChecklistConfig) -> anyhow::Result<(DataFrame, DataFrame)> {
    step_run("Loading data");
    let start = Instant::now();
    let housing = load_housing_data(&config.housing_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        housing.height(),
        housing.width(),
        start.elapsed()
    ));

    step_run("Stratified split on income category");
    let (train, test) = stratified_train_test_split(
        &housing,
        "median_income",
        config.test_ratio,
        config.random_state,
    )?;
    step_done(&format!("{} train / {} test", train.height(), test.height()));

    Ok((train, test))
}

fn rmse_of<M: Regressor>(model: &M, x: &Array2<f64>, y: &Array1<f64>) -> anyhow::Result<f64> {
    let predictions = model.predict(x)?;
    Ok(RegressionMetrics::compute(y, &predictions)?.rmse)
}

fn display_scores(name: &str, neg_mse_scores: &[f64]) {
    let rmse = CVResults::from_scores(rmse_scores(neg_mse_scores));

    println!();
    println!("  {}", name.white().bold());
    let scores: Vec<String> = rmse.scores.iter().map(|s| format!("{:.0}", s)).collect();
    kv("Scores", &scores.join(" "));
    kv("Mean", &format!("{:.2}", rmse.mean_score));
    kv("Standard deviation", &format!("{:.2}", rmse.std_score));
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_fetch(config: &ChecklistConfig, url: Option<&str>) -> anyhow::Result<()> {
    section("Fetch");

    let url = url.map(str::to_string).unwrap_or_else(|| config.housing_url());
    step_run(&format!("Downloading {}", url.cyan()));
    let start = Instant::now();
    let csv_path = fetch_housing_data(&url, &config.housing_path)?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Extracted", &csv_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_explore(config: &ChecklistConfig) -> anyhow::Result<()> {
    section("Explore");

    step_run("Loading data");
    let housing = load_housing_data(&config.housing_path)?;
    step_done(&format!("{} rows × {} cols", housing.height(), housing.width()));

    println!();
    println!("{}", housing.head(Some(5)));

    section("Summary");
    println!(
        "  {:<20} {:>7} {:>6} {:>12} {:>12} {:>12} {:>12}",
        muted("column"), muted("count"), muted("nulls"),
        muted("mean"), muted("std"), muted("median"), muted("max")
    );
    rule(88);
    for column in summarize(&housing)? {
        match column.stats {
            Some(stats) => println!(
                "  {:<20} {:>7} {:>6} {:>12.3} {:>12.3} {:>12.3} {:>12.3}",
                column.name, column.count, column.nulls,
                stats.mean, stats.std, stats.median, stats.max
            ),
            None => println!(
                "  {:<20} {:>7} {:>6} {}",
                column.name,
                column.count,
                column.nulls,
                dim(&format!("{} distinct values", column.unique.unwrap_or(0)))
            ),
        }
    }

    section(&format!("Value counts: {}", config.categorical_column));
    for (value, count) in value_counts(&housing, &config.categorical_column)? {
        println!("  {:<20} {:>7}", value, count);
    }

    section("Income category proportions in the test set");
    let strata = income_categories(&housing, "median_income")?;
    let overall = category_proportions(&strata);
    let (_, strat_test) = stratified_split(&strata, config.test_ratio, config.random_state)?;
    let (_, rand_test) = shuffled_split(strata.len(), config.test_ratio, config.random_state);
    let stratified = category_proportions(&strat_test.iter().map(|&i| strata[i]).collect::<Vec<_>>());
    let random = category_proportions(&rand_test.iter().map(|&i| strata[i]).collect::<Vec<_>>());

    println!(
        "  {:<6} {:>10} {:>12} {:>10} {:>12} {:>12}",
        muted("cat"), muted("overall"), muted("stratified"), muted("random"),
        muted("strat %err"), muted("rand %err")
    );
    rule(68);
    for (category, overall_share) in &overall {
        let strat_share = stratified.get(category).copied().unwrap_or(0.0);
        let rand_share = random.get(category).copied().unwrap_or(0.0);
        println!(
            "  {:<6} {:>10.6} {:>12.6} {:>10.6} {:>12.3} {:>12.3}",
            category,
            overall_share,
            strat_share,
            rand_share,
            100.0 * strat_share / overall_share - 100.0,
            100.0 * rand_share / overall_share - 100.0,
        );
    }

    section(&format!("Correlation with {}", config.target_column));
    let before = correlations_with(&housing, &config.target_column)?;
    for (name, r) in &before {
        println!("  {:<28} {:>9.6}", name, r);
    }

    section("Correlation after adding combined attributes");
    let combined = with_combined_attributes(&housing)?;
    for (name, r) in correlations_with(&combined, &config.target_column)? {
        let marker = if before.iter().any(|(n, _)| *n == name) { " " } else { "+" };
        println!("  {} {:<26} {:>9.6}", ok(marker), name, r);
    }

    section("Incomplete rows");
    let incomplete = incomplete_rows(&housing, 5)?;
    if incomplete.height() == 0 {
        println!("  {}", dim("none"));
    } else {
        println!("{}", incomplete);
    }

    println!();
    Ok(())
}

pub fn cmd_prepare(config: &ChecklistConfig, output: &Path) -> anyhow::Result<()> {
    section("Prepare");

    let (train, _) = load_training_set(config)?;
    let (features, _) = split_labels(&train, &config.target_column)?;

    step_run("Fitting preparation pipeline");
    let start = Instant::now();
    let mut pipeline = PreparationPipeline::for_frame(&features, preparation_config(config))?;
    let prepared = pipeline.fit_transform(&features)?;
    step_done(&format!("{} × {} in {:?}", prepared.nrows(), prepared.ncols(), start.elapsed()));

    step_run(&format!("Saving → {}", output.display()));
    let mut frame = matrix_to_frame(&prepared, &pipeline.feature_names())?;
    write_csv(&mut frame, output)?;
    step_done(&format!("{} rows × {} cols", frame.height(), frame.width()));

    println!();
    println!("  {}", muted("Columns"));
    for name in pipeline.feature_names() {
        println!("    {}", name);
    }
    println!();
    Ok(())
}

pub fn cmd_run(config: &ChecklistConfig, skip_grid_search: bool) -> anyhow::Result<()> {
    section("Checklist");

    let (train, test) = load_training_set(config)?;
    let (features, labels) = split_labels(&train, &config.target_column)?;

    step_run("Preparing training set");
    let start = Instant::now();
    let mut pipeline = PreparationPipeline::for_frame(&features, preparation_config(config))?;
    let prepared = pipeline.fit_transform(&features)?;
    step_done(&format!("{} features in {:?}", prepared.ncols(), start.elapsed()));

    // Training set fit
    section("Training RMSE");

    let mut lin_reg = LinearRegression::new();
    step_run("Linear regression");
    lin_reg.fit(&prepared, &labels)?;
    step_done(&format!("{:.2}", rmse_of(&lin_reg, &prepared, &labels)?));

    let mut tree_reg = DecisionTreeRegressor::new().with_random_state(config.random_state);
    step_run("Decision tree");
    tree_reg.fit(&prepared, &labels)?;
    step_done(&format!("{:.2}", rmse_of(&tree_reg, &prepared, &labels)?));

    let mut forest_reg = RandomForestRegressor::new(config.forest_estimators)
        .with_random_state(config.random_state);
    step_run("Random forest");
    let start = Instant::now();
    forest_reg.fit(&prepared, &labels)?;
    let forest_rmse = rmse_of(&forest_reg, &prepared, &labels)?;
    step_done(&format!("{:.2} in {:?}", forest_rmse, start.elapsed()));

    // Cross-validation
    section(&format!("{}-fold cross-validation RMSE", config.cv_folds));
    let cv = CrossValidator::k_fold(config.cv_folds);
    let scoring = Scoring::NegMeanSquaredError;

    let tree_cv = cross_val_score(&tree_reg, &prepared, &labels, &cv, scoring)?;
    display_scores("Decision tree", &tree_cv.scores);
    let lin_cv = cross_val_score(&lin_reg, &prepared, &labels, &cv, scoring)?;
    display_scores("Linear regression", &lin_cv.scores);
    let forest_cv = cross_val_score(&forest_reg, &prepared, &labels, &cv, scoring)?;
    display_scores("Random forest", &forest_cv.scores);

    let final_model = if skip_grid_search {
        forest_reg
    } else {
        section("Grid search");
        let mut grid_search = GridSearchCV::new(
            RandomForestRegressor::default().with_random_state(config.random_state),
            housing_param_grid(),
        )
        .with_folds(config.grid_search_folds)
        .with_return_train_score(true);

        step_run(&format!(
            "Evaluating {} candidates × {} folds",
            grid_search.n_candidates(),
            config.grid_search_folds
        ));
        let start = Instant::now();
        grid_search.fit(&prepared, &labels)?;
        step_done(&format!("{:?}", start.elapsed()));

        println!();
        for result in grid_search.cv_results() {
            let rmse = (-result.mean_test_score).sqrt();
            let line = format!("{:>10.2}  {}", rmse, format_params(&result.params));
            if result.rank_test_score == 1 {
                println!("  {} {}", ok("*"), line.white().bold());
            } else {
                println!("    {}", line);
            }
        }

        if let Some(params) = grid_search.best_params() {
            println!();
            kv("Best parameters", &format_params(params));
        }

        grid_search
            .into_best_estimator()
            .ok_or_else(|| anyhow::anyhow!("grid search produced no estimator"))?
    };

    if let Some(importances) = final_model.feature_importances() {
        section("Feature importances");
        let names = pipeline.feature_names();
        for (name, importance) in ranked_importances(importances.as_slice().unwrap_or(&[]), &names) {
            println!("  {:<28} {:>9.6}", name, importance);
        }
    }

    // Held-out evaluation with the already-fitted pipeline
    section("Test set");
    let (test_features, test_labels) = split_labels(&test, &config.target_column)?;
    step_run("Transforming test set");
    let test_prepared = pipeline.transform(&test_features)?;
    step_done(&format!("{} rows", test_prepared.nrows()));

    let predictions = final_model.predict(&test_prepared)?;
    let metrics = RegressionMetrics::compute(&test_labels, &predictions)?;
    println!();
    println!("  {:<16} {}", muted("Final RMSE"), format!("{:.2}", metrics.rmse).white().bold());
    println!("  {:<16} {}", muted("MAE"), format!("{:.2}", metrics.mae).white());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", metrics.r2).white());
    println!();

    Ok(())
}

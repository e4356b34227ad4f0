use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use housing_checklist::preprocessing::{
    AttributeIndices, CombinedAttributesAdder, PreparationConfig, PreparationPipeline,
    Transformer, REQUIRED_ATTRIBUTES,
};
use housing_checklist::training::RandomForestRegressor;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const PROXIMITY: [&str; 4] = ["<1H OCEAN", "INLAND", "NEAR OCEAN", "NEAR BAY"];

fn create_housing_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let households: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(50.0..1500.0)).collect();
    let rooms: Vec<f64> = households.iter().map(|h| h * rng.gen_range(2.0..8.0)).collect();
    let bedrooms: Vec<Option<f64>> = rooms
        .iter()
        .map(|r| (rng.gen::<f64>() > 0.01).then(|| r * rng.gen_range(0.1..0.3)))
        .collect();
    let population: Vec<f64> = households.iter().map(|h| h * rng.gen_range(1.5..4.0)).collect();

    df!(
        "longitude" => (0..n_rows).map(|_| rng.gen_range(-124.3..-114.3)).collect::<Vec<f64>>(),
        "latitude" => (0..n_rows).map(|_| rng.gen_range(32.5..42.0)).collect::<Vec<f64>>(),
        "housing_median_age" => (0..n_rows).map(|_| rng.gen_range(1i64..53)).collect::<Vec<i64>>(),
        "total_rooms" => rooms,
        "total_bedrooms" => bedrooms,
        "population" => population,
        "households" => households,
        "median_income" => (0..n_rows).map(|_| rng.gen_range(0.5..15.0)).collect::<Vec<f64>>(),
        "ocean_proximity" => (0..n_rows).map(|_| PROXIMITY[rng.gen_range(0..4)]).collect::<Vec<&str>>(),
    )
    .unwrap()
}

fn bench_attributes_adder(c: &mut Criterion) {
    let mut group = c.benchmark_group("attributes_adder");
    let adder = CombinedAttributesAdder::new(AttributeIndices::from_columns(&REQUIRED_ATTRIBUTES).unwrap());

    for n_rows in [1000, 10000, 100000].iter() {
        let x = Array2::from_shape_fn((*n_rows, 4), |(i, j)| (i % 97 + j + 1) as f64);

        group.bench_with_input(BenchmarkId::new("transform", n_rows), &x, |b, x| {
            b.iter(|| adder.transform(black_box(x)).unwrap())
        });
    }

    group.finish();
}

fn bench_preparation_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("preparation_pipeline");

    for n_rows in [1000, 10000, 20640].iter() {
        let df = create_housing_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("fit_transform", n_rows), &df, |b, df| {
            b.iter(|| {
                let mut pipeline = PreparationPipeline::for_frame(df, PreparationConfig::default()).unwrap();
                pipeline.fit_transform(black_box(df)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    let df = create_housing_data(5000);
    let mut pipeline = PreparationPipeline::for_frame(&df, PreparationConfig::default()).unwrap();
    let x = pipeline.fit_transform(&df).unwrap();
    let y: Array1<f64> = x.column(7).mapv(|income| 50_000.0 + 40_000.0 * income);

    for n_estimators in [10, 30].iter() {
        group.bench_with_input(BenchmarkId::new("fit", n_estimators), n_estimators, |b, &n| {
            b.iter(|| {
                let mut forest = RandomForestRegressor::new(n).with_random_state(42);
                forest.fit(black_box(&x), black_box(&y)).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_attributes_adder,
    bench_preparation_pipeline,
    bench_forest_fit
);
criterion_main!(benches);

//! Dataset download, extraction and CSV I/O

use crate::error::{HousingError, Result};
use flate2::read::GzDecoder;
use ndarray::Array2;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tar::Archive;
use tracing::info;

/// Archive name inside the housing directory
pub const HOUSING_ARCHIVE: &str = "housing.tgz";
/// Extracted CSV name inside the housing directory
pub const HOUSING_CSV: &str = "housing.csv";

/// Download the housing archive into `housing_path` and extract it there.
///
/// Makes a single attempt; a non-success HTTP status is a
/// [`HousingError::DownloadError`]. Returns the path of the extracted CSV.
pub fn fetch_housing_data(housing_url: &str, housing_path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(housing_path)?;
    let tgz_path = housing_path.join(HOUSING_ARCHIVE);

    info!(url = %housing_url, path = %tgz_path.display(), "Downloading housing archive");
    let start = Instant::now();

    let response = reqwest::blocking::get(housing_url)?;
    let status = response.status();
    if !status.is_success() {
        return Err(HousingError::DownloadError(format!(
            "{} returned HTTP {}",
            housing_url, status
        )));
    }
    let bytes = response.bytes()?;
    fs::write(&tgz_path, &bytes)?;

    extract_archive(&tgz_path, housing_path)?;

    let csv_path = housing_path.join(HOUSING_CSV);
    if !csv_path.is_file() {
        return Err(HousingError::DataError(format!(
            "archive did not contain {}",
            HOUSING_CSV
        )));
    }

    info!(
        bytes = bytes.len(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Housing data extracted"
    );
    Ok(csv_path)
}

/// Unpack a gzip-compressed tar archive into `destination`
pub fn extract_archive(tgz_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(tgz_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(destination)?;
    Ok(())
}

/// Load `housing.csv` from the housing directory
pub fn load_housing_data(housing_path: &Path) -> Result<DataFrame> {
    let df = read_csv(&housing_path.join(HOUSING_CSV))?;
    info!(rows = df.height(), cols = df.width(), "Loaded housing data");
    Ok(df)
}

/// Read a CSV file with a header row
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(HousingError::DataError(format!(
            "{} not found, run the fetch command first",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Wrap a numeric matrix in a frame with the given column names
pub fn matrix_to_frame(matrix: &Array2<f64>, names: &[String]) -> Result<DataFrame> {
    if names.len() != matrix.ncols() {
        return Err(HousingError::ShapeError {
            expected: format!("{} column names", matrix.ncols()),
            actual: format!("{} column names", names.len()),
        });
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(matrix.columns())
        .map(|(name, values)| Column::new(name.as_str().into(), values.to_vec()))
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Write a frame as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

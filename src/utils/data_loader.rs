//! CSV loading for labelled car listings

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{PricingError, Result};
use crate::preprocessing::{CarRecord, FeatureSchema, TrainingExample};

/// Row counts of one load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

/// Read a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PricingError::DataError(format!("{}: {}", path.display(), e)))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| PricingError::DataError(format!("{}: {}", path.display(), e)))
}

/// Load training examples, dropping rows with nulls or a non-positive price
pub fn load_examples(path: impl AsRef<Path>) -> Result<Vec<TrainingExample>> {
    let start = Instant::now();
    let df = load_csv(path.as_ref())?;
    let (examples, summary) = examples_from_frame(&df)?;

    if summary.rows_dropped > 0 {
        warn!(dropped = summary.rows_dropped, rows_read = summary.rows_read, "Dropped unusable rows");
    }
    info!(
        rows = summary.rows_kept,
        path = %path.as_ref().display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Training data loaded"
    );
    Ok(examples)
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let col = df.column(name)?.cast(&DataType::Int64)?;
    Ok(col.i64()?.into_iter().collect())
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Convert a frame with the car columns plus `price` into examples
pub fn examples_from_frame(df: &DataFrame) -> Result<(Vec<TrainingExample>, LoadSummary)> {
    let schema = FeatureSchema::car();
    let missing: Vec<String> = schema
        .names()
        .into_iter()
        .chain(std::iter::once(schema.target().to_string()))
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(PricingError::DataError(format!("missing columns: {}", missing.join(", "))));
    }

    let year = int_column(df, "year")?;
    let km_driven = int_column(df, "km_driven")?;
    let fuel = text_column(df, "fuel")?;
    let transmission = text_column(df, "transmission")?;
    let owner = text_column(df, "owner")?;
    let engine_cc = int_column(df, "engine_cc")?;
    let seats = int_column(df, "seats")?;
    let price_col = df.column(schema.target())?.cast(&DataType::Float64)?;
    let price: Vec<Option<f64>> = price_col.f64()?.into_iter().collect();

    let rows_read = df.height();
    let mut examples = Vec::with_capacity(rows_read);
    for i in 0..rows_read {
        let row = (|| {
            let record = CarRecord {
                year: year[i]?,
                km_driven: km_driven[i]?,
                fuel: fuel[i].clone()?,
                transmission: transmission[i].clone()?,
                owner: owner[i].clone()?,
                engine_cc: engine_cc[i]?,
                seats: seats[i]?,
            };
            let price = price[i].filter(|p| p.is_finite() && *p > 0.0)?;
            Some(TrainingExample::new(record, price))
        })();
        if let Some(example) = row {
            examples.push(example);
        }
    }

    let summary = LoadSummary {
        rows_read,
        rows_kept: examples.len(),
        rows_dropped: rows_read - examples.len(),
    };
    Ok((examples, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_drops_nulls_and_bad_prices() {
        let file = write(
            "year,km_driven,fuel,transmission,owner,engine_cc,seats,price\n\
             2020,35000,Diesel,Automatic,First,1500,5,25000\n\
             2018,,Petrol,Manual,Second,1200,5,14000\n\
             2015,90000,Petrol,Manual,Third,1000,4,0\n\
             2019,60000,Hybrid,Automatic,First,1800,7,-10\n\
             2012,150000,Petrol,Manual,Second,1200,5,7000.5\n",
        );
        let examples = load_examples(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].record, CarRecord::example());
        assert_eq!(examples[0].price, 25_000.0);
        assert_eq!(examples[1].price, 7_000.5);
    }

    #[test]
    fn test_missing_column() {
        let file = write("year,km_driven,price\n2020,1000,5000\n");
        match load_examples(file.path()) {
            Err(PricingError::DataError(msg)) => assert!(msg.contains("fuel")),
            other => panic!("expected DataError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(load_examples("/nonexistent/cars.csv"), Err(PricingError::DataError(_))));
    }

    #[test]
    fn test_summary_counts() {
        let file = write(
            "year,km_driven,fuel,transmission,owner,engine_cc,seats,price\n\
             2020,35000,Diesel,Automatic,First,1500,5,25000\n\
             2020,35000,,Automatic,First,1500,5,25000\n",
        );
        let df = load_csv(file.path()).unwrap();
        let (_, summary) = examples_from_frame(&df).unwrap();
        assert_eq!(summary, LoadSummary { rows_read: 2, rows_kept: 1, rows_dropped: 1 });
    }
}

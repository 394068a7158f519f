//! Synthetic car listings
//!
//! A seeded fixture dataset with a known linear price structure plus Gaussian
//! noise. Used to bootstrap training and in tests; not product logic.

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{PricingError, Result};
use crate::export::write_atomic;
use crate::preprocessing::{CarRecord, TrainingExample};

pub const FUELS: [&str; 4] = ["Petrol", "Diesel", "Electric", "Hybrid"];
pub const TRANSMISSIONS: [&str; 2] = ["Manual", "Automatic"];
pub const OWNERS: [&str; 3] = ["First", "Second", "Third"];
pub const ENGINE_SIZES: [i64; 5] = [1000, 1200, 1500, 2000, 2500];
pub const SEAT_COUNTS: [i64; 3] = [4, 5, 7];

const MIN_PRICE: f64 = 5_000.0;
const NOISE_STD: f64 = 2_000.0;

/// Generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub n_rows: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { n_rows: 1000, seed: 42 }
    }
}

impl GeneratorConfig {
    pub fn with_rows(mut self, n_rows: usize) -> Self {
        self.n_rows = n_rows;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Noise-free price of a listing
pub fn base_price(car: &CarRecord) -> f64 {
    let mut price = 15_000.0 + (car.year - 2010) as f64 * 1_000.0 - 0.05 * car.km_driven as f64;
    if car.fuel == "Electric" {
        price += 5_000.0;
    }
    if car.transmission == "Automatic" {
        price += 2_000.0;
    }
    if car.owner == "First" {
        price += 3_000.0;
    }
    price + 2.0 * car.engine_cc as f64 + 500.0 * car.seats as f64
}

/// Generate `config.n_rows` labelled listings; the same seed gives the same rows
pub fn generate(config: &GeneratorConfig) -> Vec<TrainingExample> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    (0..config.n_rows)
        .map(|_| {
            let record = CarRecord {
                year: rng.gen_range(2010..2024),
                km_driven: rng.gen_range(5_000..200_000),
                fuel: pick(&mut rng, &FUELS).to_string(),
                transmission: pick(&mut rng, &TRANSMISSIONS).to_string(),
                owner: pick(&mut rng, &OWNERS).to_string(),
                engine_cc: *pick(&mut rng, &ENGINE_SIZES),
                seats: *pick(&mut rng, &SEAT_COUNTS),
            };
            let noisy = base_price(&record) + NOISE_STD * standard_normal(&mut rng);
            TrainingExample::new(record, noisy.max(MIN_PRICE).round())
        })
        .collect()
}

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Box-Muller transform
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Listings as a DataFrame with the CSV column layout
pub fn to_dataframe(examples: &[TrainingExample]) -> Result<DataFrame> {
    let records = examples.iter().map(|e| &e.record);
    let ints = |f: fn(&CarRecord) -> i64| -> Vec<i64> { records.clone().map(f).collect() };
    let texts = |f: fn(&CarRecord) -> String| -> Vec<String> { records.clone().map(f).collect() };

    let df = DataFrame::new(vec![
        Series::new("year".into(), ints(|r| r.year)).into(),
        Series::new("km_driven".into(), ints(|r| r.km_driven)).into(),
        Series::new("fuel".into(), texts(|r| r.fuel.clone())).into(),
        Series::new("transmission".into(), texts(|r| r.transmission.clone())).into(),
        Series::new("owner".into(), texts(|r| r.owner.clone())).into(),
        Series::new("engine_cc".into(), ints(|r| r.engine_cc)).into(),
        Series::new("seats".into(), ints(|r| r.seats)).into(),
        Series::new("price".into(), examples.iter().map(|e| e.price).collect::<Vec<f64>>()).into(),
    ])?;
    Ok(df)
}

/// Write listings to `path` as CSV with a header row
pub fn write_csv(examples: &[TrainingExample], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut df = to_dataframe(examples)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
    write_atomic(path, &buf)?;
    info!(rows = examples.len(), path = %path.display(), "Synthetic dataset written");
    Ok(())
}

/// Generate and write in one step
pub fn generate_csv(config: &GeneratorConfig, path: impl AsRef<Path>) -> Result<Vec<TrainingExample>> {
    if config.n_rows == 0 {
        return Err(PricingError::ConfigError("n_rows must be at least 1".to_string()));
    }
    let examples = generate(config);
    write_csv(&examples, path)?;
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_seeded() {
        let config = GeneratorConfig::default().with_rows(50);
        assert_eq!(generate(&config), generate(&config));
        assert_ne!(generate(&config), generate(&config.clone().with_seed(7)));
    }

    #[test]
    fn test_generated_values_in_range() {
        let examples = generate(&GeneratorConfig::default());
        assert_eq!(examples.len(), 1000);
        for e in &examples {
            let r = &e.record;
            assert!((2010..2024).contains(&r.year));
            assert!((5_000..200_000).contains(&r.km_driven));
            assert!(FUELS.contains(&r.fuel.as_str()));
            assert!(TRANSMISSIONS.contains(&r.transmission.as_str()));
            assert!(OWNERS.contains(&r.owner.as_str()));
            assert!(ENGINE_SIZES.contains(&r.engine_cc));
            assert!(SEAT_COUNTS.contains(&r.seats));
            assert!(e.price >= MIN_PRICE);
            assert_eq!(e.price, e.price.round());
            assert!(r.validate().is_ok());
        }
    }

    #[test]
    fn test_noise_is_centred() {
        let examples = generate(&GeneratorConfig::default().with_rows(2000));
        let unclipped: Vec<f64> = examples
            .iter()
            .filter(|e| base_price(&e.record) > 15_000.0)
            .map(|e| e.price - base_price(&e.record))
            .collect();
        let mean = unclipped.iter().sum::<f64>() / unclipped.len() as f64;
        assert!(mean.abs() < 250.0, "mean residual {}", mean);
    }

    #[test]
    fn test_base_price_of_example() {
        // 15000 + 10*1000 - 1750 + 2000 + 3000 + 3000 + 2500
        assert_eq!(base_price(&CarRecord::example()), 33_750.0);
    }
}

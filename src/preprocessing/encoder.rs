//! Feature encoder: categorical vocabularies plus numeric standardization
//!
//! The encoder is fitted once on the training split and then reused, unchanged,
//! for every transform at training and serving time. Its whole state (feature
//! order, vocabularies, scaler parameters) is persisted as one artifact.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::record::{FeatureSchema, FieldSpec, Record};
use super::scaler::ScalerParams;
use super::ColumnType;
use crate::error::{PricingError, Result};
use crate::export::{load_artifact, save_artifact, ArtifactKind};

/// Distinct values of one categorical field in first-seen order.
///
/// Persisted as the ordered value list only; the lookup index is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    fn build<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocab = Self { values: Vec::new(), index: HashMap::new() };
        for value in values {
            if !vocab.index.contains_key(value) {
                vocab.index.insert(value.to_string(), vocab.values.len());
                vocab.values.push(value.to_string());
            }
        }
        vocab
    }

    /// Code of `value`, falling back to the first entry's code for unseen values
    #[inline]
    pub fn code(&self, value: &str) -> usize {
        self.index.get(value).copied().unwrap_or(0)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(values: Vec<String>) -> Self {
        Self::build(values.iter().map(String::as_str))
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.values
    }
}

/// Fitted state of one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    Categorical(Vocabulary),
    Numeric(ScalerParams),
}

/// Maps records to fixed-order numeric feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
    columns: Vec<ColumnEncoding>,
    n_samples_seen: usize,
    is_fitted: bool,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(FeatureSchema::car())
    }
}

impl FeatureEncoder {
    /// Create an empty encoder for `schema`
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            columns: Vec::new(),
            n_samples_seen: 0,
            is_fitted: false,
        }
    }

    /// Learn vocabularies and scaler parameters from `records`.
    ///
    /// May only be called once per encoder.
    pub fn fit<R: Record + Sync>(&mut self, records: &[R]) -> Result<&mut Self> {
        if self.is_fitted {
            return Err(PricingError::InvalidInput(
                "encoder is already fitted; create a new encoder to refit".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(PricingError::InvalidInput("cannot fit encoder on zero records".to_string()));
        }
        if self.schema.is_empty() {
            return Err(PricingError::InvalidInput("feature schema declares no fields".to_string()));
        }
        if let Some(spec) = self.schema.fields().iter().find(|f| f.name == self.schema.target()) {
            return Err(PricingError::InvalidInput(format!(
                "target field '{}' must not be a feature",
                spec.name
            )));
        }

        let start = Instant::now();
        let columns = self
            .schema
            .fields()
            .par_iter()
            .map(|spec| fit_column(spec, records))
            .collect::<Result<Vec<_>>>()?;

        self.columns = columns;
        self.n_samples_seen = records.len();
        self.is_fitted = true;

        info!(
            n_samples = records.len(),
            n_features = self.columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature encoder fitted"
        );
        Ok(self)
    }

    /// Encode a single record in schema order
    pub fn transform_one<R: Record>(&self, record: &R) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("feature encoder".to_string()));
        }

        self.schema
            .fields()
            .iter()
            .zip(&self.columns)
            .map(|(spec, column)| {
                let value = record.field(&spec.name).ok_or_else(|| {
                    PricingError::InvalidInput(format!("missing field '{}'", spec.name))
                })?;
                match column {
                    ColumnEncoding::Categorical(vocab) => {
                        let label = value.as_category();
                        if !vocab.contains(&label) {
                            debug!(field = %spec.name, value = %label, "Unseen category, using first known code");
                        }
                        Ok(vocab.code(&label) as f64)
                    }
                    ColumnEncoding::Numeric(params) => {
                        let v = numeric_value(&spec.name, value.as_number())?;
                        Ok(params.apply(v))
                    }
                }
            })
            .collect()
    }

    /// Encode many records into an `(n_records, n_features)` matrix
    pub fn transform<R: Record + Sync>(&self, records: &[R]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("feature encoder".to_string()));
        }

        let rows = records
            .par_iter()
            .map(|r| self.transform_one(r))
            .collect::<Result<Vec<_>>>()?;

        let n_features = self.columns.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((records.len(), n_features), flat)?)
    }

    /// Fit then transform the same records
    pub fn fit_transform<R: Record + Sync>(&mut self, records: &[R]) -> Result<Array2<f64>> {
        self.fit(records)?;
        self.transform(records)
    }

    /// Persist the complete encoder state as one artifact
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_id(path, Uuid::new_v4())
    }

    /// Persist under a given artifact id, used to pair the encoder with its model
    pub fn save_with_id(&self, path: impl AsRef<Path>, artifact_id: Uuid) -> Result<()> {
        if !self.is_fitted {
            return Err(PricingError::NotFitted("feature encoder".to_string()));
        }
        save_artifact(path.as_ref(), ArtifactKind::Encoder, artifact_id, self)
    }

    /// Load an encoder saved by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (_, encoder) = load_artifact::<Self>(path.as_ref(), ArtifactKind::Encoder)?;
        Ok(encoder)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.schema.names()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    /// Vocabulary learned for a categorical field
    pub fn vocabulary(&self, field: &str) -> Option<&Vocabulary> {
        self.column(field).and_then(|c| match c {
            ColumnEncoding::Categorical(v) => Some(v),
            ColumnEncoding::Numeric(_) => None,
        })
    }

    /// Scaler parameters learned for a numeric field
    pub fn scaler(&self, field: &str) -> Option<&ScalerParams> {
        self.column(field).and_then(|c| match c {
            ColumnEncoding::Numeric(p) => Some(p),
            ColumnEncoding::Categorical(_) => None,
        })
    }

    fn column(&self, field: &str) -> Option<&ColumnEncoding> {
        let idx = self.schema.fields().iter().position(|f| f.name == field)?;
        self.columns.get(idx)
    }
}

fn numeric_value(field: &str, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(PricingError::InvalidInput(format!(
            "numeric field '{}' holds non-finite value {}",
            field, v
        ))),
        None => Err(PricingError::InvalidInput(format!(
            "numeric field '{}' holds a non-numeric value",
            field
        ))),
    }
}

fn fit_column<R: Record>(spec: &FieldSpec, records: &[R]) -> Result<ColumnEncoding> {
    let values = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.field(&spec.name).ok_or_else(|| {
                PricingError::InvalidInput(format!("record {} is missing field '{}'", i, spec.name))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match spec.column_type {
        ColumnType::Categorical => {
            let labels: Vec<_> = values.iter().map(|v| v.as_category()).collect();
            Ok(ColumnEncoding::Categorical(Vocabulary::build(
                labels.iter().map(|l| &**l),
            )))
        }
        ColumnType::Numeric => {
            let numbers = values
                .iter()
                .map(|v| numeric_value(&spec.name, v.as_number()))
                .collect::<Result<Vec<_>>>()?;
            Ok(ColumnEncoding::Numeric(ScalerParams::fit(&numbers)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{CarRecord, FieldValue, RawRecord};

    fn car(fuel: &str, year: i64, seats: i64) -> CarRecord {
        CarRecord {
            year,
            km_driven: 10_000,
            fuel: fuel.to_string(),
            transmission: "Manual".to_string(),
            owner: "First".to_string(),
            engine_cc: 1200,
            seats,
        }
    }

    #[test]
    fn test_first_seen_codes() {
        let records = vec![car("Petrol", 2015, 5), car("Diesel", 2016, 5), car("Petrol", 2017, 5), car("Hybrid", 2018, 5)];
        let mut encoder = FeatureEncoder::default();
        encoder.fit(&records).unwrap();

        let vocab = encoder.vocabulary("fuel").unwrap();
        assert_eq!(vocab.values(), &["Petrol", "Diesel", "Hybrid"]);
        assert_eq!(vocab.code("Diesel"), 1);
        assert!(encoder.scaler("fuel").is_none());
        assert!(encoder.vocabulary("year").is_none());
    }

    #[test]
    fn test_unseen_category_uses_first_code() {
        let records = vec![car("Diesel", 2015, 5), car("Petrol", 2016, 5)];
        let mut encoder = FeatureEncoder::default();
        encoder.fit(&records).unwrap();

        let fuel_idx = 2;
        for unseen in ["Electric", "LPG", ""] {
            let row = encoder.transform_one(&car(unseen, 2015, 5)).unwrap();
            assert_eq!(row[fuel_idx], 0.0, "unseen '{}' must map to first code", unseen);
        }
    }

    #[test]
    fn test_zero_variance_field_encodes_to_zero() {
        let records = vec![car("Diesel", 2015, 5), car("Petrol", 2019, 5)];
        let mut encoder = FeatureEncoder::default();
        encoder.fit(&records).unwrap();

        let seats_idx = 6;
        for seats in [2, 5, 8] {
            let row = encoder.transform_one(&car("Diesel", 2015, seats)).unwrap();
            assert_eq!(row[seats_idx], 0.0);
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = FeatureEncoder::default();
        let err = encoder.transform_one(&CarRecord::example()).unwrap_err();
        assert!(matches!(err, PricingError::NotFitted(_)));
    }

    #[test]
    fn test_fit_rejects_empty_and_refit() {
        let mut encoder = FeatureEncoder::default();
        let empty: Vec<CarRecord> = Vec::new();
        assert!(matches!(encoder.fit(&empty), Err(PricingError::InvalidInput(_))));

        encoder.fit(&[CarRecord::example()]).unwrap();
        assert!(matches!(encoder.fit(&[CarRecord::example()]), Err(PricingError::InvalidInput(_))));
    }

    #[test]
    fn test_fit_rejects_non_numeric_value() {
        let schema = FeatureSchema::new(
            vec![FieldSpec::numeric("year"), FieldSpec::categorical("fuel")],
            "price",
        );
        let mut good = RawRecord::new();
        good.insert("year".into(), FieldValue::from(2015));
        good.insert("fuel".into(), FieldValue::from("Petrol"));
        let mut bad = good.clone();
        bad.insert("year".into(), FieldValue::from("twenty-fifteen"));

        let mut encoder = FeatureEncoder::new(schema.clone());
        let err = encoder.fit(&[good.clone(), bad]).unwrap_err();
        assert!(err.to_string().contains("year"));

        let mut nan = good.clone();
        nan.insert("year".into(), FieldValue::Number(f64::NAN));
        let mut encoder = FeatureEncoder::new(schema);
        assert!(matches!(encoder.fit(&[good, nan]), Err(PricingError::InvalidInput(_))));
    }

    #[test]
    fn test_target_in_schema_is_rejected() {
        let schema = FeatureSchema::new(vec![FieldSpec::numeric("price")], "price");
        let mut record = RawRecord::new();
        record.insert("price".into(), FieldValue::from(1.0));
        let mut encoder = FeatureEncoder::new(schema);
        assert!(matches!(encoder.fit(&[record]), Err(PricingError::InvalidInput(_))));
    }

    #[test]
    fn test_transform_matrix_shape() {
        let records = vec![car("Diesel", 2015, 4), car("Petrol", 2019, 7), car("Hybrid", 2021, 5)];
        let mut encoder = FeatureEncoder::default();
        let x = encoder.fit_transform(&records).unwrap();
        assert_eq!(x.dim(), (3, 7));
        assert_eq!(encoder.n_samples_seen(), 3);
        // standardized numeric columns are centred
        let year_mean = x.column(0).sum() / 3.0;
        assert!(year_mean.abs() < 1e-12);
    }

    #[test]
    fn test_save_load_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoder.bin");

        let records = vec![car("Diesel", 2013, 4), car("Petrol", 2017, 7), car("Electric", 2022, 5)];
        let mut encoder = FeatureEncoder::default();
        encoder.fit(&records).unwrap();
        encoder.save(&path).unwrap();

        let loaded = FeatureEncoder::load(&path).unwrap();
        assert_eq!(loaded, encoder);
        for r in records.iter().chain(std::iter::once(&car("CNG", 2001, 3))) {
            let a = encoder.transform_one(r).unwrap();
            let b = loaded.transform_one(r).unwrap();
            let a_bits: Vec<u64> = a.iter().map(|v| v.to_bits()).collect();
            let b_bits: Vec<u64> = b.iter().map(|v| v.to_bits()).collect();
            assert_eq!(a_bits, b_bits);
        }
    }

    #[test]
    fn test_save_unfitted_fails() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FeatureEncoder::default();
        assert!(encoder.save(dir.path().join("e.bin")).is_err());
    }
}

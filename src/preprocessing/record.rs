//! Typed car records and the field schema the encoder is fitted against

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

use super::ColumnType;

/// A single raw field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value; text is never coerced
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// Category label of the value; numbers use their display form
    pub fn as_category(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s.as_str()),
            FieldValue::Number(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Anything the encoder can read named fields from
pub trait Record {
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Untyped record, used for ad-hoc inputs and schema tests
pub type RawRecord = HashMap<String, FieldValue>;

impl Record for RawRecord {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

/// Declared field of the feature schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl FieldSpec {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), column_type: ColumnType::Numeric }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self { name: name.into(), column_type: ColumnType::Categorical }
    }
}

/// Ordered input fields plus the name of the target column.
///
/// Field order here is the feature order of every encoded vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
    target: String,
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>, target: impl Into<String>) -> Self {
        Self { fields, target: target.into() }
    }

    /// Schema of [`CarRecord`] with `price` as the target
    pub fn car() -> Self {
        Self::new(
            vec![
                FieldSpec::numeric("year"),
                FieldSpec::numeric("km_driven"),
                FieldSpec::categorical("fuel"),
                FieldSpec::categorical("transmission"),
                FieldSpec::categorical("owner"),
                FieldSpec::numeric("engine_cc"),
                FieldSpec::numeric("seats"),
            ],
            "price",
        )
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::car()
    }
}

/// Car attributes as accepted at the inference boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    pub year: i64,
    pub km_driven: i64,
    pub fuel: String,
    pub transmission: String,
    pub owner: String,
    pub engine_cc: i64,
    pub seats: i64,
}

impl CarRecord {
    /// The documented sample input
    pub fn example() -> Self {
        Self {
            year: 2020,
            km_driven: 35000,
            fuel: "Diesel".to_string(),
            transmission: "Automatic".to_string(),
            owner: "First".to_string(),
            engine_cc: 1500,
            seats: 5,
        }
    }

    /// Check boundary constraints; the message names the offending field
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(2000..=2024).contains(&self.year) {
            return Err(format!("year must be between 2000 and 2024, got {}", self.year));
        }
        if !(0..=500_000).contains(&self.km_driven) {
            return Err(format!("km_driven must be between 0 and 500000, got {}", self.km_driven));
        }
        if !(2..=8).contains(&self.seats) {
            return Err(format!("seats must be between 2 and 8, got {}", self.seats));
        }
        Ok(())
    }
}

impl Record for CarRecord {
    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "year" => self.year.into(),
            "km_driven" => self.km_driven.into(),
            "fuel" => FieldValue::Text(self.fuel.clone()),
            "transmission" => FieldValue::Text(self.transmission.clone()),
            "owner" => FieldValue::Text(self.owner.clone()),
            "engine_cc" => self.engine_cc.into(),
            "seats" => self.seats.into(),
            _ => return None,
        };
        Some(value)
    }
}

/// One labelled row of the raw dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub record: CarRecord,
    pub price: f64,
}

impl TrainingExample {
    pub fn new(record: CarRecord, price: f64) -> Self {
        Self { record, price }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_car_schema_order() {
        let schema = FeatureSchema::car();
        assert_eq!(
            schema.names(),
            vec!["year", "km_driven", "fuel", "transmission", "owner", "engine_cc", "seats"]
        );
        assert_eq!(schema.target(), "price");
    }

    #[test]
    fn test_car_record_fields() {
        let car = CarRecord::example();
        assert_eq!(car.field("year"), Some(FieldValue::Number(2020.0)));
        assert_eq!(car.field("fuel"), Some(FieldValue::Text("Diesel".into())));
        assert_eq!(car.field("price"), None);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(CarRecord::example().validate().is_ok());

        let mut car = CarRecord::example();
        car.seats = 10;
        assert!(car.validate().unwrap_err().contains("seats"));

        let mut car = CarRecord::example();
        car.year = 1999;
        assert!(car.validate().unwrap_err().contains("year"));

        let mut car = CarRecord::example();
        car.km_driven = 500_001;
        assert!(car.validate().is_err());

    }

    #[test]
    fn test_free_form_fields_are_not_range_checked() {
        let mut car = CarRecord::example();
        car.engine_cc = 0;
        car.fuel = "  ".into();
        car.owner = String::new();
        assert!(car.validate().is_ok());
    }

    #[test]
    fn test_field_value_untagged_json() {
        let v: FieldValue = serde_json::from_str("1500").unwrap();
        assert_eq!(v, FieldValue::Number(1500.0));
        let v: FieldValue = serde_json::from_str("\"Petrol\"").unwrap();
        assert_eq!(v.as_category(), "Petrol");
        assert_eq!(v.as_number(), None);
    }
}

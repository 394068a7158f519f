//! Integration test: feature encoding contract

use std::collections::HashMap;
use vehicle_price::preprocessing::{
    CarRecord, ColumnType, FeatureEncoder, FeatureSchema, FieldSpec, FieldValue, RawRecord,
};
use vehicle_price::synthetic::{generate, GeneratorConfig};
use vehicle_price::PricingError;

fn cars() -> Vec<CarRecord> {
    generate(&GeneratorConfig::default().with_rows(300))
        .into_iter()
        .map(|e| e.record)
        .collect()
}

#[test]
fn test_categorical_columns_are_valid_vocabulary_indices() {
    let records = cars();
    let mut encoder = FeatureEncoder::default();
    let x = encoder.fit_transform(&records).unwrap();

    for (j, field) in encoder.schema().fields().iter().enumerate() {
        if field.column_type != ColumnType::Categorical {
            continue;
        }
        let vocab = encoder.vocabulary(&field.name).unwrap();
        for &code in x.column(j).iter() {
            assert_eq!(code, code.trunc());
            assert!((code as usize) < vocab.len(), "{} code {} out of range", field.name, code);
        }
    }
}

#[test]
fn test_reloaded_encoder_is_bit_identical() {
    let records = cars();
    let mut encoder = FeatureEncoder::default();
    encoder.fit(&records).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoder.bin");
    encoder.save(&path).unwrap();
    let loaded = FeatureEncoder::load(&path).unwrap();

    let before = encoder.transform(&records).unwrap();
    let after = loaded.transform(&records).unwrap();
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_every_unseen_value_maps_to_first_code() {
    let records = cars();
    let mut encoder = FeatureEncoder::default();
    encoder.fit(&records).unwrap();
    let fuel_idx = 2;

    for unseen in ["Hydrogen", "LPG", "petrol", ""] {
        let mut car = CarRecord::example();
        car.fuel = unseen.to_string();
        let features = encoder.transform_one(&car).unwrap();
        assert_eq!(features[fuel_idx], 0.0, "unseen fuel {:?}", unseen);
    }

    let first = encoder.vocabulary("fuel").unwrap().values()[0].clone();
    let mut car = CarRecord::example();
    car.fuel = first;
    assert_eq!(encoder.transform_one(&car).unwrap()[fuel_idx], 0.0);
}

#[test]
fn test_zero_variance_field_encodes_to_zero() {
    let mut records = cars();
    for r in &mut records {
        r.seats = 5;
    }
    let mut encoder = FeatureEncoder::default();
    encoder.fit(&records).unwrap();

    for seats in [2, 5, 8] {
        let mut car = CarRecord::example();
        car.seats = seats;
        let features = encoder.transform_one(&car).unwrap();
        assert_eq!(features[6], 0.0);
        assert!(features.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_generic_schema_rejects_text_in_numeric_field() {
    let schema = FeatureSchema::new(
        vec![FieldSpec::numeric("mileage"), FieldSpec::categorical("colour")],
        "price",
    );
    let rows: Vec<RawRecord> = vec![
        HashMap::from([
            ("mileage".to_string(), FieldValue::from(1200.0)),
            ("colour".to_string(), FieldValue::from("red")),
        ]),
        HashMap::from([
            ("mileage".to_string(), FieldValue::from("a lot")),
            ("colour".to_string(), FieldValue::from("blue")),
        ]),
    ];
    let mut encoder = FeatureEncoder::new(schema);
    assert!(matches!(encoder.fit(&rows), Err(PricingError::InvalidInput(_))));
}

#[test]
fn test_transform_before_fit() {
    let encoder = FeatureEncoder::default();
    assert!(matches!(
        encoder.transform_one(&CarRecord::example()),
        Err(PricingError::NotFitted(_))
    ));
}

//! Feature preprocessing
//!
//! Turns raw car records into the numeric feature vectors the regressors consume:
//! - Typed record schema with boundary validation
//! - Categorical label encoding with first-seen vocabularies
//! - Numeric standardization with a zero-variance guard

mod encoder;
mod record;
mod scaler;

pub use encoder::{ColumnEncoding, FeatureEncoder, Vocabulary};
pub use record::{
    CarRecord, FeatureSchema, FieldSpec, FieldValue, RawRecord, Record, TrainingExample,
};
pub use scaler::ScalerParams;

use serde::{Deserialize, Serialize};

/// Column data type for preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

//! Price-band confidence tiers
//!
//! A display heuristic over the predicted price, not calibrated uncertainty.
//! The bands overlap: high is checked first, then the wider medium band.

use serde::{Deserialize, Serialize};

const HIGH_BAND: (f64, f64) = (10_000.0, 50_000.0);
const MEDIUM_BAND: (f64, f64) = (5_000.0, 70_000.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Tier of an unrounded predicted price
    pub fn from_price(price: f64) -> Self {
        let within = |(lo, hi): (f64, f64)| price >= lo && price <= hi;
        if within(HIGH_BAND) {
            ConfidenceTier::High
        } else if within(MEDIUM_BAND) {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

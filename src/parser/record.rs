use chrono::{DateTime, Utc};
use serde::Serialize;

use super::facts::FactRow;
use super::scalars::ScalarFields;

/// One fully assembled product observation. Field order is the dataset
/// column order: the five scalars with supermarket and date interleaved,
/// then the six nutrition columns when a FactRow was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub title: Option<String>,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub supermarket: String,
    pub price_per_unit: Option<String>,
    pub image_url: Option<String>,
    #[serde(rename = "date")]
    pub captured_at: DateTime<Utc>,
    #[serde(flatten)]
    pub facts: Option<FactRow>,
}

/// Compose scalars, optional facts, the supermarket label, and the capture
/// timestamp into one Record. Pure; cannot fail. A record with every data
/// field absent is still valid and still carries supermarket and date.
pub fn assemble(
    scalars: ScalarFields,
    facts: Option<FactRow>,
    supermarket: &str,
    captured_at: DateTime<Utc>,
) -> Record {
    Record {
        title: scalars.title,
        price: scalars.price,
        weight: scalars.weight,
        supermarket: supermarket.to_string(),
        price_per_unit: scalars.price_per_unit,
        image_url: scalars.image_url,
        captured_at,
        facts,
    }
}

// ── Tests ──

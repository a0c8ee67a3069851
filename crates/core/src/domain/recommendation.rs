use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of watches every recommendation carries.
pub const WATCH_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub watches: Vec<Watch>,
    pub expert_advice: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub brand: String,
    pub model: String,
    pub price_range: String,
    pub style: String,
    pub movement: String,
    pub diameter: String,
    pub description: String,
    pub image_url: String,
    pub is_promoted: bool,
}

impl Recommendation {
    pub fn promoted(&self) -> impl Iterator<Item = &Watch> {
        self.watches.iter().filter(|w| w.is_promoted)
    }
}

use crate::domain::image::image_url_for;
use crate::domain::recommendation::{Recommendation, Watch, WATCH_COUNT};
use crate::llm::promotion::PromotionSource;
use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload shape the generation service is asked to emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRecommendation {
    pub watches: Vec<LlmWatch>,
    pub expert_advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmWatch {
    pub brand: String,
    pub model: String,
    pub price_range: String,
    pub style: String,
    pub movement: String,
    pub diameter: String,
    pub description: String,
    // Requested by the schema but never used: image URLs are always rebuilt locally.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl LlmRecommendation {
    pub fn validate_and_into_recommendation(
        self,
        promotion: &dyn PromotionSource,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<Recommendation> {
        ensure!(
            self.watches.len() == WATCH_COUNT,
            "LLM output must contain exactly {WATCH_COUNT} watches (got {})",
            self.watches.len()
        );

        let watches = self
            .watches
            .into_iter()
            .map(|w| w.into_watch(promotion.draw()))
            .collect();

        Ok(Recommendation {
            watches,
            expert_advice: self.expert_advice.trim().to_string(),
            generated_at,
        })
    }
}

impl LlmWatch {
    fn into_watch(self, is_promoted: bool) -> Watch {
        let image_url = image_url_for(&self.brand, &self.model);
        Watch {
            brand: self.brand,
            model: self.model,
            price_range: self.price_range,
            style: self.style,
            movement: self.movement,
            diameter: self.diameter,
            description: self.description,
            image_url,
            is_promoted,
        }
    }
}

pub mod error;
pub mod gemini;
pub mod json;
pub mod promotion;
pub mod prompt;

use crate::domain::preferences::UserPreferences;
use crate::domain::recommendation::Recommendation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One request, no retry. Every failure comes back as a single error.
    async fn fetch_recommendations(
        &self,
        preferences: &UserPreferences,
    ) -> anyhow::Result<Recommendation>;
}

use crate::config::Settings;
use crate::domain::preferences::UserPreferences;
use crate::domain::recommendation::{Recommendation, WATCH_COUNT};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::promotion::{PromotionSource, RandomPromotion};
use crate::llm::{json, prompt};
use crate::llm::{LlmClient, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const WATCH_FIELDS: [&str; 8] = [
    "brand",
    "model",
    "priceRange",
    "style",
    "movement",
    "diameter",
    "description",
    "imageUrl",
];

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    promotion: Arc<dyn PromotionSource>,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url = std::env::var("GEMINI_BASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, base_url, model, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            promotion: Arc::new(RandomPromotion::default()),
        })
    }

    pub fn with_promotion(mut self, promotion: Arc<dyn PromotionSource>) -> Self {
        self.promotion = promotion;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_path
        )
    }

    async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<(Value, GenerateContentResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let res = self
            .http
            .post(self.endpoint())
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            let message = raw_response_json
                .as_ref()
                .and_then(|v| v.pointer("/error/message"))
                .and_then(Value::as_str)
                .map(|m| format!(", message={m}"))
                .unwrap_or_default();
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}{message}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn response_schema() -> Value {
        let watch_properties: serde_json::Map<String, Value> = WATCH_FIELDS
            .iter()
            .map(|field| {
                let schema = if *field == "imageUrl" {
                    serde_json::json!({
                        "type": "STRING",
                        "description": "A high-quality placeholder keyword for unsplash (e.g. 'rolex submariner')"
                    })
                } else {
                    serde_json::json!({"type": "STRING"})
                };
                (field.to_string(), schema)
            })
            .collect();

        serde_json::json!({
            "type": "OBJECT",
            "required": ["watches", "expertAdvice"],
            "properties": {
                "watches": {
                    "type": "ARRAY",
                    "minItems": WATCH_COUNT,
                    "maxItems": WATCH_COUNT,
                    "items": {
                        "type": "OBJECT",
                        "required": WATCH_FIELDS,
                        "properties": watch_properties
                    }
                },
                "expertAdvice": {"type": "STRING"}
            }
        })
    }

    fn request(instruction: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: instruction }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: Self::response_schema(),
                candidate_count: 1,
            },
        }
    }

    fn response_text(res: &GenerateContentResponse, raw_json: &Value) -> anyhow::Result<String> {
        let Some(candidate) = res.candidates.first() else {
            let (stage, detail) = match res
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                Some(reason) => ("blocked", format!("prompt blocked: {reason}")),
                None => ("empty_response", "response has no candidates".to_string()),
            };
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage,
                detail,
                raw_output: None,
                raw_response_json: Some(raw_json.clone()),
            }
            .into());
        };

        let mut out = String::new();
        let parts = candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();
        for part in parts {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }

        if out.trim().is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "empty_response",
                detail: format!(
                    "candidate has no text (finish_reason={})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
                raw_output: None,
                raw_response_json: Some(raw_json.clone()),
            }
            .into());
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn fetch_recommendations(
        &self,
        preferences: &UserPreferences,
    ) -> anyhow::Result<Recommendation> {
        let req = Self::request(prompt::render_instruction(preferences));
        tracing::debug!(model = %self.model, "requesting watch recommendations");

        let (raw_json, res) = self.generate_content(&req).await?;
        let text = Self::response_text(&res, &raw_json)?;

        let diagnostics = |stage: &'static str, err: anyhow::Error| LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage,
            detail: format!("{err:#}"),
            raw_output: Some(text.clone()),
            raw_response_json: Some(raw_json.clone()),
        };

        let payload = json::parse_recommendation(&text).map_err(|e| diagnostics("parse", e))?;
        let recommendation = payload
            .validate_and_into_recommendation(self.promotion.as_ref(), chrono::Utc::now())
            .map_err(|e| diagnostics("validate", e))?;

        tracing::info!(
            model = %self.model,
            watches = recommendation.watches.len(),
            promoted = recommendation.promoted().count(),
            "received watch recommendations"
        );
        Ok(recommendation)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    candidate_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,

    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,

    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,

    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::LlmRecommendation;
    use crate::domain::image::image_url_for;
    use crate::domain::preferences::{Complication, Style};
    use crate::llm::promotion::SequencePromotion;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::Json;
    use serde_json::json;
    use std::sync::Mutex;

    struct SeenRequest {
        path: String,
        api_key: Option<String>,
        body: Value,
    }

    #[derive(Clone)]
    struct Upstream {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<SeenRequest>>>,
    }

    async fn answer(
        State(upstream): State<Upstream>,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        upstream.seen.lock().unwrap().push(SeenRequest {
            path: uri.path().to_string(),
            api_key: headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        (upstream.status, Json(upstream.reply.clone()))
    }

    /// Serves one canned `generateContent` reply on a local port and returns
    /// the base URL to point the client at.
    async fn upstream(
        status: StatusCode,
        reply: Value,
    ) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = axum::Router::new().fallback(answer).with_state(Upstream {
            status,
            reply,
            seen: seen.clone(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1beta"), seen)
    }

    fn watches_payload(count: usize) -> String {
        let watches: Vec<_> = (1..=count)
            .map(|i| {
                json!({
                    "brand": "Tudor",
                    "model": format!("Black Bay {i}"),
                    "priceRange": "3500€",
                    "style": "Diver",
                    "movement": "Automatique",
                    "diameter": "39mm",
                    "description": "Une plongeuse polyvalente.",
                    "imageUrl": "https://example.com/tudor.jpg",
                })
            })
            .collect();
        json!({ "watches": watches, "expertAdvice": "  Essayez-la au poignet.  " }).to_string()
    }

    fn diver_preferences() -> UserPreferences {
        UserPreferences {
            style: [Style::Diver].into_iter().collect(),
            complications: [Complication::NoPreference].into_iter().collect(),
            ..UserPreferences::default()
        }
    }

    fn stage_of(err: &anyhow::Error) -> &'static str {
        err.downcast_ref::<LlmDiagnosticsError>()
            .map(|d| d.stage)
            .unwrap_or("not a diagnostics error")
    }

    fn client(base_url: &str, model: &str) -> GeminiClient {
        GeminiClient::new("test-key", base_url, model, Duration::from_secs(5)).unwrap()
    }

    fn response_with_text(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "réflexion interne", "thought": true },
                        { "text": text }
                    ]
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn endpoint_normalizes_model_and_base() {
        let c = client("https://example.test/v1beta/", "gemini-3-flash-preview");
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-3-flash-preview:generateContent"
        );

        let c = client("https://example.test/v1beta", "models/gemini-pro");
        assert_eq!(
            c.endpoint(),
            "https://example.test/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn request_carries_schema_and_instruction() {
        let body = serde_json::to_value(GeminiClient::request("Trouve 4 montres".into())).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Trouve 4 montres");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["candidateCount"], 1);

        let schema = &body["generationConfig"]["responseSchema"];
        assert_eq!(schema["required"], json!(["watches", "expertAdvice"]));
        assert_eq!(schema["properties"]["watches"]["minItems"], 4);
        assert_eq!(schema["properties"]["watches"]["maxItems"], 4);
        let required = schema["properties"]["watches"]["items"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 8);
        assert!(required.contains(&json!("imageUrl")));
        assert_eq!(
            schema["properties"]["watches"]["items"]["properties"]["diameter"]["type"],
            "STRING"
        );
    }

    #[test]
    fn response_text_skips_thought_parts() {
        let raw = response_with_text("{\"watches\": []}");
        let res: GenerateContentResponse = serde_json::from_value(raw.clone()).unwrap();
        let text = GeminiClient::response_text(&res, &raw).unwrap();
        assert_eq!(text, "{\"watches\": []}");
    }

    #[test]
    fn blocked_prompt_is_a_diagnostics_error() {
        let raw = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let res: GenerateContentResponse = serde_json::from_value(raw.clone()).unwrap();
        let err = GeminiClient::response_text(&res, &raw).unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "blocked");
        assert!(diag.detail.contains("SAFETY"));
    }

    #[test]
    fn empty_candidate_is_a_diagnostics_error() {
        let raw = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        let res: GenerateContentResponse = serde_json::from_value(raw.clone()).unwrap();
        let err = GeminiClient::response_text(&res, &raw).unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "empty_response");
        assert!(diag.detail.contains("MAX_TOKENS"));
    }

    #[test]
    fn candidate_text_decodes_into_contract() {
        let watches: Vec<_> = (1..=4)
            .map(|i| {
                json!({
                    "brand": "Seiko",
                    "model": format!("Prospex {i}"),
                    "priceRange": "600€",
                    "style": "Diver",
                    "movement": "Quartz",
                    "diameter": "42mm",
                    "description": "Robuste.",
                    "imageUrl": "seiko prospex",
                })
            })
            .collect();
        let payload = json!({ "watches": watches, "expertAdvice": "Solide." }).to_string();

        let raw = response_with_text(&payload);
        let res: GenerateContentResponse = serde_json::from_value(raw.clone()).unwrap();
        let text = GeminiClient::response_text(&res, &raw).unwrap();
        let parsed: LlmRecommendation = json::parse_recommendation(&text).unwrap();
        assert_eq!(parsed.watches.len(), 4);
        assert_eq!(parsed.watches[3].model, "Prospex 4");
    }

    #[tokio::test]
    async fn fetch_returns_four_watches_with_derived_images() {
        let (base_url, seen) =
            upstream(StatusCode::OK, response_with_text(&watches_payload(4))).await;
        let promotion = SequencePromotion::new([false, true, false, false]);
        let client = client(&base_url, "gemini-test").with_promotion(Arc::new(promotion));

        let rec = client.fetch_recommendations(&diver_preferences()).await.unwrap();

        assert_eq!(rec.watches.len(), 4);
        for w in &rec.watches {
            assert_eq!(w.image_url, image_url_for(&w.brand, &w.model));
        }
        let promoted: Vec<_> = rec.promoted().map(|w| w.model.as_str()).collect();
        assert_eq!(promoted, ["Black Bay 2"]);
        assert_eq!(rec.expert_advice, "Essayez-la au poignet.");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
        let body = &seen[0].body;
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["watches"]["maxItems"],
            4
        );
        let instruction = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("Diver"), "{instruction}");
    }

    #[tokio::test]
    async fn http_error_carries_the_service_message() {
        let reply = json!({ "error": { "code": 500, "message": "backend overloaded" } });
        let (base_url, _) = upstream(StatusCode::INTERNAL_SERVER_ERROR, reply).await;

        let err = client(&base_url, "gemini-test")
            .fetch_recommendations(&diver_preferences())
            .await
            .unwrap_err();

        assert_eq!(stage_of(&err), "http");
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert!(diag.detail.contains("500"), "{}", diag.detail);
        assert!(diag.detail.contains("backend overloaded"), "{}", diag.detail);
        assert!(diag.raw_response_json.is_some());
    }

    #[tokio::test]
    async fn wrong_watch_count_fails_validation() {
        let (base_url, _) =
            upstream(StatusCode::OK, response_with_text(&watches_payload(3))).await;

        let err = client(&base_url, "gemini-test")
            .fetch_recommendations(&diver_preferences())
            .await
            .unwrap_err();

        assert_eq!(stage_of(&err), "validate");
    }

    #[tokio::test]
    async fn non_json_text_fails_parsing() {
        let reply = response_with_text("Voici mes suggestions : une Rolex.");
        let (base_url, _) = upstream(StatusCode::OK, reply).await;

        let err = client(&base_url, "gemini-test")
            .fetch_recommendations(&diver_preferences())
            .await
            .unwrap_err();

        assert_eq!(stage_of(&err), "parse");
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.raw_output.as_deref(), Some("Voici mes suggestions : une Rolex."));
    }
}

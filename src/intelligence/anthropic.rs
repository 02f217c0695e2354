//! Anthropic Messages API scoring provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::prompts::{build_scoring_prompt, build_system_prompt, parse_scoring_response};
use super::{estimate_cost, AiScoreResult, ScoringProvider, ScoringRequest};
use crate::error::{DashboardError, Result};
use crate::types::ModelProvider;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1500;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

#[async_trait]
impl ScoringProvider for AnthropicProvider {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<AiScoreResult> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": request.temperature,
            "system": build_system_prompt(request),
            "messages": [
                { "role": "user", "content": build_scoring_prompt(request) }
            ],
        });

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DashboardError::RateLimited { service: "Anthropic" });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Api {
                service: "Anthropic",
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        Ok(into_result(parsed, &self.model, request))
    }
}

fn into_result(resp: MessagesResponse, model: &str, request: &ScoringRequest<'_>) -> AiScoreResult {
    let text = resp.text();
    let scores = parse_scoring_response(&text, request.stage);
    let model = resp.model.clone().unwrap_or_else(|| model.to_string());
    let (input, output) = resp
        .usage
        .as_ref()
        .map(|u| (u.input_tokens, u.output_tokens))
        .unwrap_or((0, 0));

    log::debug!(
        "Anthropic: scored {} with {} suggestions ({} tokens)",
        request.feature.identifier,
        scores.suggestions.len(),
        input + output
    );

    AiScoreResult {
        suggestions: scores.suggestions,
        summary: scores.summary,
        tokens_used: input + output,
        cost: estimate_cost(&model, input, output),
        model,
    }
}

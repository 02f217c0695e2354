//! OpenAI Chat Completions scoring provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::prompts::{build_scoring_prompt, build_system_prompt, parse_scoring_response};
use super::{estimate_cost, AiScoreResult, ScoringProvider, ScoringRequest};
use crate::error::{DashboardError, Result};
use crate::types::ModelProvider;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

#[async_trait]
impl ScoringProvider for OpenAiProvider {
    fn provider(&self) -> ModelProvider {
        ModelProvider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<AiScoreResult> {
        let body = json!({
            "model": self.model,
            "temperature": request.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": build_system_prompt(request) },
                { "role": "user", "content": build_scoring_prompt(request) }
            ],
        });

        let resp = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DashboardError::RateLimited { service: "OpenAI" });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Api {
                service: "OpenAI",
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: CompletionResponse = resp.json().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| DashboardError::Parse("OpenAI response had no choices".to_string()))?;

        let scores = parse_scoring_response(&text, request.stage);
        let model = parsed.model.unwrap_or_else(|| self.model.clone());
        let (input, output) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        log::debug!(
            "OpenAI: scored {} with {} suggestions ({} tokens)",
            request.feature.identifier,
            scores.suggestions.len(),
            input + output
        );

        Ok(AiScoreResult {
            suggestions: scores.suggestions,
            summary: scores.summary,
            tokens_used: input + output,
            cost: estimate_cost(&model, input, output),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completion_with_null_content() {
        let resp: CompletionResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o-2024-08-06",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": null}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }"#,
        )
        .unwrap();
        assert!(resp.choices[0].message.content.is_none());
        assert_eq!(resp.usage.unwrap().completion_tokens, 5);
    }
}

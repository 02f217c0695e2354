//! LLM-assisted factor scoring.
//!
//! A `ScoringProvider` turns one feature (plus related posts and tickets) into
//! per-factor suggestions. `ScoringCapability` picks which providers to call
//! for the configured `ModelMode`, including calling both in compare mode.

pub mod anthropic;
pub mod openai;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::correlate::{RelatedPost, RelatedTicket};
use crate::error::{DashboardError, Result};
use crate::settings::PromptConfig;
use crate::types::{
    Factor, FeatureRequest, ModelMode, ModelProvider, ProductStage, ScoreFactors, ScoringFramework,
};

/// One factor suggestion from a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub factor: Factor,
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
    /// 0.0-1.0; defaults to 0.5 when the model omits it.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Everything one provider returned for one feature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiScoreResult {
    pub suggestions: Vec<AiSuggestion>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub model: String,
}

impl AiScoreResult {
    /// Suggestions as sparse factor scores, clamped to 1-10.
    pub fn to_factors(&self) -> ScoreFactors {
        let mut factors = ScoreFactors::default();
        for s in &self.suggestions {
            factors.set(s.factor, Some(s.score.clamp(1.0, 10.0)));
        }
        factors
    }
}

/// Input for one provider call.
pub struct ScoringRequest<'a> {
    pub feature: &'a FeatureRequest,
    pub stage: ProductStage,
    pub related_posts: &'a [RelatedPost],
    pub related_tickets: &'a [RelatedTicket],
    pub framework: ScoringFramework,
    pub prompt: &'a PromptConfig,
    pub temperature: f64,
}

#[async_trait]
pub trait ScoringProvider: Send + Sync {
    fn provider(&self) -> ModelProvider;

    fn model(&self) -> &str;

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<AiScoreResult>;
}

/// Results of scoring one feature in the configured mode.
#[derive(Debug, Clone, Default)]
pub struct ScoringOutcome {
    pub anthropic: Option<AiScoreResult>,
    pub openai: Option<AiScoreResult>,
    pub tokens_used: u64,
    pub cost: f64,
}

impl ScoringOutcome {
    fn push(&mut self, provider: ModelProvider, result: AiScoreResult) {
        self.tokens_used += result.tokens_used;
        self.cost += result.cost;
        match provider {
            ModelProvider::Anthropic => self.anthropic = Some(result),
            ModelProvider::OpenAi => self.openai = Some(result),
        }
    }

    pub fn models_used(&self) -> String {
        [self.anthropic.as_ref(), self.openai.as_ref()]
            .into_iter()
            .flatten()
            .map(|r| r.model.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// The set of configured providers.
#[derive(Clone, Default)]
pub struct ScoringCapability {
    pub anthropic: Option<Arc<dyn ScoringProvider>>,
    pub openai: Option<Arc<dyn ScoringProvider>>,
}

impl ScoringCapability {
    pub fn new(
        anthropic: Option<Arc<dyn ScoringProvider>>,
        openai: Option<Arc<dyn ScoringProvider>>,
    ) -> Self {
        Self { anthropic, openai }
    }

    pub fn is_configured(&self) -> bool {
        self.anthropic.is_some() || self.openai.is_some()
    }

    fn get(&self, provider: ModelProvider) -> Option<&Arc<dyn ScoringProvider>> {
        match provider {
            ModelProvider::Anthropic => self.anthropic.as_ref(),
            ModelProvider::OpenAi => self.openai.as_ref(),
        }
    }

    /// Fail fast, before any work starts, when the mode cannot be served.
    pub fn ensure_ready(&self, mode: ModelMode) -> Result<()> {
        let missing = match mode {
            ModelMode::Anthropic if self.anthropic.is_none() => Some("Anthropic"),
            ModelMode::OpenAi if self.openai.is_none() => Some("OpenAI"),
            ModelMode::Compare if self.anthropic.is_none() => Some("Anthropic"),
            ModelMode::Compare if self.openai.is_none() => Some("OpenAI"),
            _ => None,
        };

        match missing {
            Some(name) => Err(DashboardError::Configuration(format!(
                "No {} scoring provider configured",
                name
            ))),
            None => Ok(()),
        }
    }

    /// Score one feature. In compare mode both providers run concurrently and
    /// the call only fails if both fail.
    pub async fn score(
        &self,
        mode: ModelMode,
        request: &ScoringRequest<'_>,
    ) -> Result<ScoringOutcome> {
        self.ensure_ready(mode)?;
        let mut outcome = ScoringOutcome::default();

        match mode {
            ModelMode::Anthropic | ModelMode::OpenAi => {
                let provider = if mode == ModelMode::Anthropic {
                    ModelProvider::Anthropic
                } else {
                    ModelProvider::OpenAi
                };
                let client = self
                    .get(provider)
                    .ok_or_else(|| DashboardError::Configuration(format!("No {} provider", provider)))?;
                outcome.push(provider, client.score(request).await?);
            }
            ModelMode::Compare => {
                let (Some(a), Some(o)) = (self.anthropic.as_ref(), self.openai.as_ref()) else {
                    return Err(DashboardError::Configuration(
                        "Compare mode needs both providers".to_string(),
                    ));
                };
                let (a_res, o_res) = tokio::join!(a.score(request), o.score(request));

                match (a_res, o_res) {
                    (Err(a_err), Err(o_err)) => {
                        return Err(DashboardError::ProvidersFailed {
                            detail: format!("anthropic: {}; openai: {}", a_err, o_err),
                            retryable: a_err.is_retryable() || o_err.is_retryable(),
                        })
                    }
                    (a_res, o_res) => {
                        match a_res {
                            Ok(r) => outcome.push(ModelProvider::Anthropic, r),
                            Err(e) => log::warn!("Scoring: anthropic failed in compare mode: {}", e),
                        }
                        match o_res {
                            Ok(r) => outcome.push(ModelProvider::OpenAi, r),
                            Err(e) => log::warn!("Scoring: openai failed in compare mode: {}", e),
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }
}

/// Per-million-token prices (input, output) in USD. Unknown models cost 0.
pub fn model_pricing(model: &str) -> (f64, f64) {
    let m = model.to_lowercase();
    if m.contains("opus") {
        (15.0, 75.0)
    } else if m.contains("sonnet") {
        (3.0, 15.0)
    } else if m.contains("haiku") {
        (0.8, 4.0)
    } else if m.contains("gpt-4o-mini") {
        (0.15, 0.6)
    } else if m.contains("gpt-4o") {
        (2.5, 10.0)
    } else if m.contains("gpt-4.1") {
        (2.0, 8.0)
    } else {
        (0.0, 0.0)
    }
}

pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input, output) = model_pricing(model);
    (input_tokens as f64 * input + output_tokens as f64 * output) / 1_000_000.0
}

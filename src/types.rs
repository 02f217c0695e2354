//! Domain types shared by correlation, scoring and the command layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Classification enums
// =============================================================================

/// Product line a feature request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Product {
    Platform,
    Integrations,
    Mobile,
    AiAgents,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::Platform,
        Product::Integrations,
        Product::Mobile,
        Product::AiAgents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Platform => "platform",
            Product::Integrations => "integrations",
            Product::Mobile => "mobile",
            Product::AiAgents => "ai-agents",
        }
    }

    /// Stage used when no product rule overrides it.
    pub fn default_stage(&self) -> ProductStage {
        match self {
            Product::AiAgents => ProductStage::New,
            _ => ProductStage::Mature,
        }
    }
}

impl Default for Product {
    fn default() -> Self {
        Product::Platform
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Product::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown product: {}", s))
    }
}

/// Product maturity; selects the factor set and weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStage {
    Mature,
    New,
}

impl ProductStage {
    /// Factors that participate in scoring for this stage.
    pub fn factors(&self) -> &'static [Factor] {
        match self {
            ProductStage::Mature => &[
                Factor::RevenueImpact,
                Factor::EnterpriseReadiness,
                Factor::RequestVolume,
                Factor::CompetitiveParity,
                Factor::StrategicAlignment,
                Factor::Effort,
            ],
            ProductStage::New => &[
                Factor::CapabilityGap,
                Factor::StrategicAlignment,
                Factor::CompetitiveDifferentiation,
                Factor::RequestVolume,
                Factor::Effort,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    Enterprise,
    Business,
    Pro,
    Free,
}

impl CustomerTier {
    pub const ALL: [CustomerTier; 4] = [
        CustomerTier::Enterprise,
        CustomerTier::Business,
        CustomerTier::Pro,
        CustomerTier::Free,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Enterprise => "enterprise",
            CustomerTier::Business => "business",
            CustomerTier::Pro => "pro",
            CustomerTier::Free => "free",
        }
    }
}

impl Default for CustomerTier {
    fn default() -> Self {
        CustomerTier::Business
    }
}

impl FromStr for CustomerTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CustomerTier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown customer tier: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    #[default]
    Feature,
    Enhancement,
    Bug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSource {
    Featurebase,
    #[default]
    Internal,
    Support,
}

// =============================================================================
// Feature request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureComment {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The unified entity correlated from Linear, Featurebase and Zendesk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    pub id: String,
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub comments: Vec<FeatureComment>,
    #[serde(default)]
    pub url: String,
    pub product: Product,
    pub customer_tier: CustomerTier,
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub source: FeatureSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featurebase_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featurebase_post_id: Option<String>,
    #[serde(default)]
    pub featurebase_upvotes: u32,
    /// Confidence of the Featurebase match (1.0 for a direct link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
    #[serde(default)]
    pub support_ticket_count: u32,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureRequest {
    /// Title and description joined for keyword extraction.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

// =============================================================================
// Factors and scores
// =============================================================================

/// A named, independently weighted scoring dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    RevenueImpact,
    EnterpriseReadiness,
    RequestVolume,
    CompetitiveParity,
    StrategicAlignment,
    Effort,
    CapabilityGap,
    CompetitiveDifferentiation,
}

impl Factor {
    pub const ALL: [Factor; 8] = [
        Factor::RevenueImpact,
        Factor::EnterpriseReadiness,
        Factor::RequestVolume,
        Factor::CompetitiveParity,
        Factor::StrategicAlignment,
        Factor::Effort,
        Factor::CapabilityGap,
        Factor::CompetitiveDifferentiation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::RevenueImpact => "revenueImpact",
            Factor::EnterpriseReadiness => "enterpriseReadiness",
            Factor::RequestVolume => "requestVolume",
            Factor::CompetitiveParity => "competitiveParity",
            Factor::StrategicAlignment => "strategicAlignment",
            Factor::Effort => "effort",
            Factor::CapabilityGap => "capabilityGap",
            Factor::CompetitiveDifferentiation => "competitiveDifferentiation",
        }
    }

    /// Human label used in prompts and write-back comments.
    pub fn label(&self) -> &'static str {
        match self {
            Factor::RevenueImpact => "Revenue impact",
            Factor::EnterpriseReadiness => "Enterprise readiness",
            Factor::RequestVolume => "Request volume",
            Factor::CompetitiveParity => "Competitive parity",
            Factor::StrategicAlignment => "Strategic alignment",
            Factor::Effort => "Effort",
            Factor::CapabilityGap => "Capability gap",
            Factor::CompetitiveDifferentiation => "Competitive differentiation",
        }
    }

    /// Lenient lookup used when parsing model output: accepts camelCase,
    /// snake_case, and space-separated labels in any case.
    pub fn parse_loose(s: &str) -> Option<Factor> {
        let squashed: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Factor::ALL
            .into_iter()
            .find(|f| f.as_str().to_lowercase() == squashed)
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse factor scores (1-10), plus the legacy categorical `customerTier`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_readiness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_parity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_alignment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_gap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_differentiation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_tier: Option<CustomerTier>,
}

impl ScoreFactors {
    pub fn get(&self, factor: Factor) -> Option<f64> {
        match factor {
            Factor::RevenueImpact => self.revenue_impact,
            Factor::EnterpriseReadiness => self.enterprise_readiness,
            Factor::RequestVolume => self.request_volume,
            Factor::CompetitiveParity => self.competitive_parity,
            Factor::StrategicAlignment => self.strategic_alignment,
            Factor::Effort => self.effort,
            Factor::CapabilityGap => self.capability_gap,
            Factor::CompetitiveDifferentiation => self.competitive_differentiation,
        }
    }

    pub fn set(&mut self, factor: Factor, value: Option<f64>) {
        let slot = match factor {
            Factor::RevenueImpact => &mut self.revenue_impact,
            Factor::EnterpriseReadiness => &mut self.enterprise_readiness,
            Factor::RequestVolume => &mut self.request_volume,
            Factor::CompetitiveParity => &mut self.competitive_parity,
            Factor::StrategicAlignment => &mut self.strategic_alignment,
            Factor::Effort => &mut self.effort,
            Factor::CapabilityGap => &mut self.capability_gap,
            Factor::CompetitiveDifferentiation => &mut self.competitive_differentiation,
        };
        *slot = value;
    }

    /// Overlay `other` on top of `self`: every value present in `other` wins.
    pub fn overlay(&mut self, other: &ScoreFactors) {
        for factor in Factor::ALL {
            if let Some(v) = other.get(factor) {
                self.set(factor, Some(v));
            }
        }
        if other.customer_tier.is_some() {
            self.customer_tier = other.customer_tier;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customer_tier.is_none() && Factor::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringFramework {
    #[default]
    Weighted,
    Rice,
}

impl ScoringFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringFramework::Weighted => "weighted",
            ScoringFramework::Rice => "rice",
        }
    }
}

/// External LLM vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Anthropic,
    OpenAi,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::OpenAi => "openai",
        }
    }

    pub fn other(&self) -> ModelProvider {
        match self {
            ModelProvider::Anthropic => ModelProvider::OpenAi,
            ModelProvider::OpenAi => ModelProvider::Anthropic,
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which providers a scoring run calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    #[default]
    Anthropic,
    OpenAi,
    Compare,
}

// =============================================================================
// Scoring output
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRow {
    pub factor: Factor,
    pub weight: f64,
    pub score: f64,
    pub contribution: f64,
}

pub const FLAG_PENDING_AI_SCORE: &str = "pending-ai-score";
pub const FLAG_STALE_AI_SCORE: &str = "stale-ai-score";
pub const FLAG_MANUAL_OVERRIDE: &str = "manual-override";
pub const FLAG_SCORE_CAPPED: &str = "score-capped";

/// A feature request together with its scoring result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFeature {
    #[serde(flatten)]
    pub feature: FeatureRequest,
    pub scores: ScoreFactors,
    pub base_score: f64,
    pub multiplier: f64,
    /// `base_score * multiplier` before the display cap.
    pub raw_final_score: f64,
    pub final_score: f64,
    pub breakdown: Vec<BreakdownRow>,
    pub flags: Vec<String>,
    pub framework: ScoringFramework,
    pub stage: ProductStage,
}

impl ScoredFeature {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

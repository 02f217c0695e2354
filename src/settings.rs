//! Scoring settings and the closed set of settings update actions.
//!
//! Settings live in the document store under `settings`. The only way to change
//! them is `apply_action`, one exhaustively matched `SettingsAction` per edit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ai_cache::settings_hash;
use crate::error::{DashboardError, Result};
use crate::store::{DocumentStore, DocumentStoreExt, SETTINGS_KEY};
use crate::types::{CustomerTier, Factor, ModelMode, ModelProvider, Product, ProductStage, ScoringFramework};

/// Allowed drift when checking that a weight table sums to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Per-factor weights for one product stage.
pub type WeightTable = BTreeMap<Factor, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightConfig {
    #[serde(default = "default_mature_weights")]
    pub mature: WeightTable,
    #[serde(default = "default_new_weights")]
    pub new: WeightTable,
}

impl WeightConfig {
    pub fn for_stage(&self, stage: ProductStage) -> &WeightTable {
        match stage {
            ProductStage::Mature => &self.mature,
            ProductStage::New => &self.new,
        }
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            mature: default_mature_weights(),
            new: default_new_weights(),
        }
    }
}

fn default_mature_weights() -> WeightTable {
    BTreeMap::from([
        (Factor::RevenueImpact, 0.25),
        (Factor::EnterpriseReadiness, 0.20),
        (Factor::RequestVolume, 0.15),
        (Factor::CompetitiveParity, 0.15),
        (Factor::StrategicAlignment, 0.15),
        (Factor::Effort, 0.10),
    ])
}

fn default_new_weights() -> WeightTable {
    BTreeMap::from([
        (Factor::CapabilityGap, 0.30),
        (Factor::StrategicAlignment, 0.25),
        (Factor::CompetitiveDifferentiation, 0.15),
        (Factor::RequestVolume, 0.15),
        (Factor::Effort, 0.15),
    ])
}

fn default_tier_multipliers() -> BTreeMap<CustomerTier, f64> {
    // AI scoring already weighs customer tier, so the table starts neutral.
    CustomerTier::ALL.into_iter().map(|t| (t, 1.0)).collect()
}

/// How a product is recognised from Linear project names and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRule {
    pub product: Product,
    pub stage: ProductStage,
    /// Case-insensitive substrings matched against the project name.
    #[serde(default)]
    pub project_patterns: Vec<String>,
    /// Case-insensitive substrings matched against issue labels.
    #[serde(default)]
    pub label_patterns: Vec<String>,
}

fn default_product_rules() -> Vec<ProductRule> {
    vec![
        ProductRule {
            product: Product::AiAgents,
            stage: ProductStage::New,
            project_patterns: vec!["ai agent".into(), "agents".into(), "copilot".into()],
            label_patterns: vec!["ai-agents".into(), "ai agents".into()],
        },
        ProductRule {
            product: Product::Integrations,
            stage: ProductStage::Mature,
            project_patterns: vec!["integration".into(), "connector".into()],
            label_patterns: vec!["integrations".into()],
        },
        ProductRule {
            product: Product::Mobile,
            stage: ProductStage::Mature,
            project_patterns: vec!["mobile".into(), "ios".into(), "android".into()],
            label_patterns: vec!["mobile".into()],
        },
        ProductRule {
            product: Product::Platform,
            stage: ProductStage::Mature,
            project_patterns: vec!["platform".into(), "core".into()],
            label_patterns: vec!["platform".into()],
        },
    ]
}

/// Similarity thresholds used by correlation and duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchThresholds {
    #[serde(default = "default_label_gated")]
    pub label_gated: f64,
    #[serde(default = "default_fallback")]
    pub fallback: f64,
    #[serde(default = "default_support_ticket")]
    pub support_ticket: f64,
    #[serde(default = "default_related")]
    pub related: f64,
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    #[serde(default = "default_duplicate")]
    pub duplicate: f64,
}

fn default_label_gated() -> f64 {
    0.5
}
fn default_fallback() -> f64 {
    0.4
}
fn default_support_ticket() -> f64 {
    0.3
}
fn default_related() -> f64 {
    0.2
}
fn default_related_limit() -> usize {
    5
}
fn default_duplicate() -> f64 {
    0.6
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            label_gated: default_label_gated(),
            fallback: default_fallback(),
            support_ticket: default_support_ticket(),
            related: default_related(),
            related_limit: default_related_limit(),
            duplicate: default_duplicate(),
        }
    }
}

impl MatchThresholds {
    fn validate(&self) -> Result<()> {
        let ratios = [
            ("labelGated", self.label_gated),
            ("fallback", self.fallback),
            ("supportTicket", self.support_ticket),
            ("related", self.related),
            ("duplicate", self.duplicate),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(DashboardError::InvalidInput(format!(
                    "Threshold {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.related_limit == 0 {
            return Err(DashboardError::InvalidInput(
                "relatedLimit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything that shapes the LLM prompt. Part of the settings hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Extra guidance per factor, appended to the factor list in the prompt.
    #[serde(default)]
    pub factor_guidance: BTreeMap<Factor, String>,
    #[serde(default)]
    pub company_context: String,
    #[serde(default = "default_true")]
    pub include_related_context: bool,
}

fn default_system_prompt() -> String {
    "You are a senior product manager. Score the feature request on each factor \
     from 1 (lowest) to 10 (highest). For effort, 10 means the most engineering work."
        .to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            factor_guidance: BTreeMap::new(),
            company_context: String::new(),
            include_related_context: true,
        }
    }
}

/// Scoring settings persisted in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default = "default_tier_multipliers")]
    pub tier_multipliers: BTreeMap<CustomerTier, f64>,
    #[serde(default = "default_product_rules")]
    pub products: Vec<ProductRule>,
    /// Explicit Linear project id -> product mapping.
    #[serde(default)]
    pub project_mappings: BTreeMap<String, Product>,
    #[serde(default)]
    pub excluded_project_ids: Vec<String>,
    #[serde(default)]
    pub thresholds: MatchThresholds,
    /// Label that marks an issue as imported from the community board.
    #[serde(default = "default_community_label")]
    pub community_label: String,
    #[serde(default = "default_community_domain")]
    pub community_domain: String,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub framework: ScoringFramework,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub model_mode: ModelMode,
    /// Which provider's suggestions feed the score when both are cached.
    #[serde(default = "default_model_preference")]
    pub default_model: ModelProvider,
}

fn default_community_label() -> String {
    "featurebase".to_string()
}

fn default_community_domain() -> String {
    "featurebase.app".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_model_preference() -> ModelProvider {
    ModelProvider::Anthropic
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            tier_multipliers: default_tier_multipliers(),
            products: default_product_rules(),
            project_mappings: BTreeMap::new(),
            excluded_project_ids: Vec::new(),
            thresholds: MatchThresholds::default(),
            community_label: default_community_label(),
            community_domain: default_community_domain(),
            prompt: PromptConfig::default(),
            framework: ScoringFramework::default(),
            temperature: default_temperature(),
            model_mode: ModelMode::default(),
            default_model: default_model_preference(),
        }
    }
}

impl Settings {
    /// Stage for a product, honouring product rules before the built-in default.
    pub fn stage_for(&self, product: Product) -> ProductStage {
        self.products
            .iter()
            .find(|r| r.product == product)
            .map(|r| r.stage)
            .unwrap_or_else(|| product.default_stage())
    }

    pub fn multiplier_for(&self, tier: CustomerTier) -> f64 {
        self.tier_multipliers.get(&tier).copied().unwrap_or(1.0)
    }
}

/// One recognised settings edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SettingsAction {
    SetWeights {
        stage: ProductStage,
        weights: WeightTable,
    },
    SetTierMultiplier {
        tier: CustomerTier,
        multiplier: f64,
    },
    SetProjectMapping {
        project_id: String,
        /// `None` removes the mapping.
        product: Option<Product>,
    },
    ExcludeProject {
        project_id: String,
    },
    IncludeProject {
        project_id: String,
    },
    SetProductRule {
        rule: ProductRule,
    },
    SetThresholds {
        thresholds: MatchThresholds,
    },
    SetPromptConfig {
        prompt: PromptConfig,
    },
    SetFramework {
        framework: ScoringFramework,
    },
    SetTemperature {
        temperature: f64,
    },
    SetModelMode {
        mode: ModelMode,
    },
    SetDefaultModel {
        provider: ModelProvider,
    },
    ResetToDefaults,
}

/// Apply an action to a copy of `settings`, validating it first.
pub fn apply_action(settings: &Settings, action: SettingsAction) -> Result<Settings> {
    let mut next = settings.clone();

    match action {
        SettingsAction::SetWeights { stage, weights } => {
            validate_weights(stage, &weights)?;
            match stage {
                ProductStage::Mature => next.weights.mature = weights,
                ProductStage::New => next.weights.new = weights,
            }
        }
        SettingsAction::SetTierMultiplier { tier, multiplier } => {
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(DashboardError::InvalidInput(format!(
                    "Tier multiplier must be a non-negative number, got {}",
                    multiplier
                )));
            }
            next.tier_multipliers.insert(tier, multiplier);
        }
        SettingsAction::SetProjectMapping {
            project_id,
            product,
        } => match product {
            Some(p) => {
                next.project_mappings.insert(project_id, p);
            }
            None => {
                next.project_mappings.remove(&project_id);
            }
        },
        SettingsAction::ExcludeProject { project_id } => {
            if !next.excluded_project_ids.contains(&project_id) {
                next.excluded_project_ids.push(project_id);
            }
        }
        SettingsAction::IncludeProject { project_id } => {
            next.excluded_project_ids.retain(|id| id != &project_id);
        }
        SettingsAction::SetProductRule { rule } => {
            match next.products.iter_mut().find(|r| r.product == rule.product) {
                Some(existing) => *existing = rule,
                None => next.products.push(rule),
            }
        }
        SettingsAction::SetThresholds { thresholds } => {
            thresholds.validate()?;
            next.thresholds = thresholds;
        }
        SettingsAction::SetPromptConfig { prompt } => {
            if prompt.system_prompt.trim().is_empty() {
                return Err(DashboardError::InvalidInput(
                    "System prompt cannot be empty".to_string(),
                ));
            }
            next.prompt = prompt;
        }
        SettingsAction::SetFramework { framework } => next.framework = framework,
        SettingsAction::SetTemperature { temperature } => {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(DashboardError::InvalidInput(format!(
                    "Temperature must be within [0, 1], got {}",
                    temperature
                )));
            }
            next.temperature = temperature;
        }
        SettingsAction::SetModelMode { mode } => next.model_mode = mode,
        SettingsAction::SetDefaultModel { provider } => next.default_model = provider,
        SettingsAction::ResetToDefaults => next = Settings::default(),
    }

    Ok(next)
}

pub fn load_settings(store: &dyn DocumentStore) -> Result<Settings> {
    store.load(SETTINGS_KEY, Settings::default())
}

pub fn save_settings(store: &dyn DocumentStore, settings: &Settings) -> Result<()> {
    store.save(SETTINGS_KEY, settings)
}

impl Settings {
    /// Hash of the parts of the settings that change AI answers.
    pub fn scoring_hash(&self) -> String {
        settings_hash(&self.prompt, self.framework, self.temperature)
    }
}

fn validate_weights(stage: ProductStage, weights: &WeightTable) -> Result<()> {
    let allowed = stage.factors();
    if let Some(stray) = weights.keys().find(|f| !allowed.contains(f)) {
        return Err(DashboardError::InvalidInput(format!(
            "Factor {} does not apply to {:?} products",
            stray, stage
        )));
    }
    if let Some((factor, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(DashboardError::InvalidInput(format!(
            "Weight for {} must be non-negative, got {}",
            factor, w
        )));
    }

    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(DashboardError::InvalidInput(format!(
            "Weights must sum to 1.0, got {:.3}",
            sum
        )));
    }

    Ok(())
}

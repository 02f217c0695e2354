//! Weighted and RICE scoring of correlated feature requests.

use std::collections::BTreeMap;

use crate::ai_cache::StoredAiScore;
use crate::settings::Settings;
use crate::types::{
    BreakdownRow, Factor, FeatureRequest, ProductStage, ScoreFactors, ScoredFeature,
    ScoringFramework, FLAG_MANUAL_OVERRIDE, FLAG_PENDING_AI_SCORE, FLAG_SCORE_CAPPED,
    FLAG_STALE_AI_SCORE,
};

pub const MAX_SCORE: f64 = 10.0;

/// Everything besides the feature itself that shapes its score.
#[derive(Clone, Copy)]
pub struct ScoringInputs<'a> {
    pub framework: ScoringFramework,
    pub settings: &'a Settings,
    pub cached: Option<&'a StoredAiScore>,
    pub overrides: Option<&'a ScoreFactors>,
    /// Hash of the active configuration; entries written under another hash are flagged.
    pub current_hash: &'a str,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// AI-suggested scores (preferred provider first) with overrides laid on top.
pub fn merged_factors(inputs: &ScoringInputs<'_>) -> (ScoreFactors, bool) {
    let ai = inputs
        .cached
        .and_then(|c| c.preferred(inputs.settings.default_model));

    let mut merged = ai.map(|r| r.to_factors()).unwrap_or_default();
    if let Some(overrides) = inputs.overrides {
        merged.overlay(overrides);
    }
    (merged, ai.is_some())
}

/// Weighted sum over the stage's factors. Factors with no weight or no score
/// are left out; effort counts inverted.
fn weighted_base(
    scores: &ScoreFactors,
    stage: ProductStage,
    settings: &Settings,
) -> (f64, Vec<BreakdownRow>) {
    let weights = settings.weights.for_stage(stage);
    let mut base = 0.0;
    let mut rows = Vec::new();

    for &factor in stage.factors() {
        let weight = weights.get(&factor).copied().unwrap_or(0.0);
        if weight <= 0.0 {
            continue;
        }
        let Some(score) = scores.get(factor) else {
            continue;
        };

        let score = score.clamp(0.0, MAX_SCORE);
        let effective = if factor == Factor::Effort {
            MAX_SCORE - score
        } else {
            score
        };
        let contribution = weight * effective;
        base += contribution;
        rows.push(BreakdownRow {
            factor,
            weight,
            score,
            contribution: round2(contribution),
        });
    }

    (base, rows)
}

/// RICE: reach x impact x confidence / effort, scaled so 10/10/10/1 lands on 10.
/// Rows carry the component value actually used, with weight 1.
fn rice_base(scores: &ScoreFactors, stage: ProductStage) -> (f64, Vec<BreakdownRow>) {
    let impact_factor = match stage {
        ProductStage::Mature => Factor::RevenueImpact,
        ProductStage::New => Factor::CapabilityGap,
    };
    let clamp = |v: f64| v.clamp(0.0, MAX_SCORE);

    let reach = scores.get(Factor::RequestVolume).map(clamp);
    let impact = scores.get(impact_factor).map(clamp);
    let confidence = scores.get(Factor::StrategicAlignment).map(|v| clamp(v) / 10.0);
    let effort = scores.get(Factor::Effort).map(|v| clamp(v).max(1.0));

    let (Some(reach), Some(impact), Some(confidence), Some(effort)) =
        (reach, impact, confidence, effort)
    else {
        return (0.0, Vec::new());
    };

    let base = reach * impact * confidence / effort / 10.0;
    let row = |factor: Factor, value: f64| BreakdownRow {
        factor,
        weight: 1.0,
        score: scores.get(factor).unwrap_or_default(),
        contribution: round2(value),
    };
    let rows = vec![
        row(Factor::RequestVolume, reach),
        row(impact_factor, impact),
        row(Factor::StrategicAlignment, confidence),
        row(Factor::Effort, effort),
    ];
    (base, rows)
}

/// Score one feature. Absent data yields a zero base score, never an error.
pub fn score_feature(feature: &FeatureRequest, inputs: &ScoringInputs<'_>) -> ScoredFeature {
    let settings = inputs.settings;
    let stage = settings.stage_for(feature.product);
    let (scores, has_ai) = merged_factors(inputs);

    let (base, breakdown) = match inputs.framework {
        ScoringFramework::Weighted => weighted_base(&scores, stage, settings),
        ScoringFramework::Rice => rice_base(&scores, stage),
    };

    let tier = scores.customer_tier.unwrap_or(feature.customer_tier);
    let multiplier = settings.multiplier_for(tier);
    let raw = base * multiplier;

    let mut flags = Vec::new();
    if !has_ai {
        flags.push(FLAG_PENDING_AI_SCORE.to_string());
    } else if inputs
        .cached
        .is_some_and(|c| c.is_stale(inputs.current_hash))
    {
        flags.push(FLAG_STALE_AI_SCORE.to_string());
    }
    if inputs.overrides.is_some_and(|o| !o.is_empty()) {
        flags.push(FLAG_MANUAL_OVERRIDE.to_string());
    }
    if raw > MAX_SCORE {
        flags.push(FLAG_SCORE_CAPPED.to_string());
    }

    ScoredFeature {
        feature: feature.clone(),
        scores,
        base_score: round2(base),
        multiplier,
        raw_final_score: round2(raw),
        final_score: round2(raw.clamp(0.0, MAX_SCORE)),
        breakdown,
        flags,
        framework: inputs.framework,
        stage,
    }
}

/// Score every feature against the cache and overrides, best first.
/// Ties keep input order.
pub fn score_and_sort(
    features: &[FeatureRequest],
    settings: &Settings,
    cache: &BTreeMap<String, StoredAiScore>,
    overrides: &BTreeMap<String, ScoreFactors>,
    current_hash: &str,
) -> Vec<ScoredFeature> {
    let mut scored: Vec<ScoredFeature> = features
        .iter()
        .map(|f| {
            let inputs = ScoringInputs {
                framework: settings.framework,
                settings,
                cached: cache.get(&f.id),
                overrides: overrides.get(&f.id),
                current_hash,
            };
            score_feature(f, &inputs)
        })
        .collect();

    scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

    let pending = scored
        .iter()
        .filter(|s| s.has_flag(FLAG_PENDING_AI_SCORE))
        .count();
    log::debug!(
        "Scoring: scored {} features ({} pending AI score)",
        scored.len(),
        pending
    );
    scored
}

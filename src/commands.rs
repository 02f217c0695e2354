//! Command facade: the operations a UI or CLI calls.
//!
//! Every command returns `CommandError` on failure so callers get a
//! serializable, classified error instead of a bare string.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CommandError, DashboardError};
use crate::jobs::ScoringJob;
use crate::linear::sync::{sync_priorities, SyncItemResult, SyncOptions};
use crate::services::dashboard::{self, FeatureDetail, FeatureFilter, RefreshSummary, ScoreStatus};
use crate::services::scoring::{start_scoring_job, ScoringBatch};
use crate::settings::{apply_action, load_settings, save_settings, Settings, SettingsAction};
use crate::state::AppState;
use crate::types::{CustomerTier, Factor, ScoreFactors, ScoredFeature, FLAG_PENDING_AI_SCORE, FLAG_STALE_AI_SCORE};
use crate::usage::{UsageRecord, UsageSummary};

type CommandResult<T> = Result<T, CommandError>;

pub async fn refresh_data(state: &AppState) -> CommandResult<RefreshSummary> {
    Ok(dashboard::refresh(state).await?)
}

pub fn list_features(state: &AppState, filter: FeatureFilter) -> CommandResult<Vec<ScoredFeature>> {
    Ok(dashboard::list_features(state, &filter)?)
}

pub fn get_feature(state: &AppState, feature_id: &str) -> CommandResult<FeatureDetail> {
    Ok(dashboard::feature_detail(state, feature_id)?)
}

pub fn get_score_status(state: &AppState) -> CommandResult<ScoreStatus> {
    Ok(dashboard::score_status(state)?)
}

// =============================================================================
// Settings
// =============================================================================

pub fn get_settings(state: &AppState) -> CommandResult<Settings> {
    Ok(load_settings(state.store.as_ref())?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub settings: Settings,
    /// Whether the change invalidates cached AI scores.
    pub hash_changed: bool,
    /// Cached scores written under a different configuration.
    pub stale_count: usize,
}

pub fn update_settings(state: &AppState, action: SettingsAction) -> CommandResult<SettingsUpdate> {
    let _guard = state.settings_lock.lock();
    let current = load_settings(state.store.as_ref())?;
    let next = apply_action(&current, action)?;
    save_settings(state.store.as_ref(), &next)?;

    let new_hash = next.scoring_hash();
    let hash_changed = new_hash != current.scoring_hash();
    let stale_count = state.cache.stale_count(&new_hash)?;
    if hash_changed {
        log::info!(
            "Settings: scoring configuration changed, {} cached scores now stale",
            stale_count
        );
    }

    Ok(SettingsUpdate {
        settings: next,
        hash_changed,
        stale_count,
    })
}

/// Follow-up to a hash-changing update: optionally drop every cached score.
/// Returns how many entries were removed.
pub fn confirm_settings_change(state: &AppState, clear: bool) -> CommandResult<usize> {
    if !clear {
        return Ok(0);
    }
    Ok(state.cache.clear_all()?)
}

// =============================================================================
// Scoring jobs
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoringScope {
    /// Everything in the snapshot, duplicates excluded.
    #[default]
    All,
    /// Only features with no cached score or a stale one.
    PendingOrStale,
}

/// Start a batch job over `feature_ids`, or over `scope` when none are given.
pub fn start_scoring(
    state: &Arc<AppState>,
    feature_ids: Option<Vec<String>>,
    scope: ScoringScope,
) -> CommandResult<ScoringJob> {
    let features = match feature_ids {
        Some(ids) => {
            let wanted: HashSet<String> = ids.into_iter().collect();
            let snapshot = state.snapshot.read();
            let picked: Vec<_> = snapshot
                .features
                .iter()
                .filter(|f| wanted.contains(&f.id))
                .cloned()
                .collect();
            if let Some(missing) = wanted
                .iter()
                .find(|id| !picked.iter().any(|f| &f.id == *id))
            {
                return Err(DashboardError::not_found("Feature", missing.as_str()).into());
            }
            picked
        }
        None => {
            let scored = dashboard::scored_features(state)?;
            scored
                .into_iter()
                .filter(|s| !s.feature.is_duplicate)
                .filter(|s| match scope {
                    ScoringScope::All => true,
                    ScoringScope::PendingOrStale => {
                        s.has_flag(FLAG_PENDING_AI_SCORE) || s.has_flag(FLAG_STALE_AI_SCORE)
                    }
                })
                .map(|s| s.feature)
                .collect()
        }
    };

    let batch = {
        let snapshot = state.snapshot.read();
        ScoringBatch {
            features,
            posts: snapshot.posts.clone(),
            tickets: snapshot.tickets.clone(),
        }
    };

    Ok(start_scoring_job(
        state.jobs.clone(),
        state.scoring.clone(),
        batch,
    )?)
}

pub fn get_job(state: &AppState, job_id: &str) -> CommandResult<ScoringJob> {
    Ok(state.jobs.get(job_id)?)
}

pub fn list_jobs(state: &AppState) -> Vec<ScoringJob> {
    state.jobs.list()
}

pub fn cancel_job(state: &AppState, job_id: &str) -> CommandResult<ScoringJob> {
    Ok(state.jobs.cancel(job_id)?)
}

/// Drop cached scores for one feature, or all of them.
pub fn clear_scores(state: &AppState, feature_id: Option<&str>) -> CommandResult<usize> {
    match feature_id {
        Some(id) => Ok(usize::from(state.cache.clear_feature(id)?)),
        None => Ok(state.cache.clear_all()?),
    }
}

// =============================================================================
// Overrides
// =============================================================================

pub fn set_override(
    state: &AppState,
    feature_id: &str,
    factor: Factor,
    value: Option<f64>,
) -> CommandResult<ScoreFactors> {
    Ok(state.overrides.set_factor(feature_id, factor, value)?)
}

pub fn set_tier_override(
    state: &AppState,
    feature_id: &str,
    tier: Option<CustomerTier>,
) -> CommandResult<ScoreFactors> {
    Ok(state.overrides.set_tier(feature_id, tier)?)
}

pub fn clear_overrides(state: &AppState, feature_id: &str) -> CommandResult<bool> {
    Ok(state.overrides.clear(feature_id)?)
}

// =============================================================================
// Write-back and usage
// =============================================================================

/// Push priorities for the ranked, non-duplicate features. With a subset,
/// sort order follows rank within the subset.
pub async fn sync_to_linear(
    state: &AppState,
    feature_ids: Option<Vec<String>>,
    options: SyncOptions,
) -> CommandResult<Vec<SyncItemResult>> {
    let sink = state
        .sources
        .sink
        .clone()
        .ok_or(DashboardError::MissingCredentials("Linear"))?;

    let wanted: Option<HashSet<String>> = feature_ids.map(|ids| ids.into_iter().collect());
    let ranked: Vec<ScoredFeature> = dashboard::scored_features(state)?
        .into_iter()
        .filter(|s| !s.feature.is_duplicate)
        .collect();

    let selected: Vec<ScoredFeature> = ranked
        .into_iter()
        .filter(|s| wanted.as_ref().map_or(true, |w| w.contains(&s.feature.id)))
        .collect();

    Ok(sync_priorities(sink.as_ref(), &selected, options).await)
}

pub fn get_usage(state: &AppState) -> CommandResult<(UsageSummary, Vec<UsageRecord>)> {
    Ok((state.usage.summary(None)?, state.usage.records()?))
}

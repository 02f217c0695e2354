//! Dashboard service: refresh from the sources, list scored features with
//! filters, and assemble a single feature's detail view.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ai_cache::StoredAiScore;
use crate::correlate::{correlate, related_posts, related_tickets, RelatedPost, RelatedTicket};
use crate::duplicates::detect_duplicates;
use crate::error::{DashboardError, Result};
use crate::scoring::score_and_sort;
use crate::settings::load_settings;
use crate::state::{AppState, Snapshot};
use crate::text::normalize;
use crate::types::{
    CustomerTier, FeatureSource, FeatureType, Product, ScoredFeature, FLAG_PENDING_AI_SCORE,
    FLAG_STALE_AI_SCORE,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub features: usize,
    pub duplicates: usize,
    pub posts: usize,
    pub tickets: usize,
    /// Features matched to a Featurebase post.
    pub matched_posts: usize,
}

/// Pull all three sources, correlate, mark duplicates, replace the snapshot.
/// Linear is required; Featurebase and Zendesk failures degrade to empty.
pub async fn refresh(state: &AppState) -> Result<RefreshSummary> {
    let issues_source = state
        .sources
        .issues
        .clone()
        .ok_or(DashboardError::MissingCredentials("Linear"))?;

    let community = state.sources.community.clone();
    let support = state.sources.support.clone();

    let (issues, posts, tickets) = tokio::join!(
        issues_source.list_backlog_issues(),
        async {
            match community {
                Some(c) => c.list_posts().await,
                None => Ok(Vec::new()),
            }
        },
        async {
            match support {
                Some(s) => s.list_tickets().await,
                None => Ok(Vec::new()),
            }
        },
    );

    let issues = issues?;
    let posts = posts.unwrap_or_else(|e| {
        log::warn!("Dashboard: Featurebase unavailable, continuing without posts: {}", e);
        Vec::new()
    });
    let tickets = tickets.unwrap_or_else(|e| {
        log::warn!("Dashboard: Zendesk unavailable, continuing without tickets: {}", e);
        Vec::new()
    });

    let settings = load_settings(state.store.as_ref())?;
    let mut features = correlate(&issues, &posts, &tickets, &settings);
    let duplicates = detect_duplicates(&mut features, settings.thresholds.duplicate);

    let summary = RefreshSummary {
        features: features.len(),
        duplicates,
        posts: posts.len(),
        tickets: tickets.len(),
        matched_posts: features
            .iter()
            .filter(|f| f.featurebase_post_id.is_some())
            .count(),
    };

    *state.snapshot.write() = Snapshot {
        features,
        posts,
        tickets,
        refreshed_at: Some(Utc::now()),
    };

    log::info!(
        "Dashboard: refreshed {} features ({} duplicates, {} matched posts)",
        summary.features,
        summary.duplicates,
        summary.matched_posts
    );
    Ok(summary)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFilter {
    #[serde(default)]
    pub product: Option<Product>,
    #[serde(default)]
    pub customer_tier: Option<CustomerTier>,
    #[serde(default)]
    pub feature_type: Option<FeatureType>,
    #[serde(default)]
    pub source: Option<FeatureSource>,
    /// Duplicates are hidden unless this is set.
    #[serde(default)]
    pub include_duplicates: bool,
    /// Only features carrying this flag, e.g. `pending-ai-score`.
    #[serde(default)]
    pub flag: Option<String>,
    /// Normalized substring match against identifier, title and description.
    #[serde(default)]
    pub search: Option<String>,
}

impl FeatureFilter {
    pub fn matches(&self, scored: &ScoredFeature) -> bool {
        let f = &scored.feature;
        if !self.include_duplicates && f.is_duplicate {
            return false;
        }
        if self.product.is_some_and(|p| p != f.product)
            || self.customer_tier.is_some_and(|t| t != f.customer_tier)
            || self.feature_type.is_some_and(|t| t != f.feature_type)
            || self.source.is_some_and(|s| s != f.source)
        {
            return false;
        }
        if let Some(flag) = &self.flag {
            if !scored.has_flag(flag) {
                return false;
            }
        }
        if let Some(query) = self.search.as_deref().map(normalize) {
            if !query.is_empty() {
                let haystack = normalize(&format!("{} {}", f.identifier, f.search_text()));
                if !haystack.contains(&query) {
                    return false;
                }
            }
        }
        true
    }
}

/// Score everything in the snapshot, best first.
pub fn scored_features(state: &AppState) -> Result<Vec<ScoredFeature>> {
    let settings = load_settings(state.store.as_ref())?;
    let cache = state.cache.all()?;
    let overrides = state.overrides.all()?;
    let snapshot = state.snapshot.read();
    Ok(score_and_sort(
        &snapshot.features,
        &settings,
        &cache,
        &overrides,
        &settings.scoring_hash(),
    ))
}

pub fn list_features(state: &AppState, filter: &FeatureFilter) -> Result<Vec<ScoredFeature>> {
    Ok(scored_features(state)?
        .into_iter()
        .filter(|s| filter.matches(s))
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDetail {
    pub feature: ScoredFeature,
    /// 1-based position in the full ranking.
    pub rank: usize,
    pub related_posts: Vec<RelatedPost>,
    pub related_tickets: Vec<RelatedTicket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<StoredAiScore>,
}

pub fn feature_detail(state: &AppState, feature_id: &str) -> Result<FeatureDetail> {
    let ranked = scored_features(state)?;
    let (index, scored) = ranked
        .into_iter()
        .enumerate()
        .find(|(_, s)| s.feature.id == feature_id)
        .ok_or_else(|| DashboardError::not_found("Feature", feature_id))?;

    let settings = load_settings(state.store.as_ref())?;
    let thresholds = &settings.thresholds;
    let (posts, tickets) = {
        let snapshot = state.snapshot.read();
        (
            related_posts(
                &scored.feature,
                &snapshot.posts,
                thresholds.related,
                thresholds.related_limit,
            ),
            related_tickets(
                &scored.feature,
                &snapshot.tickets,
                thresholds.related,
                thresholds.related_limit,
            ),
        )
    };

    Ok(FeatureDetail {
        ai_score: state.cache.get(feature_id)?,
        feature: scored,
        rank: index + 1,
        related_posts: posts,
        related_tickets: tickets,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStatus {
    pub settings_hash: String,
    pub cached: usize,
    pub stale: usize,
    pub pending: usize,
    /// True when the cache was last written under different settings.
    pub needs_rescore: bool,
    pub stale_by_product: BTreeMap<Product, usize>,
}

pub fn score_status(state: &AppState) -> Result<ScoreStatus> {
    let settings = load_settings(state.store.as_ref())?;
    let hash = settings.scoring_hash();
    let scored = scored_features(state)?;

    let mut stale_by_product = BTreeMap::new();
    for s in scored.iter().filter(|s| s.has_flag(FLAG_STALE_AI_SCORE)) {
        *stale_by_product.entry(s.feature.product).or_insert(0) += 1;
    }

    Ok(ScoreStatus {
        cached: state.cache.all()?.len(),
        stale: state.cache.stale_count(&hash)?,
        pending: scored
            .iter()
            .filter(|s| s.has_flag(FLAG_PENDING_AI_SCORE))
            .count(),
        needs_rescore: state.cache.is_stale(&hash)?,
        stale_by_product,
        settings_hash: hash,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::intelligence::ScoringCapability;
    use crate::state::Sources;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn state(sources: Sources) -> AppState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            sources,
            ScoringCapability::default(),
            Duration::ZERO,
            3600,
        )
    }

    fn full_sources() -> Sources {
        Sources {
            issues: Some(Arc::new(StaticIssues(sample_issues()))),
            community: Some(Arc::new(StaticPosts(sample_posts()))),
            support: Some(Arc::new(DownSupport)),
            sink: None,
        }
    }

    #[tokio::test]
    async fn refresh_requires_linear() {
        let err = refresh(&state(Sources::default())).await.unwrap_err();
        assert!(err.requires_user_action());
    }

    #[tokio::test]
    async fn refresh_degrades_when_support_is_down() {
        let state = state(full_sources());
        let summary = refresh(&state).await.unwrap();

        assert_eq!(summary.features, 3);
        assert_eq!(summary.tickets, 0);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.matched_posts, 1);
        assert!(state.snapshot.read().refreshed_at.is_some());
    }

    #[tokio::test]
    async fn list_hides_duplicates_by_default() {
        let state = state(full_sources());
        refresh(&state).await.unwrap();

        let visible = list_features(&state, &FeatureFilter::default()).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|s| s.has_flag(FLAG_PENDING_AI_SCORE)));

        let all = list_features(
            &state,
            &FeatureFilter {
                include_duplicates: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 3);

        let agents = list_features(
            &state,
            &FeatureFilter {
                product: Some(Product::AiAgents),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].stage, crate::types::ProductStage::New);
    }

    #[tokio::test]
    async fn search_is_normalized() {
        let state = state(full_sources());
        refresh(&state).await.unwrap();
        let hits = list_features(
            &state,
            &FeatureFilter {
                search: Some("HAND-OFF".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        // "hand off" does not appear; "handoff" does.
        assert!(hits.is_empty());

        let hits = list_features(
            &state,
            &FeatureFilter {
                search: Some("Handoff".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn detail_includes_related_posts_and_rank() {
        let state = state(full_sources());
        refresh(&state).await.unwrap();

        let detail = feature_detail(&state, "3").unwrap();
        assert_eq!(detail.feature.feature.identifier, "ENG-3");
        assert!(detail.rank >= 1);
        assert_eq!(detail.related_posts.len(), 1);
        assert!(detail.ai_score.is_none());

        assert!(feature_detail(&state, "missing").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn status_counts_pending_before_any_scoring() {
        let state = state(full_sources());
        refresh(&state).await.unwrap();
        let status = score_status(&state).unwrap();
        assert_eq!(status.cached, 0);
        assert_eq!(status.pending, 3);
        assert!(status.needs_rescore);
    }
}

//! Batch scoring: one sequential worker per job.
//!
//! Each feature is sent to the configured scoring providers, the result is
//! cached under the active settings hash, and usage is recorded. Per-feature
//! failures are logged and skipped; only failing to load settings fails the
//! whole job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::ai_cache::{AiScoreCache, StoredAiScore};
use crate::correlate::{related_posts, related_tickets};
use crate::error::{DashboardError, Result};
use crate::featurebase::FeaturebasePost;
use crate::intelligence::{ScoringCapability, ScoringRequest};
use crate::jobs::{JobFailure, JobHandle, JobStatus, JobStore, ScoringJob};
use crate::settings::{load_settings, Settings};
use crate::store::DocumentStore;
use crate::types::{FeatureRequest, ModelProvider};
use crate::usage::UsageLedger;
use crate::zendesk::ZendeskTicket;

pub const DEFAULT_PACING_MILLIS: u64 = 1000;

/// Long-lived collaborators shared by every job.
pub struct ScoringDeps {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<AiScoreCache>,
    pub usage: Arc<UsageLedger>,
    pub capability: ScoringCapability,
    /// Delay between items, to stay under provider rate limits.
    pub pacing: Duration,
}

/// The features to score plus the context used to build prompts.
#[derive(Debug, Clone, Default)]
pub struct ScoringBatch {
    pub features: Vec<FeatureRequest>,
    pub posts: Vec<FeaturebasePost>,
    pub tickets: Vec<ZendeskTicket>,
}

/// Validate the provider setup, register the job and spawn its worker.
/// Configuration problems surface here, before any job exists.
pub fn start_scoring_job(
    jobs: Arc<JobStore>,
    deps: Arc<ScoringDeps>,
    batch: ScoringBatch,
) -> Result<ScoringJob> {
    let settings = load_settings(deps.store.as_ref())?;
    deps.capability.ensure_ready(settings.model_mode)?;

    let (job, handle) = jobs.create(batch.features.len());
    tokio::spawn(run_scoring_job(jobs, deps, handle, batch));
    Ok(job)
}

/// Score one feature and persist the result.
async fn score_one(
    deps: &ScoringDeps,
    settings: &Settings,
    hash: &str,
    batch: &ScoringBatch,
    feature: &FeatureRequest,
) -> Result<()> {
    let thresholds = &settings.thresholds;
    let posts = related_posts(
        feature,
        &batch.posts,
        thresholds.related,
        thresholds.related_limit,
    );
    let tickets = related_tickets(
        feature,
        &batch.tickets,
        thresholds.related,
        thresholds.related_limit,
    );

    let request = ScoringRequest {
        feature,
        stage: settings.stage_for(feature.product),
        related_posts: &posts,
        related_tickets: &tickets,
        framework: settings.framework,
        prompt: &settings.prompt,
        temperature: settings.temperature,
    };

    let outcome = deps.capability.score(settings.model_mode, &request).await?;

    for (provider, result) in [
        (ModelProvider::Anthropic, outcome.anthropic.as_ref()),
        (ModelProvider::OpenAi, outcome.openai.as_ref()),
    ] {
        if let Some(result) = result {
            if let Err(e) = deps
                .usage
                .record(provider, &result.model, result.tokens_used, result.cost)
            {
                log::warn!("Scoring: failed to record usage for {}: {}", feature.id, e);
            }
        }
    }

    let model_used = outcome.models_used();
    deps.cache.save_score(
        StoredAiScore {
            feature_id: feature.id.clone(),
            anthropic: outcome.anthropic,
            openai: outcome.openai,
            scored_at: Utc::now(),
            settings_hash: hash.to_string(),
            framework: settings.framework,
            model_used,
        },
        hash,
    )
}

/// Worker loop. Cancellation is checked before each item; an in-flight
/// provider call always runs to completion.
pub async fn run_scoring_job(
    jobs: Arc<JobStore>,
    deps: Arc<ScoringDeps>,
    handle: JobHandle,
    batch: ScoringBatch,
) {
    let settings = match load_settings(deps.store.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Scoring: job {} could not load settings: {}", handle.id, e);
            let failed = DashboardError::JobFailed(format!("could not load settings: {}", e));
            jobs.finish(&handle.id, JobStatus::Failed, Some(failed.to_string()));
            return;
        }
    };
    let hash = settings.scoring_hash();
    let total = batch.features.len();

    for (index, feature) in batch.features.iter().enumerate() {
        if handle.is_cancelled() {
            log::info!(
                "Scoring: job {} cancelled after {}/{}",
                handle.id,
                index,
                total
            );
            jobs.finish(&handle.id, JobStatus::Cancelled, None);
            return;
        }

        jobs.update(&handle.id, |j| {
            j.current_feature = Some(feature.title.clone())
        });

        if let Err(e) = score_one(&deps, &settings, &hash, &batch, feature).await {
            log::warn!(
                "Scoring: skipping {} in job {}: {}",
                feature.identifier,
                handle.id,
                e
            );
            let failure = JobFailure {
                feature_id: feature.id.clone(),
                message: e.to_string(),
            };
            jobs.update(&handle.id, |j| j.failures.push(failure));
        }

        jobs.update(&handle.id, |j| j.progress = index + 1);

        if index + 1 < total && !deps.pacing.is_zero() {
            tokio::time::sleep(deps.pacing).await;
        }
    }

    jobs.finish(&handle.id, JobStatus::Completed, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::testing::FakeProvider;
    use crate::settings::{save_settings, SettingsAction};
    use crate::store::MemoryStore;
    use crate::types::{CustomerTier, FeatureSource, FeatureType, ModelMode, Product};

    fn feature(id: &str) -> FeatureRequest {
        FeatureRequest {
            id: id.to_string(),
            identifier: id.to_uppercase(),
            title: format!("Feature {}", id),
            description: String::new(),
            labels: Vec::new(),
            comments: Vec::new(),
            url: String::new(),
            product: Product::Platform,
            customer_tier: CustomerTier::Business,
            feature_type: FeatureType::Feature,
            source: FeatureSource::Internal,
            project_id: None,
            project_name: None,
            featurebase_url: None,
            featurebase_post_id: None,
            featurebase_upvotes: 0,
            match_confidence: None,
            support_ticket_count: 0,
            is_duplicate: false,
            duplicate_of: None,
            duplicates: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn batch(n: usize) -> ScoringBatch {
        ScoringBatch {
            features: (1..=n).map(|i| feature(&format!("f{}", i))).collect(),
            ..Default::default()
        }
    }

    fn deps(store: Arc<MemoryStore>, provider: FakeProvider) -> Arc<ScoringDeps> {
        Arc::new(ScoringDeps {
            store: store.clone(),
            cache: Arc::new(AiScoreCache::new(store.clone())),
            usage: Arc::new(UsageLedger::new(store)),
            capability: ScoringCapability::new(Some(Arc::new(provider)), None),
            pacing: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn completes_and_caches_every_feature() {
        let store = Arc::new(MemoryStore::new());
        let deps = deps(store, FakeProvider::new(ModelProvider::Anthropic));
        let jobs = Arc::new(JobStore::default());
        let (job, handle) = jobs.create(3);

        run_scoring_job(jobs.clone(), deps.clone(), handle, batch(3)).await;

        let job = jobs.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 3);
        assert!(job.current_feature.is_none());

        let cached = deps.cache.all().unwrap();
        assert_eq!(cached.len(), 3);
        let hash = Settings::default().scoring_hash();
        assert!(cached.values().all(|c| c.settings_hash == hash));
        assert!(!deps.cache.is_stale(&hash).unwrap());

        let usage = deps.usage.summary(None).unwrap();
        assert_eq!(usage.requests, 3);
        assert_eq!(usage.tokens_used, 300);
    }

    #[tokio::test]
    async fn one_failure_does_not_fail_the_job() {
        let store = Arc::new(MemoryStore::new());
        let mut provider = FakeProvider::new(ModelProvider::Anthropic);
        provider.fail_ids.insert("f4".to_string());
        let deps = deps(store, provider);
        let jobs = Arc::new(JobStore::default());
        let (job, handle) = jobs.create(10);

        run_scoring_job(jobs.clone(), deps.clone(), handle, batch(10)).await;

        let job = jobs.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 10);
        assert_eq!(job.failures.len(), 1);
        assert_eq!(job.failures[0].feature_id, "f4");

        let cached = deps.cache.all().unwrap();
        assert_eq!(cached.len(), 9);
        assert!(!cached.contains_key("f4"));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_item() {
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(JobStore::default());

        let mut provider = FakeProvider::new(ModelProvider::Anthropic);
        let jobs_for_hook = jobs.clone();
        provider.on_call = Some(Box::new(move |id: &str| {
            // Cancel while the second feature is in flight.
            if id == "f2" {
                for job in jobs_for_hook.list() {
                    let _ = jobs_for_hook.cancel(&job.id);
                }
            }
        }));
        let deps = deps(store, provider);
        let (job, handle) = jobs.create(5);

        run_scoring_job(jobs.clone(), deps.clone(), handle, batch(5)).await;

        let job = jobs.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.progress, 2);

        let cached = deps.cache.all().unwrap();
        assert_eq!(cached.len(), 2);
        for untouched in ["f3", "f4", "f5"] {
            assert!(!cached.contains_key(untouched));
        }
    }

    #[tokio::test]
    async fn current_feature_is_title_of_item_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(JobStore::default());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut provider = FakeProvider::new(ModelProvider::Anthropic);
        let jobs_for_hook = jobs.clone();
        let seen_for_hook = seen.clone();
        provider.on_call = Some(Box::new(move |_id: &str| {
            for job in jobs_for_hook.list() {
                seen_for_hook.lock().push(job.current_feature.clone());
            }
        }));
        let deps = deps(store, provider);
        let (_, handle) = jobs.create(2);

        run_scoring_job(jobs.clone(), deps, handle, batch(2)).await;

        assert_eq!(
            *seen.lock(),
            vec![
                Some("Feature f1".to_string()),
                Some("Feature f2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_settings_fail_the_job() {
        let store = Arc::new(MemoryStore::new());
        store
            .save_value("settings", &serde_json::json!({"temperature": "hot"}))
            .unwrap();
        let deps = deps(store, FakeProvider::new(ModelProvider::Anthropic));
        let jobs = Arc::new(JobStore::default());
        let (job, handle) = jobs.create(2);

        run_scoring_job(jobs.clone(), deps, handle, batch(2)).await;

        let job = jobs.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Scoring job failed")));
        assert_eq!(job.progress, 0);
    }

    #[tokio::test]
    async fn missing_provider_is_rejected_before_job_creation() {
        let store = Arc::new(MemoryStore::new());
        let compare = crate::settings::apply_action(
            &Settings::default(),
            SettingsAction::SetModelMode {
                mode: ModelMode::Compare,
            },
        )
        .unwrap();
        save_settings(store.as_ref(), &compare).unwrap();

        let deps = deps(store, FakeProvider::new(ModelProvider::Anthropic));
        let jobs = Arc::new(JobStore::default());

        let err = start_scoring_job(jobs.clone(), deps, batch(1)).unwrap_err();
        assert!(err.requires_user_action());
        assert!(jobs.list().is_empty());
    }

    #[tokio::test]
    async fn scores_written_under_new_settings_clear_staleness() {
        let store = Arc::new(MemoryStore::new());
        let deps = deps(store.clone(), FakeProvider::new(ModelProvider::Anthropic));
        let jobs = Arc::new(JobStore::default());

        let (_, handle) = jobs.create(2);
        run_scoring_job(jobs.clone(), deps.clone(), handle, batch(2)).await;

        let warmer = crate::settings::apply_action(
            &Settings::default(),
            SettingsAction::SetTemperature { temperature: 0.8 },
        )
        .unwrap();
        save_settings(store.as_ref(), &warmer).unwrap();
        let new_hash = warmer.scoring_hash();
        assert!(deps.cache.is_stale(&new_hash).unwrap());

        let (_, handle) = jobs.create(2);
        run_scoring_job(jobs.clone(), deps.clone(), handle, batch(2)).await;
        assert!(!deps.cache.is_stale(&new_hash).unwrap());
        assert_eq!(deps.cache.stale_count(&new_hash).unwrap(), 0);
    }
}

//! Process-wide state: stores, collaborators, job registry, and the last
//! correlated snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::ai_cache::AiScoreCache;
use crate::config::Config;
use crate::error::Result;
use crate::featurebase::client::FeaturebaseClient;
use crate::featurebase::FeaturebasePost;
use crate::intelligence::anthropic::AnthropicProvider;
use crate::intelligence::openai::OpenAiProvider;
use crate::intelligence::{ScoringCapability, ScoringProvider};
use crate::jobs::JobStore;
use crate::linear::client::LinearClient;
use crate::overrides::OverrideStore;
use crate::services::scoring::ScoringDeps;
use crate::sources::{CommunitySource, IssueSink, IssueSource, SupportSource};
use crate::store::{DocumentStore, JsonFileStore};
use crate::types::FeatureRequest;
use crate::usage::UsageLedger;
use crate::zendesk::client::ZendeskClient;
use crate::zendesk::ZendeskTicket;

/// Where data comes from and where priorities go. Any of them may be absent
/// when credentials are not configured.
#[derive(Clone, Default)]
pub struct Sources {
    pub issues: Option<Arc<dyn IssueSource>>,
    pub community: Option<Arc<dyn CommunitySource>>,
    pub support: Option<Arc<dyn SupportSource>>,
    pub sink: Option<Arc<dyn IssueSink>>,
}

impl Sources {
    pub fn from_config(config: &Config) -> Self {
        let mut sources = Sources::default();

        if let Some(key) = &config.linear.api_key {
            let linear = Arc::new(LinearClient::new(key).with_team(config.linear.team_id.clone()));
            sources.issues = Some(linear.clone());
            sources.sink = Some(linear);
        }
        if let Some(key) = &config.featurebase.api_key {
            let board = config.featurebase.board_url.clone().unwrap_or_default();
            sources.community = Some(Arc::new(FeaturebaseClient::new(key, &board)));
        }
        if config.zendesk.is_complete() {
            if let (Some(subdomain), Some(email), Some(token)) = (
                &config.zendesk.subdomain,
                &config.zendesk.email,
                &config.zendesk.api_token,
            ) {
                sources.support = Some(Arc::new(ZendeskClient::new(subdomain, email, token)));
            }
        }

        sources
    }
}

pub fn capability_from_config(config: &Config) -> ScoringCapability {
    let anthropic = config.ai.anthropic_api_key.as_ref().map(|key| {
        Arc::new(AnthropicProvider::new(key, config.ai.anthropic_model.as_deref()))
            as Arc<dyn ScoringProvider>
    });
    let openai = config.ai.openai_api_key.as_ref().map(|key| {
        Arc::new(OpenAiProvider::new(key, config.ai.openai_model.as_deref()))
            as Arc<dyn ScoringProvider>
    });
    ScoringCapability::new(anthropic, openai)
}

/// The last refresh: correlated features plus the raw posts and tickets kept
/// for related-context lookups.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub features: Vec<FeatureRequest>,
    pub posts: Vec<FeaturebasePost>,
    pub tickets: Vec<ZendeskTicket>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<AiScoreCache>,
    pub overrides: OverrideStore,
    pub usage: Arc<UsageLedger>,
    pub jobs: Arc<JobStore>,
    pub scoring: Arc<ScoringDeps>,
    pub sources: Sources,
    pub snapshot: RwLock<Snapshot>,
    /// Serializes settings read-modify-write cycles.
    pub settings_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sources: Sources,
        capability: ScoringCapability,
        pacing: Duration,
        job_ttl_secs: u64,
    ) -> Self {
        let cache = Arc::new(AiScoreCache::new(store.clone()));
        let usage = Arc::new(UsageLedger::new(store.clone()));
        let scoring = Arc::new(ScoringDeps {
            store: store.clone(),
            cache: cache.clone(),
            usage: usage.clone(),
            capability,
            pacing,
        });

        Self {
            overrides: OverrideStore::new(store.clone()),
            store,
            cache,
            usage,
            jobs: Arc::new(JobStore::new(job_ttl_secs)),
            scoring,
            sources,
            snapshot: RwLock::new(Snapshot::default()),
            settings_lock: Mutex::new(()),
        }
    }

    /// File-backed state with real API clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(&data_dir)?);
        log::info!("State: data directory {}", data_dir.display());

        let capability = capability_from_config(config);
        if !capability.is_configured() {
            log::warn!("State: no AI provider key configured; scoring jobs will be rejected");
        }

        Ok(Self::new(
            store,
            Sources::from_config(config),
            capability,
            Duration::from_millis(config.pacing_millis),
            config.job_ttl_secs,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_follow_configured_credentials() {
        let mut config = Config::default();
        let sources = Sources::from_config(&config);
        assert!(sources.issues.is_none());
        assert!(sources.support.is_none());

        config.linear.api_key = Some("lin".to_string());
        config.zendesk.subdomain = Some("acme".to_string());
        config.zendesk.email = Some("a@acme.com".to_string());
        let sources = Sources::from_config(&config);
        assert!(sources.issues.is_some());
        assert!(sources.sink.is_some());
        // Zendesk needs all three fields.
        assert!(sources.support.is_none());
    }

    #[test]
    fn capability_built_from_keys() {
        let mut config = Config::default();
        assert!(!capability_from_config(&config).is_configured());
        config.ai.openai_api_key = Some("sk".to_string());
        let cap = capability_from_config(&config);
        assert!(cap.openai.is_some());
        assert!(cap.anthropic.is_none());
    }

    #[test]
    fn from_config_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().join("data")),
            ..Default::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert!(dir.path().join("data").exists());
        assert!(state.jobs.list().is_empty());
    }
}

//! Cached AI factor scores and settings-hash staleness.
//!
//! One document (`ai-scores`) holds the latest result per feature plus the
//! global hash the store was last written under. Each entry also carries its
//! own hash, so entries written under older configurations are individually
//! detectable as stale.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::intelligence::AiScoreResult;
use crate::settings::PromptConfig;
use crate::store::{DocumentStore, DocumentStoreExt, AI_SCORES_KEY};
use crate::types::{ModelProvider, ScoringFramework};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAiScore {
    pub feature_id: String,
    #[serde(default)]
    pub anthropic: Option<AiScoreResult>,
    #[serde(default)]
    pub openai: Option<AiScoreResult>,
    pub scored_at: DateTime<Utc>,
    #[serde(default)]
    pub settings_hash: String,
    #[serde(default)]
    pub framework: ScoringFramework,
    #[serde(default)]
    pub model_used: String,
}

impl StoredAiScore {
    /// Result from the preferred provider, falling back to whichever responded.
    pub fn preferred(&self, provider: ModelProvider) -> Option<&AiScoreResult> {
        self.result_for(provider)
            .or_else(|| self.result_for(provider.other()))
    }

    pub fn result_for(&self, provider: ModelProvider) -> Option<&AiScoreResult> {
        match provider {
            ModelProvider::Anthropic => self.anthropic.as_ref(),
            ModelProvider::OpenAi => self.openai.as_ref(),
        }
    }

    pub fn is_stale(&self, current_hash: &str) -> bool {
        self.settings_hash != current_hash
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiScoreDocument {
    #[serde(default)]
    pub settings_hash: String,
    #[serde(default)]
    pub scores: BTreeMap<String, StoredAiScore>,
}

/// Rebuild `value` with every object's keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Fingerprint of everything that changes what a model would answer.
/// SHA-256 of the canonical JSON triple, truncated to 16 hex chars.
pub fn settings_hash(prompt: &PromptConfig, framework: ScoringFramework, temperature: f64) -> String {
    let value = serde_json::json!({
        "promptConfig": prompt,
        "framework": framework,
        "temperature": temperature,
    });
    let canonical = canonicalize(value).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(16);
    hex
}

/// Read-modify-write access to the score document. Writes within this process
/// are serialized; concurrent processes resolve last-write-wins.
pub struct AiScoreCache {
    store: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl AiScoreCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<AiScoreDocument> {
        self.store.load(AI_SCORES_KEY, AiScoreDocument::default())
    }

    pub fn get(&self, feature_id: &str) -> Result<Option<StoredAiScore>> {
        Ok(self.load()?.scores.remove(feature_id))
    }

    pub fn all(&self) -> Result<BTreeMap<String, StoredAiScore>> {
        Ok(self.load()?.scores)
    }

    pub fn global_hash(&self) -> Result<String> {
        Ok(self.load()?.settings_hash)
    }

    /// Persist one entry, stamping it and the document with `current_hash`.
    pub fn save_score(&self, mut entry: StoredAiScore, current_hash: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut doc = self.load()?;
        entry.settings_hash = current_hash.to_string();
        doc.settings_hash = current_hash.to_string();
        doc.scores.insert(entry.feature_id.clone(), entry);
        self.store.save(AI_SCORES_KEY, &doc)
    }

    /// True when nothing was ever scored or the store was last written under
    /// a different configuration.
    pub fn is_stale(&self, current_hash: &str) -> Result<bool> {
        let global = self.global_hash()?;
        Ok(global.is_empty() || global != current_hash)
    }

    /// Entries whose own hash differs from `current_hash`.
    pub fn stale_count(&self, current_hash: &str) -> Result<usize> {
        Ok(self
            .load()?
            .scores
            .values()
            .filter(|s| s.is_stale(current_hash))
            .count())
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let doc = self.load()?;
        let removed = doc.scores.len();
        self.store.save(AI_SCORES_KEY, &AiScoreDocument::default())?;
        log::info!("AiScoreCache: cleared {} cached scores", removed);
        Ok(removed)
    }

    pub fn clear_feature(&self, feature_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut doc = self.load()?;
        let removed = doc.scores.remove(feature_id).is_some();
        if removed {
            self.store.save(AI_SCORES_KEY, &doc)?;
        }
        Ok(removed)
    }
}

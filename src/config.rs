//! Credentials and runtime knobs from ~/.prioritydesk/config.json.
//!
//! Every section is optional. Environment variables override credentials so a
//! CI run or a one-off shell can work without touching the file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::featurebase::FeaturebaseConfig;
use crate::jobs::DEFAULT_JOB_TTL_SECS;
use crate::linear::LinearConfig;
use crate::services::scoring::DEFAULT_PACING_MILLIS;
use crate::zendesk::ZendeskConfig;

const APP_DIR: &str = ".prioritydesk";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub linear: LinearConfig,
    #[serde(default)]
    pub featurebase: FeaturebaseConfig,
    #[serde(default)]
    pub zendesk: ZendeskConfig,
    #[serde(default)]
    pub ai: AiConfig,
    /// Where documents are stored. Defaults to ~/.prioritydesk/data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_pacing_millis")]
    pub pacing_millis: u64,
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
}

fn default_pacing_millis() -> u64 {
    DEFAULT_PACING_MILLIS
}

fn default_job_ttl_secs() -> u64 {
    DEFAULT_JOB_TTL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            linear: LinearConfig::default(),
            featurebase: FeaturebaseConfig::default(),
            zendesk: ZendeskConfig::default(),
            ai: AiConfig::default(),
            data_dir: None,
            pacing_millis: default_pacing_millis(),
            job_ttl_secs: default_job_ttl_secs(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(app_dir()?.join("data")),
        }
    }

    /// Overlay credentials from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LINEAR_API_KEY") {
            self.linear.api_key = Some(v);
        }
        if let Some(v) = get("FEATUREBASE_API_KEY") {
            self.featurebase.api_key = Some(v);
        }
        if let Some(v) = get("ZENDESK_SUBDOMAIN") {
            self.zendesk.subdomain = Some(v);
        }
        if let Some(v) = get("ZENDESK_EMAIL") {
            self.zendesk.email = Some(v);
        }
        if let Some(v) = get("ZENDESK_API_TOKEN") {
            self.zendesk.api_token = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(v);
        }
    }
}

fn app_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        DashboardError::Configuration("Could not find home directory".to_string())
    })?;
    Ok(home.join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

/// Read a config file. A missing file is an empty config, not an error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::info!("Config: {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| DashboardError::Configuration(format!("Failed to read config: {}", e)))?;
    serde_json::from_str(&content)
        .map_err(|e| DashboardError::Configuration(format!("Failed to parse config: {}", e)))
}

/// Load ~/.prioritydesk/config.json and apply environment overrides.
pub fn load_config() -> Result<Config> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| DashboardError::Configuration("Config path has no parent".to_string()))?;
    fs::create_dir_all(parent)
        .map_err(|e| DashboardError::Configuration(format!("Failed to create config dir: {}", e)))?;

    let content = serde_json::to_string_pretty(config)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path)
        .map_err(|e| DashboardError::Configuration(format!("Failed to write config: {}", e)))?;
    Ok(())
}

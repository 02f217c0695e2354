//! Featurebase community board integration.

pub mod client;

use serde::{Deserialize, Serialize};

/// Featurebase configuration stored in ~/.prioritydesk/config.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturebaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Public board URL, e.g. `https://acme.featurebase.app`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_url: Option<String>,
}

/// A community post. `content` is plain text (HTML already stripped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturebasePost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub upvotes: u32,
}

impl FeaturebasePost {
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

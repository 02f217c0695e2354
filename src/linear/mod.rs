//! Linear issue tracker integration.
//!
//! Reads backlog issues through the GraphQL API and writes computed
//! priorities back. Same shape as the Featurebase and Zendesk modules:
//! a config struct here, an HTTP client in `client`, write-back in `sync`.

pub mod client;
pub mod sync;

use serde::{Deserialize, Serialize};

/// Linear integration configuration stored in ~/.prioritydesk/config.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Restrict the backlog query to one team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

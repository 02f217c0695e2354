//! Zendesk support ticket integration.

pub mod client;

use serde::{Deserialize, Serialize};

/// Zendesk configuration stored in ~/.prioritydesk/config.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZendeskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl ZendeskConfig {
    pub fn is_complete(&self) -> bool {
        self.subdomain.is_some() && self.email.is_some() && self.api_token.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZendeskTicket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ZendeskTicket {
    pub fn search_text(&self) -> String {
        format!("{} {}", self.subject, self.description)
    }
}

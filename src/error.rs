//! Error types for correlation, scoring and sync
//!
//! Errors are classified by recoverability:
//! - Retryable: Network issues, rate limits, upstream 5xx
//! - NonRetryable: Bad input, malformed data, unknown ids
//! - RequiresUserAction: Missing credentials, no scoring provider configured

use thiserror::Error;

/// Error types for the dashboard core and its collaborators
#[derive(Debug, Error)]
pub enum DashboardError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("{service} rate limit exceeded")]
    RateLimited { service: &'static str },

    #[error("{service} API error {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    // Non-retryable errors
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Scoring job failed: {0}")]
    JobFailed(String),

    /// Every provider failed for one feature. Retryable when any of the
    /// underlying failures was.
    #[error("All scoring providers failed: {detail}")]
    ProvidersFailed { detail: String, retryable: bool },

    // Requires user action
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing credentials for {0}")]
    MissingCredentials(&'static str),
}

impl DashboardError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DashboardError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Network(_) | DashboardError::RateLimited { .. } => true,
            DashboardError::Api { status, .. } => *status >= 500,
            DashboardError::ProvidersFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            DashboardError::Configuration(_) | DashboardError::MissingCredentials(_)
        )
    }

    /// Returns true for the not-found condition (distinct from an empty result)
    pub fn is_not_found(&self) -> bool {
        matches!(self, DashboardError::NotFound { .. })
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Network(_) => "Check your internet connection and try again.",
            DashboardError::RateLimited { .. } => "Wait a few minutes and try again.",
            DashboardError::Api { status, .. } if *status >= 500 => {
                "The upstream service is having trouble. Try again shortly."
            }
            DashboardError::Api { .. } => "Check the API key and request parameters.",
            DashboardError::NotFound { .. } => "Refresh the dashboard and try again.",
            DashboardError::InvalidInput(_) => "Correct the input and resubmit.",
            DashboardError::Parse(_) => "The upstream response was malformed. Retry later.",
            DashboardError::Store(_) => {
                "Check permissions and disk space for ~/.prioritydesk/data"
            }
            DashboardError::JobFailed(_) => "Check the logs, then start a new scoring job.",
            DashboardError::ProvidersFailed { .. } => {
                "Rescore this feature later, or switch model mode."
            }
            DashboardError::Configuration(_) => {
                "Check your configuration in ~/.prioritydesk/config.json"
            }
            DashboardError::MissingCredentials(_) => {
                "Add the API key to ~/.prioritydesk/config.json or the environment."
            }
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DashboardError::Parse(err.to_string())
        } else {
            DashboardError::Network(err.to_string())
        }
    }
}

/// Serializable error representation for the command layer
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
    NotFound,
}

impl From<&DashboardError> for CommandError {
    fn from(err: &DashboardError) -> Self {
        let error_type = if err.is_not_found() {
            ErrorType::NotFound
        } else if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        CommandError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

impl From<DashboardError> for CommandError {
    fn from(err: DashboardError) -> Self {
        CommandError::from(&err)
    }
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

//! Collaborator seams: where issues, posts and tickets come from, and where
//! computed priorities go.

use async_trait::async_trait;

use crate::error::Result;
use crate::featurebase::FeaturebasePost;
use crate::linear::client::LinearIssue;
use crate::zendesk::ZendeskTicket;

#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn list_backlog_issues(&self) -> Result<Vec<LinearIssue>>;
}

#[async_trait]
pub trait CommunitySource: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<FeaturebasePost>>;
}

#[async_trait]
pub trait SupportSource: Send + Sync {
    async fn list_tickets(&self) -> Result<Vec<ZendeskTicket>>;
}

/// Called after a paginated fetch. Logs a warning when the page cap stopped
/// it with pages still unread; returns whether the result was cut short.
pub(crate) fn warn_if_truncated(
    service: &str,
    more_remaining: bool,
    max_pages: usize,
    fetched: usize,
) -> bool {
    if more_remaining {
        log::warn!(
            "{}: stopped after {} pages ({} items); remaining pages were not fetched",
            service,
            max_pages,
            fetched
        );
    }
    more_remaining
}

#[async_trait]
pub trait IssueSink: Send + Sync {
    /// Write one priority (1-4) back to the tracker.
    async fn update_priority(
        &self,
        issue_id: &str,
        priority: u8,
        sort_order: Option<f64>,
    ) -> Result<()>;

    async fn add_comment(&self, issue_id: &str, body: &str) -> Result<()>;
}

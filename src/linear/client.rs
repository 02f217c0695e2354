//! GraphQL client for the Linear API.
//!
//! Uses reqwest with API-key auth. All queries target
//! `https://api.linear.app/graphql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{DashboardError, Result};
use crate::sources::{warn_if_truncated, IssueSink, IssueSource};

const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Page size for the backlog query; Linear caps `first` at 250.
const PAGE_SIZE: u32 = 100;

/// Hard stop on pagination so a misbehaving cursor cannot loop forever.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearComment {
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A Linear issue as the correlator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub state_name: Option<String>,
    pub state_type: Option<String>,
    pub priority: Option<i32>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Attachment URLs (Featurebase links land here).
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub comments: Vec<LinearComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Raw GraphQL node shapes.

#[derive(Debug, Deserialize)]
struct IssuesResponse {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    nodes: Vec<IssueNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    description: Option<String>,
    url: String,
    priority: Option<i32>,
    state: Option<StateNode>,
    project: Option<ProjectRef>,
    labels: Option<Connection<LabelNode>>,
    attachments: Option<Connection<AttachmentNode>>,
    comments: Option<Connection<CommentNode>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StateNode {
    name: Option<String>,
    #[serde(rename = "type")]
    state_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentNode {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    body: String,
    created_at: DateTime<Utc>,
    user: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    name: Option<String>,
}

impl From<IssueNode> for LinearIssue {
    fn from(n: IssueNode) -> Self {
        LinearIssue {
            id: n.id,
            identifier: n.identifier,
            title: n.title,
            description: n.description,
            url: n.url,
            state_name: n.state.as_ref().and_then(|s| s.name.clone()),
            state_type: n.state.as_ref().and_then(|s| s.state_type.clone()),
            priority: n.priority,
            project_id: n.project.as_ref().map(|p| p.id.clone()),
            project_name: n.project.as_ref().map(|p| p.name.clone()),
            labels: n
                .labels
                .map(|c| c.nodes.into_iter().map(|l| l.name).collect())
                .unwrap_or_default(),
            attachments: n
                .attachments
                .map(|c| c.nodes.into_iter().map(|a| a.url).collect())
                .unwrap_or_default(),
            comments: n
                .comments
                .map(|c| {
                    c.nodes
                        .into_iter()
                        .map(|c| LinearComment {
                            body: c.body,
                            author: c.user.and_then(|u| u.name),
                            created_at: c.created_at,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

const BACKLOG_QUERY: &str = r#"
query Backlog($first: Int!, $after: String, $filter: IssueFilter) {
    issues(first: $first, after: $after, filter: $filter) {
        nodes {
            id identifier title description url priority
            state { name type }
            project { id name }
            labels { nodes { name } }
            attachments { nodes { url } }
            comments(first: 10) { nodes { body createdAt user { name } } }
            createdAt updatedAt
        }
        pageInfo { hasNextPage endCursor }
    }
}"#;

pub struct LinearClient {
    client: reqwest::Client,
    api_key: String,
    team_id: Option<String>,
}

impl LinearClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            team_id: None,
        }
    }

    pub fn with_team(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(LINEAR_API_URL)
            .header("Authorization", self.api_key.clone())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DashboardError::RateLimited { service: "Linear" });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Api {
                service: "Linear",
                status: status.as_u16(),
                message: text,
            });
        }

        let json: Value = resp.json().await?;
        parse_graphql_data(json)
    }

    fn backlog_filter(&self) -> Value {
        let mut filter = json!({ "state": { "type": { "eq": "backlog" } } });
        if let Some(team) = &self.team_id {
            filter["team"] = json!({ "id": { "eq": team } });
        }
        filter
    }

    /// Fetch every backlog issue, following the pagination cursor.
    pub async fn fetch_backlog_issues(&self) -> Result<Vec<LinearIssue>> {
        let mut issues = Vec::new();
        let mut after: Option<String> = None;
        let mut more_remaining = false;

        for page in 0..MAX_PAGES {
            let variables = json!({
                "first": PAGE_SIZE,
                "after": after,
                "filter": self.backlog_filter(),
            });
            let resp: IssuesResponse = self.graphql(BACKLOG_QUERY, variables).await?;
            issues.extend(resp.issues.nodes.into_iter().map(LinearIssue::from));

            let page_info = resp.issues.page_info;
            more_remaining = page_info.has_next_page && page_info.end_cursor.is_some();
            if !more_remaining {
                break;
            }
            after = page_info.end_cursor;
            log::debug!("Linear: fetched page {} ({} issues so far)", page + 1, issues.len());
        }
        warn_if_truncated("Linear", more_remaining, MAX_PAGES, issues.len());

        log::info!("Linear: fetched {} backlog issues", issues.len());
        Ok(issues)
    }

    /// Set priority (1-4) and, optionally, the manual sort order.
    pub async fn update_issue_priority(
        &self,
        issue_id: &str,
        priority: u8,
        sort_order: Option<f64>,
    ) -> Result<()> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpdateResponse {
            issue_update: MutationResult,
        }

        let mut input = json!({ "priority": priority });
        if let Some(order) = sort_order {
            input["sortOrder"] = json!(order);
        }

        let resp: UpdateResponse = self
            .graphql(
                "mutation($id: String!, $input: IssueUpdateInput!) { issueUpdate(id: $id, input: $input) { success } }",
                json!({ "id": issue_id, "input": input }),
            )
            .await?;

        resp.issue_update.into_result("issueUpdate", issue_id)
    }

    pub async fn create_comment(&self, issue_id: &str, body: &str) -> Result<()> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CommentResponse {
            comment_create: MutationResult,
        }

        let resp: CommentResponse = self
            .graphql(
                "mutation($input: CommentCreateInput!) { commentCreate(input: $input) { success } }",
                json!({ "input": { "issueId": issue_id, "body": body } }),
            )
            .await?;

        resp.comment_create.into_result("commentCreate", issue_id)
    }
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    success: bool,
}

impl MutationResult {
    fn into_result(self, mutation: &str, issue_id: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(DashboardError::Api {
                service: "Linear",
                status: 200,
                message: format!("{} reported failure for {}", mutation, issue_id),
            })
        }
    }
}

/// Pull `data` out of a GraphQL envelope, surfacing `errors` first.
fn parse_graphql_data<T: serde::de::DeserializeOwned>(json: Value) -> Result<T> {
    if let Some(errors) = json.get("errors") {
        return Err(DashboardError::Api {
            service: "Linear",
            status: 200,
            message: format!("GraphQL errors: {}", errors),
        });
    }

    let data = json
        .get("data")
        .ok_or_else(|| DashboardError::Parse("Missing 'data' in Linear response".to_string()))?;

    serde_json::from_value(data.clone())
        .map_err(|e| DashboardError::Parse(format!("Linear data: {}", e)))
}

#[async_trait]
impl IssueSource for LinearClient {
    async fn list_backlog_issues(&self) -> Result<Vec<LinearIssue>> {
        self.fetch_backlog_issues().await
    }
}

#[async_trait]
impl IssueSink for LinearClient {
    async fn update_priority(
        &self,
        issue_id: &str,
        priority: u8,
        sort_order: Option<f64>,
    ) -> Result<()> {
        self.update_issue_priority(issue_id, priority, sort_order)
            .await
    }

    async fn add_comment(&self, issue_id: &str, body: &str) -> Result<()> {
        self.create_comment(issue_id, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issue_page() {
        let json = json!({
            "data": {
                "issues": {
                    "nodes": [{
                        "id": "iss-1",
                        "identifier": "ENG-42",
                        "title": "SSO login",
                        "description": null,
                        "url": "https://linear.app/acme/issue/ENG-42",
                        "priority": 0,
                        "state": { "name": "Backlog", "type": "backlog" },
                        "project": { "id": "p1", "name": "Platform" },
                        "labels": { "nodes": [{ "name": "Featurebase" }, { "name": "Enterprise" }] },
                        "attachments": { "nodes": [{ "url": "https://acme.featurebase.app/p/abc123" }] },
                        "comments": { "nodes": [{
                            "body": "+1 from Globex",
                            "createdAt": "2026-03-02T10:00:00Z",
                            "user": { "name": "Dana" }
                        }] },
                        "createdAt": "2026-03-01T09:00:00Z",
                        "updatedAt": "2026-03-03T09:00:00Z"
                    }],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                }
            }
        });

        let resp: IssuesResponse = parse_graphql_data(json).unwrap();
        let issue = LinearIssue::from(resp.issues.nodes.into_iter().next().unwrap());
        assert_eq!(issue.identifier, "ENG-42");
        assert_eq!(issue.state_type.as_deref(), Some("backlog"));
        assert_eq!(issue.project_name.as_deref(), Some("Platform"));
        assert_eq!(issue.labels, vec!["Featurebase", "Enterprise"]);
        assert_eq!(issue.attachments.len(), 1);
        assert_eq!(issue.comments[0].author.as_deref(), Some("Dana"));
        assert!(issue.description.is_none());
    }

    #[test]
    fn graphql_errors_surface_as_api_errors() {
        let json = json!({ "errors": [{ "message": "Authentication required" }] });
        let err = parse_graphql_data::<IssuesResponse>(json).unwrap_err();
        assert!(matches!(err, DashboardError::Api { service: "Linear", .. }));
    }

    #[test]
    fn backlog_filter_includes_team() {
        let client = LinearClient::new("key").with_team(Some("team-1".to_string()));
        let filter = client.backlog_filter();
        assert_eq!(filter["state"]["type"]["eq"], "backlog");
        assert_eq!(filter["team"]["id"]["eq"], "team-1");
    }
}

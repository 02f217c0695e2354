//! Cross-source correlation: Linear backlog issues + Featurebase posts +
//! Zendesk tickets -> `FeatureRequest`.
//!
//! Post matching tries three strategies in order and stops at the first hit:
//! 1. Direct link: an attachment URL on the community board domain that names the post.
//! 2. Label-gated: the issue carries the community label; first post whose
//!    title keywords clear `thresholds.label_gated`.
//! 3. Fallback: best title+body similarity strictly above `thresholds.fallback`.
//!
//! Support tickets are only counted, never linked.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::featurebase::FeaturebasePost;
use crate::linear::client::LinearIssue;
use crate::settings::Settings;
use crate::text::{extract_keywords, similarity};
use crate::types::{
    CustomerTier, FeatureComment, FeatureRequest, FeatureSource, FeatureType, Product,
};
use crate::zendesk::ZendeskTicket;

/// Comments kept per feature, most recent first.
const MAX_COMMENTS: usize = 10;

const BACKLOG_STATE: &str = "backlog";

/// Keyword sets for one post, computed once per correlation run.
struct PostKeywords {
    title: HashSet<String>,
    full: HashSet<String>,
}

/// Which strategy produced a post match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    DirectLink,
    LabelGated,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostMatch {
    pub index: usize,
    pub confidence: f64,
    pub kind: MatchKind,
}

/// Build the canonical feature list. Output order follows the filtered input order.
pub fn correlate(
    issues: &[LinearIssue],
    posts: &[FeaturebasePost],
    tickets: &[ZendeskTicket],
    settings: &Settings,
) -> Vec<FeatureRequest> {
    let post_keywords: Vec<PostKeywords> = posts
        .iter()
        .map(|p| PostKeywords {
            title: extract_keywords(&p.title),
            full: extract_keywords(&p.search_text()),
        })
        .collect();
    let ticket_keywords: Vec<HashSet<String>> = tickets
        .iter()
        .map(|t| extract_keywords(&t.search_text()))
        .collect();

    let mut features = Vec::new();
    let mut skipped = 0usize;

    for issue in issues {
        if !is_backlog(issue) || is_excluded(issue, settings) {
            skipped += 1;
            continue;
        }

        let post_match = match_post(issue, posts, &post_keywords, settings);
        let issue_keywords = extract_keywords(&issue_search_text(issue));
        let support_ticket_count = count_matching_tickets(
            &issue_keywords,
            &ticket_keywords,
            settings.thresholds.support_ticket,
        );

        features.push(build_feature(
            issue,
            post_match.map(|m| (&posts[m.index], m.confidence)),
            support_ticket_count,
            settings,
        ));
    }

    log::info!(
        "Correlator: built {} features ({} issues skipped, {} posts, {} tickets)",
        features.len(),
        skipped,
        posts.len(),
        tickets.len()
    );

    features
}

pub fn is_backlog(issue: &LinearIssue) -> bool {
    issue
        .state_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case(BACKLOG_STATE))
}

fn is_excluded(issue: &LinearIssue, settings: &Settings) -> bool {
    issue
        .project_id
        .as_ref()
        .is_some_and(|id| settings.excluded_project_ids.contains(id))
}

fn issue_search_text(issue: &LinearIssue) -> String {
    format!(
        "{} {}",
        issue.title,
        issue.description.as_deref().unwrap_or_default()
    )
}

fn build_feature(
    issue: &LinearIssue,
    post: Option<(&FeaturebasePost, f64)>,
    support_ticket_count: u32,
    settings: &Settings,
) -> FeatureRequest {
    let mut comments: Vec<FeatureComment> = issue
        .comments
        .iter()
        .map(|c| FeatureComment {
            body: c.body.clone(),
            author: c.author.clone(),
            created_at: c.created_at,
        })
        .collect();
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    comments.truncate(MAX_COMMENTS);

    let mut labels: Vec<String> = Vec::with_capacity(issue.labels.len());
    for label in &issue.labels {
        if !labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            labels.push(label.clone());
        }
    }

    FeatureRequest {
        id: issue.id.clone(),
        identifier: issue.identifier.clone(),
        title: issue.title.clone(),
        description: issue.description.clone().unwrap_or_default(),
        comments,
        url: issue.url.clone(),
        product: resolve_product(issue, settings),
        customer_tier: extract_customer_tier(&labels),
        feature_type: classify_type(&labels),
        source: classify_source(&labels, &settings.community_label),
        labels,
        project_id: issue.project_id.clone(),
        project_name: issue.project_name.clone(),
        featurebase_url: post.map(|(p, _)| p.url.clone()).filter(|u| !u.is_empty()),
        featurebase_post_id: post.map(|(p, _)| p.id.clone()),
        featurebase_upvotes: post.map(|(p, _)| p.upvotes).unwrap_or(0),
        match_confidence: post.map(|(_, c)| c),
        support_ticket_count,
        is_duplicate: false,
        duplicate_of: None,
        duplicates: Vec::new(),
        created_at: issue.created_at,
        updated_at: issue.updated_at,
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Mapping override -> project-name pattern -> default, then labels override all.
pub fn resolve_product(issue: &LinearIssue, settings: &Settings) -> Product {
    let mapped = issue
        .project_id
        .as_ref()
        .and_then(|id| settings.project_mappings.get(id).copied());

    let project_derived = mapped.unwrap_or_else(|| {
        issue
            .project_name
            .as_deref()
            .and_then(|name| product_from_project_name(name, settings))
            .unwrap_or_default()
    });

    product_from_labels(&issue.labels, settings).unwrap_or(project_derived)
}

fn product_from_project_name(name: &str, settings: &Settings) -> Option<Product> {
    let name = name.to_lowercase();
    settings
        .products
        .iter()
        .find(|rule| {
            rule.project_patterns
                .iter()
                .any(|p| !p.is_empty() && name.contains(&p.to_lowercase()))
        })
        .map(|rule| rule.product)
}

fn product_from_labels(labels: &[String], settings: &Settings) -> Option<Product> {
    let labels: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
    settings
        .products
        .iter()
        .find(|rule| {
            rule.label_patterns.iter().any(|p| {
                let p = p.to_lowercase();
                !p.is_empty() && labels.iter().any(|l| l.contains(&p))
            })
        })
        .map(|rule| rule.product)
}

fn tier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:tier|plan|customer)\s*[:/_-]?\s*)?(enterprise|business|pro|free)(?:\s*[-_]?\s*(?:tier|plan|customer))?$",
        )
        .expect("valid tier regex")
    })
}

/// First label that names a tier wins; `business` otherwise.
pub fn extract_customer_tier(labels: &[String]) -> CustomerTier {
    labels
        .iter()
        .find_map(|label| {
            tier_regex()
                .captures(label.trim())
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .unwrap_or_default()
}

pub fn classify_type(labels: &[String]) -> FeatureType {
    let has = |needle: &str| labels.iter().any(|l| l.to_lowercase().contains(needle));
    if has("bug") {
        FeatureType::Bug
    } else if has("enhancement") || has("improvement") {
        FeatureType::Enhancement
    } else {
        FeatureType::Feature
    }
}

pub fn classify_source(labels: &[String], community_label: &str) -> FeatureSource {
    let community_label = community_label.to_lowercase();
    let has = |needle: &str| labels.iter().any(|l| l.to_lowercase().contains(needle));
    if (!community_label.is_empty() && has(&community_label)) || has("community") {
        FeatureSource::Featurebase
    } else if has("support") || has("zendesk") {
        FeatureSource::Support
    } else {
        FeatureSource::Internal
    }
}

// =============================================================================
// Matching
// =============================================================================

fn match_post(
    issue: &LinearIssue,
    posts: &[FeaturebasePost],
    keywords: &[PostKeywords],
    settings: &Settings,
) -> Option<PostMatch> {
    if posts.is_empty() {
        return None;
    }

    if let Some(index) = direct_link_match(issue, posts, &settings.community_domain) {
        return Some(PostMatch {
            index,
            confidence: 1.0,
            kind: MatchKind::DirectLink,
        });
    }

    let community_label = settings.community_label.to_lowercase();
    let labelled = !community_label.is_empty()
        && issue
            .labels
            .iter()
            .any(|l| l.to_lowercase().contains(&community_label));

    if labelled {
        let title_kw = extract_keywords(&issue.title);
        let hit = keywords.iter().enumerate().find_map(|(i, k)| {
            let score = similarity(&title_kw, &k.title);
            (score > settings.thresholds.label_gated).then_some((i, score))
        });
        if let Some((index, confidence)) = hit {
            return Some(PostMatch {
                index,
                confidence,
                kind: MatchKind::LabelGated,
            });
        }
    }

    let issue_kw = extract_keywords(&issue_search_text(issue));
    let mut best: Option<PostMatch> = None;
    for (index, k) in keywords.iter().enumerate() {
        let score = similarity(&issue_kw, &k.full);
        if score > settings.thresholds.fallback
            && best.as_ref().map_or(true, |b| score > b.confidence)
        {
            best = Some(PostMatch {
                index,
                confidence: score,
                kind: MatchKind::Fallback,
            });
        }
    }

    best
}

fn direct_link_match(
    issue: &LinearIssue,
    posts: &[FeaturebasePost],
    community_domain: &str,
) -> Option<usize> {
    let domain = community_domain.to_lowercase();
    issue
        .attachments
        .iter()
        .filter(|url| !domain.is_empty() && url.to_lowercase().contains(&domain))
        .find_map(|url| {
            posts
                .iter()
                .position(|p| !p.url.is_empty() && p.url == *url)
                .or_else(|| {
                    posts
                        .iter()
                        .position(|p| !p.id.is_empty() && url_has_segment(url, &p.id))
                })
        })
}

/// Whole-segment match, so `post-7` does not match `/p/post-77`.
fn url_has_segment(url: &str, segment: &str) -> bool {
    url.split(['/', '?', '#', '&', '=']).any(|part| part == segment)
}

fn count_matching_tickets(
    issue_keywords: &HashSet<String>,
    tickets: &[HashSet<String>],
    threshold: f64,
) -> u32 {
    tickets
        .iter()
        .filter(|t| similarity(issue_keywords, t) > threshold)
        .count() as u32
}

// =============================================================================
// Related context (UI + prompt context, not identity)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPost {
    pub post: FeaturebasePost,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTicket {
    pub ticket: ZendeskTicket,
    pub similarity: f64,
}

/// Top posts above `threshold`, best first.
pub fn related_posts(
    feature: &FeatureRequest,
    posts: &[FeaturebasePost],
    threshold: f64,
    limit: usize,
) -> Vec<RelatedPost> {
    let keywords = extract_keywords(&feature.search_text());
    let mut related: Vec<RelatedPost> = posts
        .iter()
        .filter_map(|p| {
            let score = similarity(&keywords, &extract_keywords(&p.search_text()));
            (score > threshold).then(|| RelatedPost {
                post: p.clone(),
                similarity: score,
            })
        })
        .collect();

    related.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    related.truncate(limit);
    related
}

/// Top tickets above `threshold`, best first.
pub fn related_tickets(
    feature: &FeatureRequest,
    tickets: &[ZendeskTicket],
    threshold: f64,
    limit: usize,
) -> Vec<RelatedTicket> {
    let keywords = extract_keywords(&feature.search_text());
    let mut related: Vec<RelatedTicket> = tickets
        .iter()
        .filter_map(|t| {
            let score = similarity(&keywords, &extract_keywords(&t.search_text()));
            (score > threshold).then(|| RelatedTicket {
                ticket: t.clone(),
                similarity: score,
            })
        })
        .collect();

    related.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    related.truncate(limit);
    related
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::client::LinearComment;
    use chrono::{TimeZone, Utc};

    fn issue(id: &str, title: &str, description: Option<&str>) -> LinearIssue {
        LinearIssue {
            id: id.to_string(),
            identifier: format!("ENG-{}", id),
            title: title.to_string(),
            description: description.map(String::from),
            url: format!("https://linear.app/acme/issue/{}", id),
            state_name: Some("Backlog".to_string()),
            state_type: Some("backlog".to_string()),
            priority: None,
            project_id: None,
            project_name: None,
            labels: Vec::new(),
            attachments: Vec::new(),
            comments: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    fn post(id: &str, title: &str, content: &str, upvotes: u32) -> FeaturebasePost {
        FeaturebasePost {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            url: format!("https://acme.featurebase.app/p/{}", id),
            upvotes,
        }
    }

    fn ticket(id: u64, subject: &str, description: &str) -> ZendeskTicket {
        ZendeskTicket {
            id,
            subject: subject.to_string(),
            description: description.to_string(),
            url: None,
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_backlog_issues_survive() {
        let mut started = issue("2", "Dark mode", None);
        started.state_type = Some("started".to_string());
        let mut stateless = issue("3", "Webhooks", None);
        stateless.state_type = None;

        let features = correlate(
            &[issue("1", "Audit log export", None), started, stateless],
            &[],
            &[],
            &Settings::default(),
        );
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "1");
    }

    #[test]
    fn excluded_projects_are_dropped() {
        let mut i = issue("1", "Audit log export", None);
        i.project_id = Some("icebox".to_string());
        let mut settings = Settings::default();
        settings.excluded_project_ids.push("icebox".to_string());

        assert!(correlate(&[i], &[], &[], &settings).is_empty());
    }

    #[test]
    fn output_preserves_input_order() {
        let issues = vec![
            issue("b", "Webhooks retry", None),
            issue("a", "Audit log export", None),
            issue("c", "Calendar sync", None),
        ];
        let ids: Vec<String> = correlate(&issues, &[], &[], &Settings::default())
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_description_becomes_empty_string() {
        let features = correlate(&[issue("1", "Webhooks", None)], &[], &[], &Settings::default());
        assert_eq!(features[0].description, "");
    }

    #[test]
    fn icebox_ai_agents_project_resolves_to_ai_agents() {
        let mut i = issue("1", "Agent memory", None);
        i.project_id = Some("p-ice".to_string());
        i.project_name = Some("Product Icebox (AI Agents)".to_string());
        let settings = Settings::default();

        assert_eq!(resolve_product(&i, &settings), Product::AiAgents);
        assert_eq!(
            settings.stage_for(resolve_product(&i, &settings)),
            crate::types::ProductStage::New
        );
    }

    #[test]
    fn unknown_project_defaults_to_platform() {
        let mut i = issue("1", "Something", None);
        i.project_name = Some("Q3 Roadmap".to_string());
        assert_eq!(resolve_product(&i, &Settings::default()), Product::Platform);
    }

    #[test]
    fn explicit_mapping_beats_project_name() {
        let mut i = issue("1", "Something", None);
        i.project_id = Some("p1".to_string());
        i.project_name = Some("Mobile app".to_string());
        let mut settings = Settings::default();
        settings
            .project_mappings
            .insert("p1".to_string(), Product::Integrations);

        assert_eq!(resolve_product(&i, &settings), Product::Integrations);
    }

    #[test]
    fn labels_override_project_and_mapping() {
        let mut i = issue("1", "Something", None);
        i.project_id = Some("p1".to_string());
        i.project_name = Some("Mobile app".to_string());
        i.labels = labels(&["AI Agents"]);
        let mut settings = Settings::default();
        settings
            .project_mappings
            .insert("p1".to_string(), Product::Integrations);

        assert_eq!(resolve_product(&i, &settings), Product::AiAgents);
    }

    #[test]
    fn tier_extraction_from_labels() {
        assert_eq!(
            extract_customer_tier(&labels(&["bug", "Enterprise"])),
            CustomerTier::Enterprise
        );
        assert_eq!(extract_customer_tier(&labels(&["tier: pro"])), CustomerTier::Pro);
        assert_eq!(extract_customer_tier(&labels(&["Free Plan"])), CustomerTier::Free);
        assert_eq!(
            extract_customer_tier(&labels(&["Production", "professional services"])),
            CustomerTier::Business
        );
        assert_eq!(extract_customer_tier(&[]), CustomerTier::Business);
    }

    #[test]
    fn type_and_source_from_labels() {
        assert_eq!(classify_type(&labels(&["Bug"])), FeatureType::Bug);
        assert_eq!(classify_type(&labels(&["Improvement"])), FeatureType::Enhancement);
        assert_eq!(classify_type(&labels(&["ux"])), FeatureType::Feature);

        assert_eq!(
            classify_source(&labels(&["From Featurebase"]), "featurebase"),
            FeatureSource::Featurebase
        );
        assert_eq!(
            classify_source(&labels(&["zendesk"]), "featurebase"),
            FeatureSource::Support
        );
        assert_eq!(classify_source(&[], "featurebase"), FeatureSource::Internal);
    }

    #[test]
    fn direct_link_wins_with_full_confidence() {
        let mut i = issue("1", "Completely unrelated wording", None);
        i.attachments = vec!["https://acme.featurebase.app/p/post-77".to_string()];
        let posts = vec![
            post("post-12", "Completely unrelated wording", "", 3),
            post("post-77", "Dark mode", "", 40),
        ];

        let features = correlate(&[i], &posts, &[], &Settings::default());
        assert_eq!(features[0].featurebase_post_id.as_deref(), Some("post-77"));
        assert_eq!(features[0].featurebase_upvotes, 40);
        assert_eq!(features[0].match_confidence, Some(1.0));
    }

    #[test]
    fn direct_link_prefers_exact_url_over_id_prefix() {
        let mut i = issue("1", "Completely unrelated wording", None);
        i.attachments = vec!["https://acme.featurebase.app/p/post-77".to_string()];
        let posts = vec![post("post-7", "Other", "", 1), post("post-77", "Dark mode", "", 40)];

        let features = correlate(&[i], &posts, &[], &Settings::default());
        assert_eq!(features[0].featurebase_post_id.as_deref(), Some("post-77"));
        assert_eq!(features[0].featurebase_upvotes, 40);
    }

    #[test]
    fn direct_link_matches_id_as_whole_segment() {
        let mut i = issue("1", "Completely unrelated wording", None);
        i.attachments = vec!["https://acme.featurebase.app/p/post-77?ref=linear".to_string()];
        let posts = vec![post("post-7", "Other", "", 1), post("post-77", "Dark mode", "", 40)];

        let features = correlate(&[i], &posts, &[], &Settings::default());
        assert_eq!(features[0].featurebase_post_id.as_deref(), Some("post-77"));
        assert_eq!(features[0].match_confidence, Some(1.0));

        assert!(url_has_segment("https://acme.featurebase.app/p/post-77#c1", "post-77"));
        assert!(!url_has_segment("https://acme.featurebase.app/p/post-77", "post-7"));
    }

    #[test]
    fn attachment_off_domain_is_not_a_direct_link() {
        let mut i = issue("1", "Webhooks retry policy", None);
        i.attachments = vec!["https://github.com/acme/post-77".to_string()];
        let posts = vec![post("post-77", "Dark mode", "", 40)];

        let features = correlate(&[i], &posts, &[], &Settings::default());
        assert!(features[0].featurebase_post_id.is_none());
    }

    #[test]
    fn label_gated_takes_first_post_over_threshold() {
        let mut i = issue("1", "Dark mode theme", Some("unrelated body"));
        i.labels = labels(&["Featurebase"]);
        let posts = vec![
            post("p1", "Calendar sync", "", 1),
            post("p2", "Dark mode theme toggle", "", 5),
            post("p3", "Dark mode theme", "", 9),
        ];

        let m = match_post(
            &i,
            &posts,
            &posts
                .iter()
                .map(|p| PostKeywords {
                    title: extract_keywords(&p.title),
                    full: extract_keywords(&p.search_text()),
                })
                .collect::<Vec<_>>(),
            &Settings::default(),
        )
        .unwrap();

        // p2: {dark, mode, theme} vs {dark, mode, theme, toggle} = 0.75 > 0.5, first hit
        assert_eq!(m.kind, MatchKind::LabelGated);
        assert_eq!(m.index, 1);
    }

    #[test]
    fn fallback_takes_best_candidate_strictly_above_threshold() {
        let i = issue("1", "Bulk export invoices", Some("CSV export for invoices"));
        let posts = vec![
            post("p1", "Export invoices", "bulk CSV", 1),
            post("p2", "Invoices export", "bulk CSV export invoices", 2),
            post("p3", "Dark mode", "", 3),
        ];

        let features = correlate(&[i], &posts, &[], &Settings::default());
        // Both p1 and p2 score 1.0; the first best is kept.
        assert_eq!(features[0].featurebase_post_id.as_deref(), Some("p1"));
        assert!(features[0].match_confidence.unwrap() > 0.4);
    }

    #[test]
    fn fallback_rejects_weak_matches() {
        let i = issue("1", "Bulk export invoices", None);
        let posts = vec![post("p1", "Export dashboards", "charts graphs", 1)];
        let features = correlate(&[i], &posts, &[], &Settings::default());
        assert!(features[0].featurebase_post_id.is_none());
        assert_eq!(features[0].featurebase_upvotes, 0);
    }

    #[test]
    fn support_tickets_are_counted() {
        let i = issue("1", "SAML single sign-on", Some("Okta SAML login"));
        let tickets = vec![
            ticket(1, "SAML login broken", "Okta single sign-on fails"),
            ticket(2, "Okta SAML", "need single sign-on login"),
            ticket(3, "Invoice question", "billing address"),
        ];
        let features = correlate(&[i], &[], &tickets, &Settings::default());
        assert_eq!(features[0].support_ticket_count, 2);
    }

    #[test]
    fn comments_sorted_recent_first_and_capped() {
        let mut i = issue("1", "Webhooks", None);
        i.comments = (0..15)
            .map(|n| LinearComment {
                body: format!("comment {}", n),
                author: None,
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, n, 0, 0).unwrap(),
            })
            .collect();

        let features = correlate(&[i], &[], &[], &Settings::default());
        let comments = &features[0].comments;
        assert_eq!(comments.len(), 10);
        assert_eq!(comments[0].body, "comment 14");
        assert!(comments.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn related_posts_sorted_and_limited() {
        let feature = correlate(
            &[issue("1", "Slack notifications", Some("Slack alerts channel"))],
            &[],
            &[],
            &Settings::default(),
        )
        .remove(0);

        let mut posts: Vec<FeaturebasePost> = (0..8)
            .map(|n| post(&format!("p{}", n), "Slack notifications channel", "", n))
            .collect();
        posts.push(post("best", "Slack notifications", "Slack alerts channel", 0));
        posts.push(post("none", "Dark mode", "", 0));

        let related = related_posts(&feature, &posts, 0.2, 5);
        assert_eq!(related.len(), 5);
        assert_eq!(related[0].post.id, "best");
        assert!(related.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert!(related.iter().all(|r| r.post.id != "none"));
    }

    #[test]
    fn related_tickets_respect_threshold() {
        let feature = correlate(
            &[issue("1", "Slack notifications", None)],
            &[],
            &[],
            &Settings::default(),
        )
        .remove(0);
        let tickets = vec![
            ticket(1, "Slack notifications missing", ""),
            ticket(2, "Password reset", ""),
        ];
        let related = related_tickets(&feature, &tickets, 0.2, 5);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].ticket.id, 1);
    }
}

//! Write computed priorities back to Linear.
//!
//! Each item is independent: a failed update is reported in its result and
//! the remaining items are still attempted.

use serde::{Deserialize, Serialize};

use crate::sources::IssueSink;
use crate::types::ScoredFeature;

/// Linear priority for a final score: 1 urgent, 2 high, 3 medium, 4 low.
pub fn priority_for_score(final_score: f64) -> u8 {
    if final_score >= 8.0 {
        1
    } else if final_score >= 6.0 {
        2
    } else if final_score >= 4.0 {
        3
    } else {
        4
    }
}

fn priority_label(priority: u8) -> &'static str {
    match priority {
        1 => "Urgent",
        2 => "High",
        3 => "Medium",
        _ => "Low",
    }
}

const COMMENT_TOP_ROWS: usize = 3;

/// Markdown summary of a score for the issue's comment thread.
pub fn build_comment(feature: &ScoredFeature) -> String {
    let priority = priority_for_score(feature.final_score);
    let mut body = format!(
        "**Priority score: {:.2}/10** ({} priority, {} framework)\n",
        feature.final_score,
        priority_label(priority),
        feature.framework.as_str()
    );

    if feature.raw_final_score > feature.final_score {
        body.push_str(&format!(
            "\nUncapped score {:.2} (base {:.2} x tier multiplier {:.2}).\n",
            feature.raw_final_score, feature.base_score, feature.multiplier
        ));
    }

    let mut rows: Vec<_> = feature.breakdown.iter().collect();
    rows.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    if !rows.is_empty() {
        body.push_str("\nTop factors:\n");
        for row in rows.into_iter().take(COMMENT_TOP_ROWS) {
            body.push_str(&format!(
                "- {}: {:.1} (weight {:.2}, +{:.2})\n",
                row.factor.label(),
                row.score,
                row.weight,
                row.contribution
            ));
        }
    }

    body
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Also set sort order to the feature's 1-based rank.
    #[serde(default)]
    pub set_sort_order: bool,
    #[serde(default)]
    pub add_comment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItemResult {
    pub feature_id: String,
    pub identifier: String,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<f64>,
    /// Whether the priority was written.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the priority was written but the comment was not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_error: Option<String>,
}

/// Push priorities for `features`, which must already be in ranked order.
pub async fn sync_priorities(
    sink: &dyn IssueSink,
    features: &[ScoredFeature],
    options: SyncOptions,
) -> Vec<SyncItemResult> {
    let mut results = Vec::with_capacity(features.len());

    for (rank, scored) in features.iter().enumerate() {
        let priority = priority_for_score(scored.final_score);
        let sort_order = options.set_sort_order.then_some((rank + 1) as f64);

        let outcome = sink
            .update_priority(&scored.feature.id, priority, sort_order)
            .await;

        let mut comment_error = None;
        match &outcome {
            Err(e) => log::warn!(
                "Linear sync: failed to update {}: {}",
                scored.feature.identifier,
                e
            ),
            Ok(()) if options.add_comment => {
                let body = build_comment(scored);
                if let Err(e) = sink.add_comment(&scored.feature.id, &body).await {
                    log::warn!(
                        "Linear sync: priority set but comment failed for {}: {}",
                        scored.feature.identifier,
                        e
                    );
                    comment_error = Some(e.to_string());
                }
            }
            Ok(()) => {}
        }

        results.push(SyncItemResult {
            feature_id: scored.feature.id.clone(),
            identifier: scored.feature.identifier.clone(),
            priority,
            sort_order,
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            comment_error,
        });
    }

    let ok = results.iter().filter(|r| r.success).count();
    log::info!("Linear sync: updated {}/{} issues", ok, results.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DashboardError, Result};
    use crate::types::{
        BreakdownRow, CustomerTier, Factor, FeatureRequest, FeatureSource, FeatureType, Product,
        ProductStage, ScoreFactors, ScoringFramework,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, u8, Option<f64>)>>,
        comments: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl IssueSink for RecordingSink {
        async fn update_priority(
            &self,
            issue_id: &str,
            priority: u8,
            sort_order: Option<f64>,
        ) -> Result<()> {
            self.calls
                .lock()
                .push((issue_id.to_string(), priority, sort_order));
            if issue_id == "bad" {
                return Err(DashboardError::RateLimited { service: "Linear" });
            }
            Ok(())
        }

        async fn add_comment(&self, issue_id: &str, body: &str) -> Result<()> {
            self.comments
                .lock()
                .push((issue_id.to_string(), body.to_string()));
            if issue_id == "mute" {
                return Err(DashboardError::Api {
                    service: "Linear",
                    status: 200,
                    message: "commentCreate reported failure".to_string(),
                });
            }
            Ok(())
        }
    }

    fn scored(id: &str, final_score: f64) -> ScoredFeature {
        let feature = FeatureRequest {
            id: id.to_string(),
            identifier: format!("ENG-{}", id),
            title: "t".to_string(),
            description: String::new(),
            labels: Vec::new(),
            comments: Vec::new(),
            url: String::new(),
            product: Product::Platform,
            customer_tier: CustomerTier::Business,
            feature_type: FeatureType::Feature,
            source: FeatureSource::Internal,
            project_id: None,
            project_name: None,
            featurebase_url: None,
            featurebase_post_id: None,
            featurebase_upvotes: 0,
            match_confidence: None,
            support_ticket_count: 0,
            is_duplicate: false,
            duplicate_of: None,
            duplicates: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ScoredFeature {
            feature,
            scores: ScoreFactors::default(),
            base_score: final_score,
            multiplier: 1.0,
            raw_final_score: final_score,
            final_score,
            breakdown: vec![
                BreakdownRow {
                    factor: Factor::Effort,
                    weight: 0.1,
                    score: 2.0,
                    contribution: 0.8,
                },
                BreakdownRow {
                    factor: Factor::RevenueImpact,
                    weight: 0.25,
                    score: 8.0,
                    contribution: 2.0,
                },
            ],
            flags: Vec::new(),
            framework: ScoringFramework::Weighted,
            stage: ProductStage::Mature,
        }
    }

    #[test]
    fn priority_boundaries() {
        assert_eq!(priority_for_score(10.0), 1);
        assert_eq!(priority_for_score(8.0), 1);
        assert_eq!(priority_for_score(7.99), 2);
        assert_eq!(priority_for_score(6.0), 2);
        assert_eq!(priority_for_score(4.0), 3);
        assert_eq!(priority_for_score(3.99), 4);
        assert_eq!(priority_for_score(0.0), 4);
    }

    #[test]
    fn comment_lists_top_factors_by_contribution() {
        let body = build_comment(&scored("1", 6.5));
        assert!(body.contains("6.50/10"));
        assert!(body.contains("High priority"));
        let revenue = body.find("Revenue impact").unwrap();
        let effort = body.find("Effort").unwrap();
        assert!(revenue < effort);
        assert!(!body.contains("Uncapped"));
    }

    #[test]
    fn comment_explains_cap() {
        let mut s = scored("1", 10.0);
        s.raw_final_score = 12.4;
        assert!(build_comment(&s).contains("Uncapped score 12.40"));
    }

    #[tokio::test]
    async fn sync_reports_each_item_and_continues_after_failure() {
        let sink = RecordingSink::default();
        let features = vec![scored("a", 8.5), scored("bad", 5.0), scored("c", 2.0)];
        let options = SyncOptions {
            set_sort_order: true,
            add_comment: false,
        };

        let results = sync_priorities(&sink, &features, options).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert_eq!(results[0].priority, 1);
        assert_eq!(results[0].sort_order, Some(1.0));
        assert!(!results[1].success);
        assert!(results[1].error.is_some());
        assert!(results[2].success);
        assert_eq!(results[2].priority, 4);
        assert_eq!(results[2].sort_order, Some(3.0));

        assert_eq!(sink.calls.lock().len(), 3);
        assert!(sink.comments.lock().is_empty());
    }

    #[tokio::test]
    async fn sync_sends_comment_when_asked() {
        let sink = RecordingSink::default();
        let options = SyncOptions {
            set_sort_order: false,
            add_comment: true,
        };
        sync_priorities(&sink, &[scored("a", 4.2)], options).await;

        assert_eq!(sink.calls.lock()[0].2, None);
        let comments = sink.comments.lock();
        assert_eq!(comments[0].0, "a");
        assert!(comments[0].1.contains("Medium priority"));
    }

    #[tokio::test]
    async fn comment_failure_keeps_priority_success() {
        let sink = RecordingSink::default();
        let options = SyncOptions {
            set_sort_order: false,
            add_comment: true,
        };
        let features = vec![scored("mute", 9.0), scored("bad", 9.0)];
        let results = sync_priorities(&sink, &features, options).await;

        assert!(results[0].success);
        assert!(results[0].error.is_none());
        assert!(results[0]
            .comment_error
            .as_deref()
            .is_some_and(|e| e.contains("commentCreate")));

        // No comment is attempted when the priority write fails.
        assert!(!results[1].success);
        assert!(results[1].comment_error.is_none());
        assert_eq!(sink.comments.lock().len(), 1);
    }
}

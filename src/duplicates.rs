//! Near-duplicate detection within a product line.
//!
//! Two phases: `find_duplicates` computes the relationship map without
//! touching the features; `apply_duplicates` writes it back. Traversal is
//! oldest-first so the earliest request is always the canonical one.
//!
//! Pairwise comparison is O(n²) in similarity computations. Fine for the few
//! hundred backlog items a board carries; revisit with keyword bucketing if
//! boards grow into the tens of thousands.

use std::collections::{BTreeMap, HashSet};

use crate::text::{extract_keywords, similarity};
use crate::types::FeatureRequest;

/// Canonical feature id -> ids of its duplicates, in discovery order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DuplicateMap {
    pub originals: BTreeMap<String, Vec<String>>,
}

impl DuplicateMap {
    pub fn original_of(&self, id: &str) -> Option<&str> {
        self.originals
            .iter()
            .find(|(_, dups)| dups.iter().any(|d| d == id))
            .map(|(orig, _)| orig.as_str())
    }

    pub fn duplicate_count(&self) -> usize {
        self.originals.values().map(Vec::len).sum()
    }
}

/// Compute duplicate relationships. Does not mutate `features`.
pub fn find_duplicates(features: &[FeatureRequest], threshold: f64) -> DuplicateMap {
    let mut order: Vec<usize> = (0..features.len()).collect();
    // Stable, so equal timestamps keep input order.
    order.sort_by_key(|&i| features[i].created_at);

    let keywords: Vec<HashSet<String>> = features
        .iter()
        .map(|f| extract_keywords(&f.search_text()))
        .collect();

    let mut marked = vec![false; features.len()];
    let mut map = DuplicateMap::default();

    for (pos, &i) in order.iter().enumerate() {
        if marked[i] || keywords[i].is_empty() {
            continue;
        }

        for &j in &order[pos + 1..] {
            if marked[j] || features[j].product != features[i].product {
                continue;
            }

            if similarity(&keywords[i], &keywords[j]) >= threshold {
                marked[j] = true;
                map.originals
                    .entry(features[i].id.clone())
                    .or_default()
                    .push(features[j].id.clone());
            }
        }
    }

    map
}

/// Write duplicate metadata onto the features, resetting any previous marks.
pub fn apply_duplicates(features: &mut [FeatureRequest], map: &DuplicateMap) {
    for feature in features.iter_mut() {
        feature.is_duplicate = false;
        feature.duplicate_of = None;
        feature.duplicates.clear();
    }

    for (original, dups) in &map.originals {
        for feature in features.iter_mut() {
            if &feature.id == original {
                feature.duplicates = dups.clone();
            } else if dups.contains(&feature.id) {
                feature.is_duplicate = true;
                feature.duplicate_of = Some(original.clone());
            }
        }
    }
}

/// Find and apply in one call. Returns the number of features marked duplicate.
pub fn detect_duplicates(features: &mut [FeatureRequest], threshold: f64) -> usize {
    let map = find_duplicates(features, threshold);
    apply_duplicates(features, &map);

    let count = map.duplicate_count();
    if count > 0 {
        log::info!(
            "Duplicates: marked {} duplicates across {} originals",
            count,
            map.originals.len()
        );
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerTier, FeatureSource, FeatureType, Product};
    use chrono::{TimeZone, Utc};

    fn feature(id: &str, title: &str, description: &str, day: u32, product: Product) -> FeatureRequest {
        let created = Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap();
        FeatureRequest {
            id: id.to_string(),
            identifier: id.to_uppercase(),
            title: title.to_string(),
            description: description.to_string(),
            labels: Vec::new(),
            comments: Vec::new(),
            url: String::new(),
            product,
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
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn later_sso_request_is_duplicate_of_earlier() {
        // Keywords: {sso, login, saml, okta} vs {saml, based, sso, login, okta} = 0.8
        let mut features = vec![
            feature("late", "Support SAML-based SSO", "SSO login with Okta", 10, Product::Platform),
            feature("early", "Add SSO login support", "SAML SSO with Okta", 2, Product::Platform),
        ];

        let marked = detect_duplicates(&mut features, 0.6);
        assert_eq!(marked, 1);

        // Output order is untouched.
        assert_eq!(features[0].id, "late");
        assert!(features[0].is_duplicate);
        assert_eq!(features[0].duplicate_of.as_deref(), Some("early"));
        assert!(features[0].duplicates.is_empty());

        assert!(!features[1].is_duplicate);
        assert!(features[1].duplicate_of.is_none());
        assert_eq!(features[1].duplicates, vec!["late".to_string()]);
    }

    #[test]
    fn cross_product_features_are_never_duplicates() {
        let mut features = vec![
            feature("a", "Offline mode", "Work offline sync", 1, Product::Platform),
            feature("b", "Offline mode", "Work offline sync", 2, Product::Mobile),
        ];
        assert_eq!(detect_duplicates(&mut features, 0.6), 0);
        assert!(features.iter().all(|f| !f.is_duplicate));
    }

    #[test]
    fn below_threshold_is_not_duplicate() {
        let mut features = vec![
            feature("a", "Audit log export", "", 1, Product::Platform),
            feature("b", "Audit log retention", "", 2, Product::Platform),
        ];
        // {audit, log, export} vs {audit, log, retention} = 0.5
        assert_eq!(detect_duplicates(&mut features, 0.6), 0);
    }

    #[test]
    fn features_without_keywords_are_skipped() {
        let mut features = vec![
            feature("a", "Add it", "", 1, Product::Platform),
            feature("b", "Add it", "", 2, Product::Platform),
        ];
        assert_eq!(detect_duplicates(&mut features, 0.6), 0);
    }

    #[test]
    fn duplicates_never_become_originals() {
        let mut features = vec![
            feature("a", "Webhook retries", "retry failed webhook delivery", 1, Product::Integrations),
            feature("b", "Webhook retries", "retry failed webhook delivery", 2, Product::Integrations),
            feature("c", "Webhook retries", "retry failed webhook delivery", 3, Product::Integrations),
        ];

        let map = find_duplicates(&features, 0.6);
        assert_eq!(map.originals.len(), 1);
        assert_eq!(map.originals["a"], vec!["b".to_string(), "c".to_string()]);

        apply_duplicates(&mut features, &map);
        for f in &features {
            // Never both a duplicate and a canonical target.
            assert!(!(f.is_duplicate && !f.duplicates.is_empty()));
        }
        assert_eq!(features[2].duplicate_of.as_deref(), Some("a"));
        assert_eq!(map.original_of("c"), Some("a"));
    }

    #[test]
    fn find_is_pure() {
        let features = vec![
            feature("a", "Webhook retries", "", 1, Product::Platform),
            feature("b", "Webhook retries", "", 2, Product::Platform),
        ];
        let before = features.clone();
        let _ = find_duplicates(&features, 0.6);
        assert_eq!(features, before);
    }

    #[test]
    fn apply_resets_stale_marks() {
        let mut features = vec![
            feature("a", "Webhook retries", "", 1, Product::Platform),
            feature("b", "Dark mode", "", 2, Product::Platform),
        ];
        features[1].is_duplicate = true;
        features[1].duplicate_of = Some("a".to_string());
        features[0].duplicates = vec!["b".to_string()];

        detect_duplicates(&mut features, 0.6);
        assert!(!features[1].is_duplicate);
        assert!(features[0].duplicates.is_empty());
    }
}

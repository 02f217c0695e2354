//! Text normalization, keyword extraction and set similarity.
//!
//! Everything the correlator and duplicate detector compare goes through
//! `extract_keywords` first; similarity is a plain Jaccard index over the
//! resulting sets.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// English function words plus filler that shows up in nearly every request.
const STOPWORDS: &[&str] = &[
    "a", "about", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "do", "does", "for", "from", "get", "has", "have", "how", "if", "in",
    "into", "is", "it", "its", "just", "more", "not", "now", "of", "on", "or", "our", "should",
    "so", "some", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "use", "using", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "why", "will", "with", "would", "you",
    "your",
    // Domain filler
    "feature", "features", "request", "requests", "requested", "add", "adding", "support",
    "supported", "need", "needs", "please", "like", "want", "wants", "able", "allow",
    "allows", "option", "ability", "new", "make", "issue",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Lowercase, strip diacritics, collapse every run of punctuation/whitespace to
/// a single space, and trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// Normalized tokens with stopwords and tokens of length <= 2 removed.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    let stop = stopwords();
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .filter(|t| !stop.contains(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard index `|A ∩ B| / |A ∪ B|`; 0 when either side is empty.
pub fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}

/// Convenience for comparing two raw strings.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    similarity(&extract_keywords(a), &extract_keywords(b))
}

/// Drop HTML tags and decode the handful of entities Featurebase emits.
pub fn strip_html(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

    tag.replace_all(html, " ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn normalize_collapses_punctuation() {
        assert_eq!(normalize("  SSO -- Login!!  (SAML)  "), "sso login saml");
        assert_eq!(normalize("Café / Résumé"), "cafe resume");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!"), "");
    }

    #[test]
    fn keywords_drop_stopwords_and_short_tokens() {
        let keywords = extract_keywords("Please add support for SSO login in the UI");
        assert_eq!(keywords, kw(&["sso", "login"]));
    }

    #[test]
    fn keywords_empty_input() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("a an the to").is_empty());
    }

    #[test]
    fn similarity_identity_and_symmetry() {
        let a = kw(&["sso", "login", "saml"]);
        let b = kw(&["sso", "okta"]);
        assert_eq!(similarity(&a, &a), 1.0);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
        assert!((similarity(&a, &b) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn similarity_with_empty_set_is_zero() {
        let a = kw(&["sso"]);
        let empty = HashSet::new();
        assert_eq!(similarity(&a, &empty), 0.0);
        assert_eq!(similarity(&empty, &a), 0.0);
        assert_eq!(similarity(&empty, &empty), 0.0);
    }

    #[test]
    fn duplicate_tokens_do_not_add_weight() {
        assert_eq!(
            text_similarity("export export export csv", "export csv"),
            1.0
        );
    }

    #[test]
    fn strip_html_removes_tags() {
        let text = strip_html("<p>Dark&nbsp;mode <b>please</b></p>");
        assert_eq!(normalize(&text), "dark mode please");
    }
}

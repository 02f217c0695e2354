//! Prompt construction and response parsing for factor scoring.
//!
//! The prompt asks for a JSON object. Models do not always comply, so parsing
//! tries JSON first (fenced, bare, or embedded in prose), then falls back to
//! scanning `factor: score` lines, and finally returns the raw text as the
//! summary with no suggestions.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{AiSuggestion, ScoringRequest};
use crate::types::{Factor, ProductStage, ScoringFramework};

const MAX_DESCRIPTION_CHARS: usize = 4000;
const MAX_COMMENTS_IN_PROMPT: usize = 5;

/// Suggestions and summary recovered from a model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScores {
    pub suggestions: Vec<AiSuggestion>,
    pub summary: String,
}

/// Fence untrusted text so instructions inside it are treated as data.
fn wrap_user_data(text: &str) -> String {
    format!("<user_data>\n{}\n</user_data>", text.trim())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

fn factor_description(factor: Factor) -> &'static str {
    match factor {
        Factor::RevenueImpact => "How much revenue this unlocks or protects.",
        Factor::EnterpriseReadiness => "How much it matters for large-customer deals (security, compliance, admin).",
        Factor::RequestVolume => "How many customers are asking for it.",
        Factor::CompetitiveParity => "Whether competitors already offer it and we are behind.",
        Factor::StrategicAlignment => "Fit with the current product strategy.",
        Factor::Effort => "Engineering effort required (10 = very large).",
        Factor::CapabilityGap => "How big a hole in the product this fills.",
        Factor::CompetitiveDifferentiation => "How much it sets us apart from alternatives.",
    }
}

/// System message: configured persona plus optional company context.
pub fn build_system_prompt(request: &ScoringRequest<'_>) -> String {
    let mut system = request.prompt.system_prompt.trim().to_string();
    if !request.prompt.company_context.trim().is_empty() {
        system.push_str("\n\nCompany context:\n");
        system.push_str(request.prompt.company_context.trim());
    }
    system
}

/// User message describing one feature and the factors to score.
pub fn build_scoring_prompt(request: &ScoringRequest<'_>) -> String {
    let feature = request.feature;
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("## Feature request\n");
    prompt.push_str(&format!("Identifier: {}\n", feature.identifier));
    prompt.push_str(&format!("Product: {}\n", feature.product));
    prompt.push_str(&format!("Customer tier: {}\n", feature.customer_tier.as_str()));
    if feature.featurebase_upvotes > 0 {
        prompt.push_str(&format!("Community upvotes: {}\n", feature.featurebase_upvotes));
    }
    if feature.support_ticket_count > 0 {
        prompt.push_str(&format!(
            "Related support tickets: {}\n",
            feature.support_ticket_count
        ));
    }
    if !feature.labels.is_empty() {
        prompt.push_str(&format!("Labels: {}\n", feature.labels.join(", ")));
    }

    let body = format!(
        "Title: {}\n\n{}",
        feature.title,
        truncate_chars(&feature.description, MAX_DESCRIPTION_CHARS)
    );
    prompt.push_str(&wrap_user_data(&body));
    prompt.push('\n');

    if !feature.comments.is_empty() {
        prompt.push_str("\n## Recent comments\n");
        let comments: Vec<String> = feature
            .comments
            .iter()
            .take(MAX_COMMENTS_IN_PROMPT)
            .map(|c| format!("- {}", truncate_chars(&c.body, 500)))
            .collect();
        prompt.push_str(&wrap_user_data(&comments.join("\n")));
        prompt.push('\n');
    }

    if request.prompt.include_related_context {
        if !request.related_posts.is_empty() {
            prompt.push_str("\n## Similar community posts\n");
            let posts: Vec<String> = request
                .related_posts
                .iter()
                .map(|r| format!("- {} ({} upvotes)", r.post.title, r.post.upvotes))
                .collect();
            prompt.push_str(&wrap_user_data(&posts.join("\n")));
            prompt.push('\n');
        }
        if !request.related_tickets.is_empty() {
            prompt.push_str("\n## Similar support tickets\n");
            let tickets: Vec<String> = request
                .related_tickets
                .iter()
                .map(|r| format!("- {}", r.ticket.subject))
                .collect();
            prompt.push_str(&wrap_user_data(&tickets.join("\n")));
            prompt.push('\n');
        }
    }

    prompt.push_str("\n## Factors\nScore each factor from 1 to 10.\n");
    for factor in request.stage.factors() {
        prompt.push_str(&format!(
            "- {} ({}): {}",
            factor.as_str(),
            factor.label(),
            factor_description(*factor)
        ));
        if let Some(guidance) = request.prompt.factor_guidance.get(factor) {
            prompt.push_str(&format!(" {}", guidance.trim()));
        }
        prompt.push('\n');
    }

    if request.framework == ScoringFramework::Rice {
        prompt.push_str(
            "\nScores feed a RICE calculation: requestVolume is reach, strategicAlignment is confidence.\n",
        );
    }

    prompt.push_str(
        "\nRespond with only a JSON object of this shape:\n\
         {\"suggestions\": [{\"factor\": \"<factor id>\", \"score\": <1-10>, \
         \"reasoning\": \"<one sentence>\", \"confidence\": <0.0-1.0>}], \
         \"summary\": \"<two sentences>\"}\n",
    );

    prompt
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a model reply into suggestions for the factors of `stage`.
pub fn parse_scoring_response(response: &str, stage: ProductStage) -> ParsedScores {
    if let Some(parsed) = try_parse_json_response(response, stage) {
        return parsed;
    }

    let suggestions = scan_factor_lines(response, stage);
    if !suggestions.is_empty() {
        log::debug!(
            "Scoring: JSON parse failed, recovered {} suggestions from text",
            suggestions.len()
        );
    } else {
        log::warn!("Scoring: response contained no recognisable scores");
    }

    ParsedScores {
        suggestions,
        summary: response.trim().to_string(),
    }
}

/// Locate a JSON object in a reply: fenced block, bare object, or the first
/// balanced `{...}` embedded in prose.
pub(crate) fn extract_json_from_response(response: &str) -> Option<&str> {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return Some(response[json_start..json_start + end].trim());
        }
    }
    if let Some(start) = response.find("```") {
        let after_fence = start + 3;
        if let Some(nl) = response[after_fence..].find('\n') {
            let json_start = after_fence + nl + 1;
            if let Some(end) = response[json_start..].find("```") {
                let candidate = response[json_start..json_start + end].trim();
                if candidate.starts_with('{') {
                    return Some(candidate);
                }
            }
        }
    }

    let trimmed = response.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let start = response.find('{')?;
    let candidate = &response[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in candidate.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn try_parse_json_response(response: &str, stage: ProductStage) -> Option<ParsedScores> {
    let json = extract_json_from_response(response)?;
    let value: Value = serde_json::from_str(json).ok()?;
    let obj = value.as_object()?;
    let allowed = stage.factors();

    let mut suggestions = Vec::new();

    // Preferred shape: {"suggestions": [{factor, score, reasoning, confidence}]}
    if let Some(items) = obj.get("suggestions").and_then(Value::as_array) {
        for item in items {
            let Some(factor) = item
                .get("factor")
                .and_then(Value::as_str)
                .and_then(Factor::parse_loose)
            else {
                continue;
            };
            let Some(score) = item.get("score").and_then(number_of) else {
                continue;
            };
            suggestions.push(AiSuggestion {
                factor,
                score: score.clamp(1.0, 10.0),
                reasoning: item
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                confidence: item
                    .get("confidence")
                    .and_then(number_of)
                    .map(|c| c.clamp(0.0, 1.0))
                    .unwrap_or(0.5),
            });
        }
    }

    // Flat shape: {"scores": {"revenueImpact": 7, ...}}
    if suggestions.is_empty() {
        if let Some(scores) = obj.get("scores").and_then(Value::as_object) {
            for (key, raw) in scores {
                if let (Some(factor), Some(score)) = (Factor::parse_loose(key), number_of(raw)) {
                    suggestions.push(AiSuggestion {
                        factor,
                        score: score.clamp(1.0, 10.0),
                        reasoning: String::new(),
                        confidence: 0.5,
                    });
                }
            }
        }
    }

    suggestions.retain(|s| allowed.contains(&s.factor));
    dedupe_by_factor(&mut suggestions);

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if suggestions.is_empty() && summary.is_empty() {
        return None;
    }
    Some(ParsedScores {
        suggestions,
        summary,
    })
}

fn factor_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s\-*#]*\**([A-Za-z][A-Za-z _]*?)\**\s*[:=]\s*\**(\d+(?:\.\d+)?)")
            .expect("static regex")
    })
}

/// Fallback: pick up lines like `Revenue impact: 7` or `- effort = 3/10`.
fn scan_factor_lines(response: &str, stage: ProductStage) -> Vec<AiSuggestion> {
    let allowed = stage.factors();
    let mut suggestions: Vec<AiSuggestion> = factor_line_regex()
        .captures_iter(response)
        .filter_map(|cap| {
            let factor = Factor::parse_loose(cap.get(1)?.as_str())?;
            let score: f64 = cap.get(2)?.as_str().parse().ok()?;
            allowed.contains(&factor).then(|| AiSuggestion {
                factor,
                score: score.clamp(1.0, 10.0),
                reasoning: String::new(),
                confidence: 0.5,
            })
        })
        .collect();
    dedupe_by_factor(&mut suggestions);
    suggestions
}

/// Keep the first suggestion per factor.
fn dedupe_by_factor(suggestions: &mut Vec<AiSuggestion>) {
    let mut seen = Vec::new();
    suggestions.retain(|s| {
        if seen.contains(&s.factor) {
            false
        } else {
            seen.push(s.factor);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let reply = "Here you go:\n```json\n{\"suggestions\": [\
            {\"factor\": \"revenueImpact\", \"score\": 8, \"reasoning\": \"big deals\", \"confidence\": 0.9},\
            {\"factor\": \"effort\", \"score\": \"4\"}\
        ], \"summary\": \"Worth doing.\"}\n```";
        let parsed = parse_scoring_response(reply, ProductStage::Mature);
        assert_eq!(parsed.suggestions.len(), 2);
        assert_eq!(parsed.suggestions[0].factor, Factor::RevenueImpact);
        assert_eq!(parsed.suggestions[0].score, 8.0);
        assert_eq!(parsed.suggestions[1].score, 4.0);
        assert_eq!(parsed.suggestions[1].confidence, 0.5);
        assert_eq!(parsed.summary, "Worth doing.");
    }

    #[test]
    fn parses_embedded_json_with_braces_in_strings() {
        let reply = r#"Sure. {"suggestions": [{"factor": "capability_gap", "score": 9, "reasoning": "fills {a} gap"}], "summary": "ok"} Thanks!"#;
        let parsed = parse_scoring_response(reply, ProductStage::New);
        assert_eq!(parsed.suggestions.len(), 1);
        assert_eq!(parsed.suggestions[0].factor, Factor::CapabilityGap);
        assert_eq!(parsed.suggestions[0].reasoning, "fills {a} gap");
    }

    #[test]
    fn drops_factors_outside_the_stage() {
        let reply = r#"{"scores": {"capabilityGap": 9, "revenueImpact": 6}}"#;
        let parsed = parse_scoring_response(reply, ProductStage::Mature);
        assert_eq!(parsed.suggestions.len(), 1);
        assert_eq!(parsed.suggestions[0].factor, Factor::RevenueImpact);
    }

    #[test]
    fn malformed_text_yields_partial_suggestions() {
        let reply = "My assessment:\n\
            - **Revenue impact**: 7\n\
            - Effort = 3/10\n\
            - Strategic alignment: high\n\
            Overall a solid candidate.";
        let parsed = parse_scoring_response(reply, ProductStage::Mature);
        let factors: Vec<Factor> = parsed.suggestions.iter().map(|s| s.factor).collect();
        assert_eq!(factors, vec![Factor::RevenueImpact, Factor::Effort]);
        assert_eq!(parsed.suggestions[1].score, 3.0);
        assert!(parsed.summary.contains("solid candidate"));
    }

    #[test]
    fn unrecognisable_text_becomes_summary() {
        let parsed = parse_scoring_response("I cannot score this.", ProductStage::Mature);
        assert!(parsed.suggestions.is_empty());
        assert_eq!(parsed.summary, "I cannot score this.");
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let reply = r#"{"suggestions": [{"factor": "effort", "score": 42}]}"#;
        let parsed = parse_scoring_response(reply, ProductStage::Mature);
        assert_eq!(parsed.suggestions[0].score, 10.0);
    }

    #[test]
    fn extract_json_handles_generic_fence() {
        let reply = "```\n{\"summary\": \"x\"}\n```";
        assert_eq!(extract_json_from_response(reply), Some("{\"summary\": \"x\"}"));
        assert_eq!(extract_json_from_response("no json here"), None);
    }
}

/// Model verdict schema and response extraction
///
/// The model is instructed to answer with a single JSON object, but real
/// responses arrive wrapped in code fences, prefixed with prose, or with
/// stray control characters. Extraction therefore runs layered strategies
/// over cleaned text instead of trusting the raw body.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

// ============================================================================
// REGEX PATTERNS (Compiled once at startup)
// ============================================================================

/// Markdown code fences, with or without a json language tag
static FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*").expect("Invalid fence pattern regex"));

/// ASCII control characters except tab, newline and carriage return
static CONTROL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("Invalid control character regex")
});

/// First brace-delimited span, shortest match
static JSON_OBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("Invalid JSON object pattern regex"));

// ============================================================================
// VERDICT SCHEMA
// ============================================================================

/// Structured verdict parsed from a model response
///
/// Every field is defaulted so a sparse object still deserializes; the
/// accessor methods apply the documented fallbacks and clamps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenVerdict {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub is_memecoin: bool,
    #[serde(default)]
    pub risk: f64,
    #[serde(default)]
    pub potential: f64,
    #[serde(default)]
    pub rationale: String,
}

impl TokenVerdict {
    /// Model risk on the 1-10 scale, defaulting an absent score to the
    /// midpoint 5
    pub fn risk_score(&self) -> f64 {
        let raw = if self.risk == 0.0 { 5.0 } else { self.risk };
        raw.clamp(1.0, 10.0)
    }

    /// Model upside on the 1-10 scale, defaulting an absent score to 1
    pub fn potential_score(&self) -> f64 {
        let raw = if self.potential == 0.0 { 1.0 } else { self.potential };
        raw.clamp(1.0, 10.0)
    }

    /// Symbol from the verdict, falling back to the queued symbol
    pub fn symbol_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.symbol.is_empty() {
            fallback
        } else {
            &self.symbol
        }
    }

    pub fn rationale_or_default(&self) -> String {
        if self.rationale.trim().is_empty() {
            "Analysis completed".to_string()
        } else {
            self.rationale.clone()
        }
    }
}

// ============================================================================
// RESPONSE CLEANUP AND EXTRACTION
// ============================================================================

/// Strip code fences and control characters, then trim
pub fn clean_response_text(raw: &str) -> String {
    let without_fences = FENCE_PATTERN.replace_all(raw, "");
    let sanitized = CONTROL_PATTERN.replace_all(&without_fences, " ");
    sanitized.trim().to_string()
}

/// Layered verdict extraction from cleaned response text
///
/// Strategy 1 parses the first brace-delimited span; nested objects make
/// the shortest match invalid JSON, which falls through to strategy 2
/// parsing the whole text. The chat-fallback strategy lives in the engine
/// because it needs another round trip.
pub fn extract_verdict(cleaned: &str) -> Option<TokenVerdict> {
    if let Some(m) = JSON_OBJECT_PATTERN.find(cleaned) {
        if let Ok(verdict) = serde_json::from_str::<TokenVerdict>(m.as_str()) {
            return Some(verdict);
        }
    }

    serde_json::from_str::<TokenVerdict>(cleaned).ok()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_strips_fences_and_control_characters() {
        let raw = "```json\n{\"symbol\": \"PUP\"}\n```";
        assert_eq!(clean_response_text(raw), "{\"symbol\": \"PUP\"}");

        let raw = "  {\"a\":\x01 1}\x00 ";
        assert_eq!(clean_response_text(raw), "{\"a\":  1}");
    }

    #[test]
    fn extracts_embedded_object_from_prose() {
        let cleaned = "Sure, here is my assessment: {\"is_memecoin\": true, \"risk\": 7} hope that helps";
        let verdict = extract_verdict(cleaned).unwrap();
        assert!(verdict.is_memecoin);
        assert_eq!(verdict.risk, 7.0);
    }

    #[test]
    fn nested_object_falls_through_to_whole_text_parse() {
        // Shortest brace match truncates the nested object, so the
        // whole-text strategy has to pick it up
        let cleaned = "{\"is_memecoin\": true, \"detail\": {\"x\": 1}, \"risk\": 3}";
        let verdict = extract_verdict(cleaned).unwrap();
        assert!(verdict.is_memecoin);
        assert_eq!(verdict.risk, 3.0);
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert!(extract_verdict("the model rambled with no json at all").is_none());
        assert!(extract_verdict("{not valid json}").is_none());
    }

    #[test]
    fn scores_clamp_and_default() {
        let verdict = TokenVerdict::default();
        assert_eq!(verdict.risk_score(), 5.0);
        assert_eq!(verdict.potential_score(), 1.0);

        let verdict = TokenVerdict {
            risk: 42.0,
            potential: -3.0,
            ..Default::default()
        };
        assert_eq!(verdict.risk_score(), 10.0);
        assert_eq!(verdict.potential_score(), 1.0);
    }

    #[test]
    fn symbol_and_rationale_fallbacks() {
        let verdict = TokenVerdict::default();
        assert_eq!(verdict.symbol_or("PUP"), "PUP");
        assert_eq!(verdict.rationale_or_default(), "Analysis completed");

        let verdict = TokenVerdict {
            symbol: "DOGE".to_string(),
            rationale: "Strong social traction".to_string(),
            ..Default::default()
        };
        assert_eq!(verdict.symbol_or("PUP"), "DOGE");
        assert_eq!(verdict.rationale_or_default(), "Strong social traction");
    }
}

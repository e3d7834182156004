//! Defensive extraction of structured data from model output.
//!
//! The remote classifier is asked for a small JSON object but is never
//! trusted to produce one. Every consumer goes through the same fallback
//! chain: direct parse → markdown-fence strip → outermost-brace extraction
//! → per-key regex scan of the raw text. Callers decide what a total parse
//! failure means for them (the spam classifier fails closed, the others
//! revert to their heuristic result).

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// Strip markdown code fences from a response.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Extract the outermost `{ .. }` span, if any. Models often wrap the JSON
/// in prose ("Sure! Here is the classification: {...}").
pub fn extract_braced(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end > start {
        Some(&response[start..=end])
    } else {
        None
    }
}

/// Run the structured portion of the fallback chain. Returns None when no
/// candidate span deserializes; callers then drop to the per-key scanners.
pub fn parse_lenient<T: DeserializeOwned>(response: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(response) {
        return Some(value);
    }
    let stripped = strip_code_fences(response);
    if let Ok(value) = serde_json::from_str(stripped) {
        return Some(value);
    }
    if let Some(braced) = extract_braced(stripped) {
        if let Ok(value) = serde_json::from_str(braced) {
            return Some(value);
        }
    }
    None
}

static BOOL_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""?(?P<key>[A-Za-z_]+)"?\s*[:=]\s*(?P<val>true|false)"#).unwrap());
static NUM_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?(?P<key>[A-Za-z_]+)"?\s*[:=]\s*(?P<val>-?\d+(?:\.\d+)?)"#).unwrap()
});
static STR_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""?(?P<key>[A-Za-z_]+)"?\s*[:=]\s*"(?P<val>[^"]*)""#).unwrap());

/// Last-resort scan: find `key: true/false` anywhere in the raw text.
pub fn scan_bool_field(response: &str, key: &str) -> Option<bool> {
    for caps in BOOL_FIELD_RE.captures_iter(response) {
        if caps["key"].eq_ignore_ascii_case(key) {
            return Some(&caps["val"] == "true");
        }
    }
    None
}

/// Last-resort scan: find `key: <number>` anywhere in the raw text.
pub fn scan_f32_field(response: &str, key: &str) -> Option<f32> {
    for caps in NUM_FIELD_RE.captures_iter(response) {
        if caps["key"].eq_ignore_ascii_case(key) {
            return caps["val"].parse().ok();
        }
    }
    None
}

/// Last-resort scan: find `key: "value"` anywhere in the raw text.
pub fn scan_string_field(response: &str, key: &str) -> Option<String> {
    for caps in STR_FIELD_RE.captures_iter(response) {
        if caps["key"].eq_ignore_ascii_case(key) {
            return Some(caps["val"].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        is_spam: bool,
        confidence: f32,
    }

    #[test]
    fn test_direct_parse() {
        let v: Verdict = parse_lenient(r#"{"is_spam": true, "confidence": 0.9}"#).unwrap();
        assert!(v.is_spam);
    }

    #[test]
    fn test_fenced_parse() {
        let raw = "```json\n{\"is_spam\": false, \"confidence\": 0.2}\n```";
        let v: Verdict = parse_lenient(raw).unwrap();
        assert!(!v.is_spam);
    }

    #[test]
    fn test_prose_wrapped_parse() {
        let raw = r#"Here is my analysis: {"is_spam": true, "confidence": 0.8} and that's all."#;
        let v: Verdict = parse_lenient(raw).unwrap();
        assert!(v.is_spam);
        assert!((v.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert!(parse_lenient::<Verdict>("no json here at all").is_none());
    }

    #[test]
    fn test_scan_bool_field() {
        assert_eq!(scan_bool_field("blah is_spam: true blah", "is_spam"), Some(true));
        assert_eq!(scan_bool_field(r#""IS_SPAM"=false"#, "is_spam"), Some(false));
        assert_eq!(scan_bool_field("nothing relevant", "is_spam"), None);
    }

    #[test]
    fn test_scan_f32_field() {
        assert_eq!(scan_f32_field("confidence: 0.75 maybe", "confidence"), Some(0.75));
        assert_eq!(scan_f32_field("urgency_score: 1", "urgency_score"), Some(1.0));
    }

    #[test]
    fn test_scan_string_field() {
        assert_eq!(
            scan_string_field(r#"category: "water" etc"#, "category").as_deref(),
            Some("water")
        );
    }

    #[test]
    fn test_scan_does_not_match_wrong_key() {
        assert_eq!(scan_bool_field("is_nsfw: true", "is_spam"), None);
    }
}

//! Category and location extraction.
//!
//! Fast path is pure pattern matching against per-category keyword lists in
//! a fixed priority order, plus a curated location pattern match. The model
//! path is only used when the fast path is unsure, presents the valid
//! names as a closed set, and maps the answer back onto canonical slugs.

use std::sync::Arc;

use ai_client::{guard, parse, RemoteClassifier};
use anyhow::Result;
use reportline_common::{Category, Location};
use serde::Deserialize;
use tracing::{debug, warn};

/// Fallback slug when nothing matches. Must exist in the category table.
pub const DEFAULT_CATEGORY: &str = "infrastructure";

const CONFIDENCE_BOTH: f32 = 0.8;
const CONFIDENCE_CATEGORY_ONLY: f32 = 0.7;
const CONFIDENCE_NEITHER: f32 = 0.3;
const CONFIDENCE_MODEL: f32 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Slug of a known location, when one was recognized.
    pub location: Option<String>,
    /// Canonical category slug. Always set (falls back to infrastructure).
    pub category: String,
    pub confidence: f32,
}

/// Keyword patterns per category, checked in this order. Safety and medical
/// outrank utilities on purpose: "shock from the water cooler" is a safety
/// report, not a water report.
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "safety",
        &[
            "harass", "stalk", "theft", "stolen", "fight", "assault", "unsafe", "threat",
            "fire", "intruder", "suicide", "ragging",
        ],
    ),
    (
        "medical",
        &[
            "sick", "injur", "fever", "doctor", "ambulance", "unconscious", "bleeding",
            "fainted",
        ],
    ),
    (
        "water",
        &["water", "pani", "tap ", "leak", "pipeline", "drinking", "tanker"],
    ),
    (
        "electricity",
        &[
            "power", "electric", "light", "bijli", "fan ", "socket", "voltage", "short circuit",
        ],
    ),
    (
        "wifi",
        &["wifi", "wi-fi", "internet", "network", "lan ", "router"],
    ),
    (
        "sanitation",
        &[
            "toilet", "washroom", "bathroom", "garbage", "trash", "drain", "safai", "sewage",
            "smell",
        ],
    ),
    (
        "mess",
        &["mess", "food", "canteen", "khana", "meal"],
    ),
    (
        "academic",
        &["exam", "class", "professor", "lecture", "attendance", "grade", "syllabus"],
    ),
    (
        "infrastructure",
        &["road", "building", "lift", "elevator", "door", "window", "wall", "bench", "roof"],
    ),
];

fn match_category(text: &str, valid: &[Category]) -> Option<&'static str> {
    for (slug, patterns) in CATEGORY_PATTERNS {
        if !valid.iter().any(|c| c.slug == *slug) {
            continue;
        }
        if patterns.iter().any(|p| text.contains(p)) {
            return Some(slug);
        }
    }
    None
}

/// Match a known location in free text. Tries the display name, the slug
/// with separators relaxed, and the raw slug.
fn match_location(text: &str, known: &[Location]) -> Option<String> {
    for location in known {
        let display = location.display_name.to_lowercase();
        let relaxed = location.slug.replace('-', " ");
        if text.contains(&display) || text.contains(&relaxed) || text.contains(&location.slug) {
            return Some(location.slug.clone());
        }
    }
    None
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You classify incident reports for a campus issue tracker. Pick the single best category and, if one is clearly mentioned, the location.

You MUST pick from the provided lists only. Never invent a category or location. Reports may be multilingual or code-mixed; classify by meaning.

Respond with ONLY a JSON object, no prose, exactly this shape:
{"category": "<category name from the list>", "location": "<location name from the list, or null>", "confidence": <0.0-1.0>}"#;

#[derive(Debug, Deserialize)]
struct WireExtraction {
    category: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default = "default_model_confidence")]
    confidence: f32,
}

fn default_model_confidence() -> f32 {
    CONFIDENCE_MODEL
}

pub struct CategoryExtractor {
    remote: Option<Arc<dyn RemoteClassifier>>,
}

impl CategoryExtractor {
    pub fn new(remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self { remote }
    }

    /// Pattern-matching fast path.
    pub fn fast(
        &self,
        title: &str,
        description: &str,
        categories: &[Category],
        locations: &[Location],
    ) -> ExtractionResult {
        let text = format!("{} {}", title, description).to_lowercase();

        let category = match_category(&text, categories);
        let location = match_location(&text, locations);

        let confidence = match (category, &location) {
            (Some(_), Some(_)) => CONFIDENCE_BOTH,
            (Some(_), None) => CONFIDENCE_CATEGORY_ONLY,
            (None, _) => CONFIDENCE_NEITHER,
        };

        ExtractionResult {
            location,
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            confidence,
        }
    }

    /// Model escalation. Presents valid names as a closed set; any failure
    /// reverts silently to the fast-path result.
    pub async fn escalate(
        &self,
        fast: ExtractionResult,
        title: &str,
        description: &str,
        categories: &[Category],
        locations: &[Location],
    ) -> Result<ExtractionResult> {
        let Some(remote) = &self.remote else {
            return Ok(fast);
        };

        let category_names: Vec<&str> =
            categories.iter().map(|c| c.display_name.as_str()).collect();
        let location_names: Vec<&str> =
            locations.iter().map(|l| l.display_name.as_str()).collect();

        let user = format!(
            "Valid categories: {}\nValid locations: {}\n\n{}",
            category_names.join(", "),
            location_names.join(", "),
            guard::delimit_untrusted(title, description),
        );

        let text = match remote.complete(EXTRACTION_SYSTEM_PROMPT, &user).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "extraction escalation failed, keeping fast-path result");
                return Ok(fast);
            }
        };

        let wire = match parse::parse_lenient::<WireExtraction>(&text) {
            Some(wire) => wire,
            None => WireExtraction {
                category: parse::scan_string_field(&text, "category"),
                location: parse::scan_string_field(&text, "location"),
                confidence: CONFIDENCE_MODEL,
            },
        };

        let Some(raw_category) = wire.category else {
            debug!("extraction escalation unparseable, keeping fast-path result");
            return Ok(fast);
        };

        let category = match map_to_slug(&raw_category, categories) {
            Some(slug) => slug,
            None => {
                debug!(raw = %raw_category, "model category not in closed set, keeping fast-path result");
                return Ok(fast);
            }
        };

        let location = wire
            .location
            .as_deref()
            .filter(|l| !l.eq_ignore_ascii_case("null") && !l.is_empty())
            .and_then(|raw| map_location_to_slug(raw, locations))
            .or(fast.location);

        Ok(ExtractionResult {
            location,
            category,
            confidence: wire.confidence.clamp(0.0, 1.0),
        })
    }
}

/// Map free-form model output back to a canonical category slug: exact
/// display name, then exact slug, then substring either way.
fn map_to_slug(raw: &str, categories: &[Category]) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    for category in categories {
        if category.display_name.to_lowercase() == raw || category.slug == raw {
            return Some(category.slug.clone());
        }
    }
    for category in categories {
        let display = category.display_name.to_lowercase();
        if raw.contains(&display) || display.contains(&raw) || raw.contains(&category.slug) {
            return Some(category.slug.clone());
        }
    }
    None
}

fn map_location_to_slug(raw: &str, locations: &[Location]) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    for location in locations {
        if location.display_name.to_lowercase() == raw || location.slug == raw {
            return Some(location.slug.clone());
        }
    }
    for location in locations {
        let display = location.display_name.to_lowercase();
        if raw.contains(&display) || display.contains(&raw) {
            return Some(location.slug.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClassifier;
    use uuid::Uuid;

    fn categories() -> Vec<Category> {
        ["water", "electricity", "wifi", "sanitation", "safety", "medical", "mess", "academic", "infrastructure"]
            .iter()
            .map(|slug| Category {
                id: Uuid::new_v4(),
                slug: slug.to_string(),
                display_name: {
                    let mut chars = slug.chars();
                    let first = chars.next().unwrap().to_uppercase().to_string();
                    format!("{first}{}", chars.as_str())
                },
            })
            .collect()
    }

    fn locations() -> Vec<Location> {
        [("hostel-2", "Hostel 2"), ("block-a", "Block A"), ("library", "Library")]
            .iter()
            .map(|(slug, name)| Location {
                id: Uuid::new_v4(),
                slug: slug.to_string(),
                display_name: name.to_string(),
                location_type: reportline_common::LocationType::Hostel,
            })
            .collect()
    }

    #[test]
    fn water_report_with_location() {
        let ex = CategoryExtractor::new(None);
        let r = ex.fast(
            "No water supply",
            "Hostel 2 me pani nahi aa raha. Morning se.",
            &categories(),
            &locations(),
        );
        assert_eq!(r.category, "water");
        assert_eq!(r.location.as_deref(), Some("hostel-2"));
        assert!((r.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn category_without_location() {
        let ex = CategoryExtractor::new(None);
        let r = ex.fast("Wifi down", "internet not working since morning", &categories(), &[]);
        assert_eq!(r.category, "wifi");
        assert_eq!(r.location, None);
        assert!((r.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn unmatched_text_defaults_to_infrastructure() {
        let ex = CategoryExtractor::new(None);
        let r = ex.fast("something odd", "hard to describe", &categories(), &locations());
        assert_eq!(r.category, "infrastructure");
        assert!((r.confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn safety_outranks_water() {
        let ex = CategoryExtractor::new(None);
        let r = ex.fast(
            "Electric shock near water cooler",
            "someone got hurt, feels unsafe",
            &categories(),
            &locations(),
        );
        assert_eq!(r.category, "safety");
    }

    #[tokio::test]
    async fn escalation_maps_display_name_to_slug() {
        let remote = ScriptedClassifier::always(
            r#"{"category": "Sanitation", "location": "Block A", "confidence": 0.9}"#,
        );
        let ex = CategoryExtractor::new(Some(remote));
        let fast = ExtractionResult {
            location: None,
            category: DEFAULT_CATEGORY.to_string(),
            confidence: 0.3,
        };
        let r = ex
            .escalate(fast, "bad smell", "very bad smell near rooms", &categories(), &locations())
            .await
            .unwrap();
        assert_eq!(r.category, "sanitation");
        assert_eq!(r.location.as_deref(), Some("block-a"));
    }

    #[tokio::test]
    async fn escalation_failure_keeps_fast_result() {
        let ex = CategoryExtractor::new(Some(ScriptedClassifier::failing()));
        let fast = ExtractionResult {
            location: None,
            category: "water".to_string(),
            confidence: 0.7,
        };
        let r = ex
            .escalate(fast.clone(), "leak", "leaking pipe", &categories(), &locations())
            .await
            .unwrap();
        assert_eq!(r, fast);
    }

    #[tokio::test]
    async fn invented_category_is_rejected() {
        let remote = ScriptedClassifier::always(r#"{"category": "paranormal", "confidence": 0.99}"#);
        let ex = CategoryExtractor::new(Some(remote));
        let fast = ExtractionResult {
            location: None,
            category: DEFAULT_CATEGORY.to_string(),
            confidence: 0.3,
        };
        let r = ex
            .escalate(fast.clone(), "weird", "weird", &categories(), &locations())
            .await
            .unwrap();
        assert_eq!(r, fast);
    }
}

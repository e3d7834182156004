//! Urgency assessment.
//!
//! Keyword table with severity weights; the maximum matched weight wins.
//! A separate distress-keyword set drives the reporter-welfare flag.
//! Immediate action is a conjunctive condition (critical AND welfare) so
//! ordinary critical infrastructure failures don't page a counsellor.

use std::sync::Arc;

use ai_client::{guard, parse, RemoteClassifier};
use anyhow::Result;
use reportline_common::UrgencyLevel;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct UrgencyAssessment {
    pub score: f32,
    pub level: UrgencyLevel,
    pub reporter_welfare_flag: bool,
    pub requires_immediate_action: bool,
    /// Trust in this assessment: higher when a keyword matched or the
    /// model answered, lower for the silent default.
    pub confidence: f32,
}

/// Keyword → severity weight. Checked as substrings of the lowercased
/// combined text; the maximum matched weight is the score.
const URGENCY_KEYWORDS: &[(&str, f32)] = &[
    ("suicide", 1.0),
    ("kill myself", 1.0),
    ("end my life", 1.0),
    ("self harm", 0.95),
    ("gas leak", 0.95),
    ("unconscious", 0.95),
    ("fire", 0.9),
    ("assault", 0.9),
    ("electric shock", 0.9),
    ("bleeding", 0.85),
    ("harass", 0.8),
    ("no water", 0.75),
    ("no electricity", 0.75),
    ("power cut", 0.7),
    ("theft", 0.7),
    ("water supply", 0.7),
    ("overflowing", 0.6),
    ("broken", 0.55),
    ("not working", 0.55),
    ("slow", 0.4),
    ("request", 0.35),
    ("suggestion", 0.3),
];

/// Distress indicators for reporter welfare. Deliberately small: the flag
/// gates immediate-action escalation and must not over-trigger.
const WELFARE_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "self harm",
    "hurt myself",
    "hopeless",
    "can't go on",
    "want to die",
];

const DEFAULT_SCORE: f32 = 0.5;
const CONFIDENCE_KEYWORD: f32 = 0.75;
const CONFIDENCE_DEFAULT: f32 = 0.5;
const CONFIDENCE_MODEL: f32 = 0.8;

/// Map a 0–1 score onto a level. Bands chosen so the 0.7–0.75 outage
/// weights land on High and only genuine emergencies reach Critical.
pub fn score_to_level(score: f32) -> UrgencyLevel {
    if score >= 0.85 {
        UrgencyLevel::Critical
    } else if score >= 0.65 {
        UrgencyLevel::High
    } else if score >= 0.4 {
        UrgencyLevel::Medium
    } else {
        UrgencyLevel::Low
    }
}

fn assemble(score: f32, welfare: bool, confidence: f32) -> UrgencyAssessment {
    let level = score_to_level(score);
    UrgencyAssessment {
        score,
        level,
        reporter_welfare_flag: welfare,
        requires_immediate_action: level == UrgencyLevel::Critical && welfare,
        confidence,
    }
}

const URGENCY_SYSTEM_PROMPT: &str = r#"You assess the urgency of incident reports for a campus issue tracker.

Score 0.0-1.0: 1.0 = life-threatening emergency, 0.75 = essential service fully down, 0.5 = significant disruption, 0.3 = minor inconvenience or suggestion. Reports may be multilingual or code-mixed; assess by meaning.

Respond with ONLY a JSON object, no prose, exactly this shape:
{"urgency_score": <0.0-1.0>, "reporter_distress": <bool>}"#;

#[derive(Debug, Deserialize)]
struct WireUrgency {
    urgency_score: f32,
    #[serde(default)]
    reporter_distress: bool,
}

pub struct UrgencyAssessor {
    remote: Option<Arc<dyn RemoteClassifier>>,
}

impl UrgencyAssessor {
    pub fn new(remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self { remote }
    }

    /// Keyword fast path.
    pub fn fast(&self, title: &str, description: &str) -> UrgencyAssessment {
        let text = format!("{} {}", title, description).to_lowercase();

        let mut matched = None::<f32>;
        for (keyword, weight) in URGENCY_KEYWORDS {
            if text.contains(keyword) {
                matched = Some(matched.map_or(*weight, |m: f32| m.max(*weight)));
            }
        }

        let welfare = WELFARE_KEYWORDS.iter().any(|kw| text.contains(kw));

        match matched {
            Some(score) => assemble(score, welfare, CONFIDENCE_KEYWORD),
            None => assemble(DEFAULT_SCORE, welfare, CONFIDENCE_DEFAULT),
        }
    }

    /// Model escalation for low-scoring reports. The heuristic welfare flag
    /// is never lowered by the model (it may only be raised); any failure
    /// reverts to the fast-path result.
    pub async fn escalate(
        &self,
        fast: UrgencyAssessment,
        title: &str,
        description: &str,
    ) -> Result<UrgencyAssessment> {
        let Some(remote) = &self.remote else {
            return Ok(fast);
        };

        let user = guard::delimit_untrusted(title, description);
        let text = match remote.complete(URGENCY_SYSTEM_PROMPT, &user).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "urgency escalation failed, keeping fast-path result");
                return Ok(fast);
            }
        };

        let wire = match parse::parse_lenient::<WireUrgency>(&text) {
            Some(wire) => wire,
            None => match parse::scan_f32_field(&text, "urgency_score") {
                Some(score) => WireUrgency {
                    urgency_score: score,
                    reporter_distress: parse::scan_bool_field(&text, "reporter_distress")
                        .unwrap_or(false),
                },
                None => {
                    debug!("urgency escalation unparseable, keeping fast-path result");
                    return Ok(fast);
                }
            },
        };

        let score = wire.urgency_score.clamp(0.0, 1.0);
        let welfare = fast.reporter_welfare_flag || wire.reporter_distress;
        Ok(assemble(score, welfare, CONFIDENCE_MODEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClassifier;

    #[test]
    fn water_outage_scores_high() {
        let assessor = UrgencyAssessor::new(None);
        let a = assessor.fast("No water supply", "Hostel 2 me pani nahi aa raha. Morning se.");
        assert!(a.score >= 0.6);
        assert_eq!(a.level, UrgencyLevel::High);
        assert!(!a.reporter_welfare_flag);
        assert!(!a.requires_immediate_action);
    }

    #[test]
    fn max_weight_wins() {
        let assessor = UrgencyAssessor::new(None);
        // "broken" (0.55) and "fire" (0.9) both present.
        let a = assessor.fast("Fire near broken socket", "");
        assert!((a.score - 0.9).abs() < 1e-6);
        assert_eq!(a.level, UrgencyLevel::Critical);
        // Critical without distress: no immediate action.
        assert!(!a.requires_immediate_action);
    }

    #[test]
    fn suicide_with_distress_requires_immediate_action() {
        let assessor = UrgencyAssessor::new(None);
        let a = assessor.fast(
            "Please help",
            "I am feeling hopeless and thinking about suicide",
        );
        assert_eq!(a.level, UrgencyLevel::Critical);
        assert!(a.reporter_welfare_flag);
        assert!(a.requires_immediate_action);
    }

    #[test]
    fn no_keyword_defaults_to_medium() {
        let assessor = UrgencyAssessor::new(None);
        let a = assessor.fast("Paint peeling", "wall paint is peeling in the corridor");
        assert!((a.score - 0.5).abs() < 1e-6);
        assert_eq!(a.level, UrgencyLevel::Medium);
    }

    #[test]
    fn suggestion_is_low() {
        let assessor = UrgencyAssessor::new(None);
        let a = assessor.fast("Suggestion", "suggestion: more benches near the lawn");
        assert_eq!(a.level, UrgencyLevel::Low);
    }

    #[tokio::test]
    async fn escalation_takes_model_score() {
        let remote =
            ScriptedClassifier::always(r#"{"urgency_score": 0.72, "reporter_distress": false}"#);
        let assessor = UrgencyAssessor::new(Some(remote));
        let fast = assessor.fast("strange noise", "strange noise from the transformer at night");
        let a = assessor.escalate(fast, "strange noise", "...").await.unwrap();
        assert!((a.score - 0.72).abs() < 1e-6);
        assert_eq!(a.level, UrgencyLevel::High);
    }

    #[tokio::test]
    async fn escalation_never_lowers_welfare_flag() {
        let remote =
            ScriptedClassifier::always(r#"{"urgency_score": 0.9, "reporter_distress": false}"#);
        let assessor = UrgencyAssessor::new(Some(remote));
        let fast = UrgencyAssessment {
            score: 0.4,
            level: UrgencyLevel::Medium,
            reporter_welfare_flag: true,
            requires_immediate_action: false,
            confidence: 0.5,
        };
        let a = assessor.escalate(fast, "t", "d").await.unwrap();
        assert!(a.reporter_welfare_flag);
        assert!(a.requires_immediate_action);
    }

    #[tokio::test]
    async fn escalation_failure_keeps_fast_result() {
        let assessor = UrgencyAssessor::new(Some(ScriptedClassifier::failing()));
        let fast = assessor.fast("Paint peeling", "wall paint");
        let a = assessor.escalate(fast.clone(), "Paint peeling", "wall paint").await.unwrap();
        assert_eq!(a, fast);
    }
}

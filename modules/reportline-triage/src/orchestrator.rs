//! The triage orchestrator.
//!
//! Hot path for every submission: run the three leaf classifiers' fast
//! paths, then dispatch only the model escalations that are actually
//! needed, concurrently, so the whole phase costs one remote round trip
//! rather than three. Wrapped in three fallback tiers (normal run,
//! heuristics only, hardcoded neutral) so it never errors.

use std::sync::Arc;

use ai_client::RemoteClassifier;
use anyhow::{anyhow, Result};
use reportline_common::{
    Category, ImpactScope, Location, ReportType, UrgencyLevel, EXTRACTION_ESCALATION_THRESHOLD,
    URGENCY_ESCALATION_THRESHOLD,
};
use tracing::warn;

use crate::extractor::{CategoryExtractor, ExtractionResult, DEFAULT_CATEGORY};
use crate::spam::{SpamClassifier, SpamVerdict};
use crate::urgency::{UrgencyAssessment, UrgencyAssessor};

/// Categories whose issues degrade the physical environment. Drives the
/// environmental bonus in priority scoring.
const ENVIRONMENTAL_CATEGORIES: &[&str] = &["water", "electricity", "sanitation", "waste"];

/// Whether a category slug carries the environmental priority bonus.
pub fn is_environmental(category: &str) -> bool {
    ENVIRONMENTAL_CATEGORIES.contains(&category)
}

/// Everything the pipeline needs to persist as AutomationMetadata, plus
/// the extracted location and the deep-analysis signal for the caller.
#[derive(Debug, Clone)]
pub struct AutomationOutput {
    pub category: String,
    pub location: Option<String>,
    pub urgency_score: f32,
    pub impact_scope: ImpactScope,
    pub is_environmental: bool,
    pub confidence_score: f32,
    pub urgency_level: UrgencyLevel,
    pub report_type: ReportType,
    pub reporter_welfare_flag: bool,
    pub requires_immediate_action: bool,
    pub spam_confidence: f32,
    pub is_nsfw: bool,
    pub reasoning: String,
    /// Hint for the caller to schedule a slower holistic re-analysis out
    /// of band. Never acted on synchronously here.
    pub full_analysis_needed: bool,
}

pub struct TriageOrchestrator {
    spam: SpamClassifier,
    extractor: CategoryExtractor,
    urgency: UrgencyAssessor,
}

impl TriageOrchestrator {
    pub fn new(remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self {
            spam: SpamClassifier::new(remote.clone()),
            extractor: CategoryExtractor::new(remote.clone()),
            urgency: UrgencyAssessor::new(remote),
        }
    }

    /// Run triage. Never errors: degrades through heuristics-only and
    /// finally a hardcoded neutral result.
    pub async fn run(
        &self,
        title: &str,
        description: &str,
        categories: &[Category],
        locations: &[Location],
    ) -> AutomationOutput {
        match self.full_run(title, description, categories, locations).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "triage run failed, falling back to heuristics");
                match self.heuristic_run(title, description, categories, locations) {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(error = %e, "heuristic triage failed, returning neutral result");
                        neutral_output()
                    }
                }
            }
        }
    }

    /// Tier 1: fast phase, then only the needed escalations, concurrently.
    async fn full_run(
        &self,
        title: &str,
        description: &str,
        categories: &[Category],
        locations: &[Location],
    ) -> Result<AutomationOutput> {
        if categories.is_empty() {
            return Err(anyhow!("no categories available"));
        }

        // Fast phase: pure, synchronous, always runs.
        let spam_fast = self.spam.fast(title, description);
        let extraction_fast = self.extractor.fast(title, description, categories, locations);
        let urgency_fast = self.urgency.fast(title, description);

        // Escalation decisions. A rule-layer spam hit suppresses every
        // remote call, not just its own: spam short-circuits the model.
        let rules_flagged_spam = spam_fast.as_ref().is_some_and(|v| v.is_spam);
        let extraction_needed =
            extraction_fast.confidence < EXTRACTION_ESCALATION_THRESHOLD && !rules_flagged_spam;
        let urgency_needed =
            urgency_fast.score < URGENCY_ESCALATION_THRESHOLD && !rules_flagged_spam;

        // Escalation phase: one concurrent join over the needed calls.
        let spam_task = async {
            match &spam_fast {
                Some(verdict) => verdict.clone(),
                None => self.spam.escalate(title, description).await,
            }
        };
        let extraction_task = async {
            if extraction_needed {
                self.extractor
                    .escalate(extraction_fast.clone(), title, description, categories, locations)
                    .await
            } else {
                Ok(extraction_fast.clone())
            }
        };
        let urgency_task = async {
            if urgency_needed {
                self.urgency.escalate(urgency_fast.clone(), title, description).await
            } else {
                Ok(urgency_fast.clone())
            }
        };

        let (spam, extraction, urgency) = tokio::join!(spam_task, extraction_task, urgency_task);
        let extraction = extraction?;
        let urgency = urgency?;

        Ok(combine(spam, extraction, urgency, categories))
    }

    /// Tier 2: fast paths only, no remote calls at all.
    fn heuristic_run(
        &self,
        title: &str,
        description: &str,
        categories: &[Category],
        locations: &[Location],
    ) -> Result<AutomationOutput> {
        if categories.is_empty() {
            return Err(anyhow!("no categories available"));
        }
        let spam = self
            .spam
            .fast(title, description)
            .unwrap_or_else(|| SpamVerdict {
                is_spam: false,
                is_nsfw: false,
                confidence: 0.0,
                reason: "rules inconclusive (heuristic tier)".to_string(),
            });
        let extraction = self.extractor.fast(title, description, categories, locations);
        let urgency = self.urgency.fast(title, description);
        Ok(combine(spam, extraction, urgency, categories))
    }
}

fn combine(
    spam: SpamVerdict,
    extraction: ExtractionResult,
    urgency: UrgencyAssessment,
    categories: &[Category],
) -> AutomationOutput {
    // Normalize: whatever the extractor said, only a known slug survives.
    let category = if categories.iter().any(|c| c.slug == extraction.category) {
        extraction.category.clone()
    } else {
        DEFAULT_CATEGORY.to_string()
    };

    // One weak signal depresses overall trust.
    let confidence_score = spam
        .confidence
        .min(extraction.confidence)
        .min(urgency.confidence)
        .clamp(0.0, 1.0);

    let report_type = if spam.is_spam {
        ReportType::Spam
    } else if urgency.requires_immediate_action {
        ReportType::Emergency
    } else {
        ReportType::General
    };

    let full_analysis_needed = !spam.is_spam
        && !spam.is_nsfw
        && (extraction.confidence < 0.8 || urgency.score >= 0.7);

    let reasoning = format!(
        "spam: {} (conf {:.2}); category: {} (conf {:.2}); urgency: {:.2}/{}",
        spam.reason, spam.confidence, category, extraction.confidence, urgency.score, urgency.level,
    );
    let environmental = is_environmental(&category);

    AutomationOutput {
        category,
        location: extraction.location,
        urgency_score: urgency.score,
        // Multiplicity is resolved later by aggregation.
        impact_scope: ImpactScope::Single,
        is_environmental: environmental,
        confidence_score,
        urgency_level: urgency.level,
        report_type,
        reporter_welfare_flag: urgency.reporter_welfare_flag,
        requires_immediate_action: urgency.requires_immediate_action,
        spam_confidence: spam.confidence,
        is_nsfw: spam.is_nsfw,
        reasoning,
        full_analysis_needed,
    }
}

/// Tier 3: the hardcoded neutral result. Usable downstream, trusted by
/// nobody.
fn neutral_output() -> AutomationOutput {
    AutomationOutput {
        category: DEFAULT_CATEGORY.to_string(),
        location: None,
        urgency_score: 0.5,
        impact_scope: ImpactScope::Single,
        is_environmental: false,
        confidence_score: 0.1,
        urgency_level: UrgencyLevel::Medium,
        report_type: ReportType::General,
        reporter_welfare_flag: false,
        requires_immediate_action: false,
        spam_confidence: 0.0,
        is_nsfw: false,
        reasoning: "triage degraded: heuristics unavailable".to_string(),
        full_analysis_needed: false,
    }
}

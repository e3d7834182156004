//! The pipeline coordinator.
//!
//! Strictly sequential stages: triage → metadata → aggregation → frequency
//! → priority → routing. Aggregation must see the finalized triage output
//! and priority must see the finalized aggregation state, so there is no
//! concurrency here; the concurrency lives inside the triage orchestrator.
//!
//! Failure policy (see ReportlineError taxonomy): classifier problems never
//! reach this layer; snapshot/metric write failures are logged, typed, and
//! survived; metadata write failures and missing reference data are fatal
//! and produce a structured failure result with conservative field values.
//! The report row itself was durably written before the pipeline started,
//! so a fatal result degrades triage, never loses the submission.

use std::sync::Arc;

use ai_client::RemoteClassifier;
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use reportline_common::{
    AutomationMetadata, ImpactScope, LocationType, PriorityBreakdown, PrioritySnapshot,
    ReportlineError, ReportType, UrgencyLevel,
};
use reportline_triage::{is_environmental, AutomationOutput, TriageOrchestrator};

use crate::aggregation::AggregationEngine;
use crate::frequency::FrequencyTracker;
use crate::priority::{self, PriorityInputs};
use crate::routing::{resolve_authority, RoutingDecision};
use crate::store::{TriageStore, WriteOutcome};

/// One pipeline invocation, as handed over by the submission flow.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub report_id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

/// Streamed to the caller during processing. Percentages only ever grow.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub percent: u8,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    pub report_id: Uuid,
    pub aggregated_issue_id: Option<Uuid>,
    pub is_new_issue: bool,
    pub metadata: AutomationMetadata,
    pub total_reports: u32,
    pub reports_last_30_min: u32,
    pub priority: Option<PriorityBreakdown>,
    pub routing: Option<RoutingDecision>,
    pub frequency_write: WriteOutcome,
    pub snapshot_write: WriteOutcome,
    pub error: Option<String>,
}

pub struct PipelineCoordinator {
    store: Arc<dyn TriageStore>,
    orchestrator: TriageOrchestrator,
    aggregation: AggregationEngine,
    frequency: FrequencyTracker,
}

impl PipelineCoordinator {
    pub fn new(store: Arc<dyn TriageStore>, remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self {
            orchestrator: TriageOrchestrator::new(remote),
            aggregation: AggregationEngine::new(store.clone()),
            frequency: FrequencyTracker::new(store.clone()),
            store,
        }
    }

    /// Run the full pipeline for one submitted report. Never returns an
    /// error: fatal conditions come back as a failure-shaped result.
    pub async fn process(
        &self,
        request: SubmissionRequest,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> PipelineResult {
        emit(&progress, "reference", 5, "loading reference data", None);

        // --- Reference data (fatal when missing) ---
        // The report row is written by the submission collaborator before
        // the pipeline runs; its absence means we cannot proceed.
        match self.store.get_report(request.report_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let error = ReportlineError::MissingReference("report not found in store".into());
                return self.fail(&request, error, None, &progress).await;
            }
            Err(e) => {
                let error = ReportlineError::Store(format!("report read failed: {e}"));
                return self.fail(&request, error, None, &progress).await;
            }
        }
        let categories = match self.store.list_categories().await {
            Ok(categories) if !categories.is_empty() => categories,
            Ok(_) => {
                let error = ReportlineError::MissingReference("no categories configured".into());
                return self.fail(&request, error, None, &progress).await;
            }
            Err(e) => {
                let error = ReportlineError::Store(format!("category read failed: {e}"));
                return self.fail(&request, error, None, &progress).await;
            }
        };
        let locations = match self.store.list_locations().await {
            Ok(locations) => locations,
            Err(e) => {
                let error = ReportlineError::Store(format!("location read failed: {e}"));
                return self.fail(&request, error, None, &progress).await;
            }
        };

        // --- Triage (never fails; degrades internally) ---
        emit(&progress, "triage", 20, "classifying report", None);
        let output = self
            .orchestrator
            .run(&request.title, &request.description, &categories, &locations)
            .await;
        emit(
            &progress,
            "triage",
            35,
            "classification complete",
            Some(json!({
                "category": output.category,
                "urgency_level": output.urgency_level,
                "report_type": output.report_type,
            })),
        );

        // --- Metadata persistence (fatal on failure) ---
        let mut metadata = to_metadata(request.report_id, &output);
        // A reporter-chosen category outranks extraction, same as location.
        if let Some(chosen) = request
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
        {
            metadata.category = chosen.slug.clone();
            metadata.is_environmental = is_environmental(&chosen.slug);
        }
        if let Err(e) = self.store.upsert_metadata(&metadata).await {
            error!(report_id = %request.report_id, error = %e, "metadata upsert failed");
            let error = ReportlineError::Store(format!("metadata write failed: {e}"));
            return self.fail(&request, error, None, &progress).await;
        }

        // --- Spam short-circuit: no canonical issue for junk ---
        if metadata.report_type == ReportType::Spam {
            info!(report_id = %request.report_id, "report flagged as spam, short-circuiting");
            emit(&progress, "done", 100, "report flagged as spam", None);
            return PipelineResult {
                success: true,
                report_id: request.report_id,
                aggregated_issue_id: None,
                is_new_issue: false,
                metadata,
                total_reports: 0,
                reports_last_30_min: 0,
                priority: None,
                routing: None,
                frequency_write: WriteOutcome::Skipped("spam short-circuit".into()),
                snapshot_write: WriteOutcome::Skipped("spam short-circuit".into()),
                error: None,
            };
        }

        // --- Aggregation (fatal on failure: the edge is a critical record) ---
        emit(&progress, "aggregation", 55, "finding canonical issue", None);
        let location_id = request.location_id.or_else(|| {
            output
                .location
                .as_ref()
                .and_then(|slug| locations.iter().find(|l| &l.slug == slug))
                .map(|l| l.id)
        });
        let aggregation = match self
            .aggregation
            .find_or_link(request.report_id, &metadata.category, location_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Triage output is already durable; the failure result must
                // carry it, not clobber it.
                let error = ReportlineError::Anyhow(e.context("aggregation failed"));
                return self.fail(&request, error, Some(metadata), &progress).await;
            }
        };
        let issue_id = aggregation.aggregated_issue_id;

        // --- Frequency (non-fatal) ---
        emit(&progress, "frequency", 70, "computing report velocity", None);
        let (reports_last_30_min, frequency_write) =
            match self.frequency.record(issue_id).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(issue_id = %issue_id, error = %e, "frequency computation failed, assuming zero velocity");
                    (0, WriteOutcome::Skipped(e.to_string()))
                }
            };

        // --- Priority (snapshot write non-fatal) ---
        emit(&progress, "priority", 85, "scoring priority", None);
        let total_reports = match self.store.count_reports_for_issue(issue_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(issue_id = %issue_id, error = %e, "report count failed, assuming single report");
                1
            }
        };

        // Multiplicity is known only now; patch the scope on the stored
        // metadata best-effort.
        let metadata = if total_reports > 1 {
            let mut updated = metadata;
            updated.impact_scope = ImpactScope::Multi;
            if let Err(e) = self.store.upsert_metadata(&updated).await {
                warn!(report_id = %request.report_id, error = %e, "impact scope update failed");
            }
            updated
        } else {
            metadata
        };

        let breakdown = priority::score(PriorityInputs {
            urgency_score: metadata.urgency_score,
            is_environmental: metadata.is_environmental,
            report_count: total_reports,
            reports_last_30_min,
            confidence_score: metadata.confidence_score,
            requires_immediate_action: metadata.requires_immediate_action,
            reporter_welfare_flag: metadata.reporter_welfare_flag,
        });
        let snapshot_write = match self
            .store
            .insert_priority_snapshot(&PrioritySnapshot {
                aggregated_issue_id: issue_id,
                breakdown: breakdown.clone(),
                computed_at: Utc::now(),
            })
            .await
        {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                warn!(issue_id = %issue_id, error = %e, "priority snapshot write failed, continuing");
                WriteOutcome::Skipped(e.to_string())
            }
        };

        // --- Routing (only for freshly created issues) ---
        let routing = if aggregation.is_new {
            emit(&progress, "routing", 95, "assigning default authority", None);
            Some(self.route(issue_id, &metadata.category, location_id).await)
        } else {
            None
        };

        info!(
            report_id = %request.report_id,
            issue_id = %issue_id,
            is_new = aggregation.is_new,
            score = breakdown.total_score,
            "pipeline complete"
        );
        emit(
            &progress,
            "done",
            100,
            "triage complete",
            Some(json!({
                "total_score": breakdown.total_score,
                "urgency_level": metadata.urgency_level,
            })),
        );

        PipelineResult {
            success: true,
            report_id: request.report_id,
            aggregated_issue_id: Some(issue_id),
            is_new_issue: aggregation.is_new,
            metadata,
            total_reports,
            reports_last_30_min,
            priority: Some(breakdown),
            routing,
            frequency_write,
            snapshot_write,
            error: None,
        }
    }

    async fn route(
        &self,
        issue_id: Uuid,
        category: &str,
        location_id: Option<Uuid>,
    ) -> RoutingDecision {
        let location_type = match location_id {
            Some(id) => match self.store.get_location(id).await {
                Ok(Some(location)) => location.location_type,
                _ => LocationType::Unknown,
            },
            None => LocationType::Unknown,
        };
        let decision = resolve_authority(category, location_type);

        match self.store.get_authority_by_slug(decision.authority_slug).await {
            Ok(Some(authority)) => {
                if let Err(e) = self.store.update_issue_authority(issue_id, authority.id).await {
                    warn!(issue_id = %issue_id, error = %e, "authority assignment failed");
                }
            }
            Ok(None) => {
                warn!(slug = decision.authority_slug, "authority not in reference table, leaving unassigned")
            }
            Err(e) => warn!(issue_id = %issue_id, error = %e, "authority lookup failed"),
        }
        decision
    }

    /// Fatal path. When triage metadata was already persisted it is kept as
    /// written and returned in the result; a degraded placeholder row is
    /// only upserted (best-effort) when no metadata made it to the store.
    async fn fail(
        &self,
        request: &SubmissionRequest,
        error: ReportlineError,
        persisted: Option<AutomationMetadata>,
        progress: &Option<mpsc::Sender<ProgressEvent>>,
    ) -> PipelineResult {
        let reason = error.to_string();
        error!(report_id = %request.report_id, reason = %reason, "pipeline failed");
        let metadata = match persisted {
            Some(metadata) => metadata,
            None => {
                let degraded = degraded_metadata(request.report_id, &reason);
                if let Err(e) = self.store.upsert_metadata(&degraded).await {
                    warn!(report_id = %request.report_id, error = %e, "degraded metadata write also failed");
                }
                degraded
            }
        };
        emit(progress, "failed", 100, format!("pipeline failed: {reason}"), None);
        PipelineResult {
            success: false,
            report_id: request.report_id,
            aggregated_issue_id: None,
            is_new_issue: false,
            metadata,
            total_reports: 0,
            reports_last_30_min: 0,
            priority: None,
            routing: None,
            frequency_write: WriteOutcome::Skipped("pipeline failed".into()),
            snapshot_write: WriteOutcome::Skipped("pipeline failed".into()),
            error: Some(reason),
        }
    }
}

fn emit(
    progress: &Option<mpsc::Sender<ProgressEvent>>,
    stage: &'static str,
    percent: u8,
    message: impl Into<String>,
    detail: Option<serde_json::Value>,
) {
    if let Some(sender) = progress {
        // Best-effort: a slow or dropped subscriber never stalls triage.
        let _ = sender.try_send(ProgressEvent {
            stage,
            percent,
            message: message.into(),
            detail,
        });
    }
}

fn to_metadata(report_id: Uuid, output: &AutomationOutput) -> AutomationMetadata {
    AutomationMetadata {
        report_id,
        category: output.category.clone(),
        urgency_score: output.urgency_score,
        impact_scope: output.impact_scope,
        is_environmental: output.is_environmental,
        confidence_score: output.confidence_score,
        urgency_level: output.urgency_level,
        report_type: output.report_type,
        reporter_welfare_flag: output.reporter_welfare_flag,
        requires_immediate_action: output.requires_immediate_action,
        spam_confidence: output.spam_confidence,
        reasoning: output.reasoning.clone(),
        analyzed_at: Utc::now(),
    }
}

/// Safe defaults for the fatal path: triage is pending, nothing is trusted.
fn degraded_metadata(report_id: Uuid, reason: &str) -> AutomationMetadata {
    AutomationMetadata {
        report_id,
        category: "infrastructure".to_string(),
        urgency_score: 0.5,
        impact_scope: ImpactScope::Single,
        is_environmental: false,
        confidence_score: 0.0,
        urgency_level: UrgencyLevel::Medium,
        report_type: ReportType::General,
        reporter_welfare_flag: false,
        requires_immediate_action: false,
        spam_confidence: 0.0,
        reasoning: format!("triage pending/degraded: {reason}"),
        analyzed_at: Utc::now(),
    }
}

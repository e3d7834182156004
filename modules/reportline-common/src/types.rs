use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrgencyLevel::Low => write!(f, "low"),
            UrgencyLevel::Medium => write!(f, "medium"),
            UrgencyLevel::High => write!(f, "high"),
            UrgencyLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    General,
    Spam,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactScope {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueStatus::Open => write!(f, "open"),
            IssueStatus::InProgress => write!(f, "in_progress"),
            IssueStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Coarse placement of a known location, used by routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Hostel,
    Academic,
    Common,
    Unknown,
}

// --- Core records ---

/// One user submission. Written once by the submission collaborator before
/// the pipeline runs; the pipeline only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Triage output for one report. Exactly one row per report, upsert keyed
/// on `report_id`. Admin corrections may patch the spam fields only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationMetadata {
    pub report_id: Uuid,
    pub category: String,
    pub urgency_score: f32,
    pub impact_scope: ImpactScope,
    pub is_environmental: bool,
    pub confidence_score: f32,
    pub urgency_level: UrgencyLevel,
    pub report_type: ReportType,
    pub reporter_welfare_flag: bool,
    pub requires_immediate_action: bool,
    pub spam_confidence: f32,
    pub reasoning: String,
    pub analyzed_at: DateTime<Utc>,
}

/// The canonical issue: one per open (category, location) tuple, grouping
/// every duplicate report of the same underlying problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedIssue {
    pub id: Uuid,
    pub category: String,
    /// None when no known location could be resolved; such reports still
    /// aggregate per category.
    pub location_id: Option<Uuid>,
    pub authority_id: Option<Uuid>,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Many-to-one edge from report to canonical issue. Total: every report
/// gets exactly one edge, no orphans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueAggregationMap {
    pub report_id: Uuid,
    pub aggregated_issue_id: Uuid,
    pub linked_at: DateTime<Utc>,
}

/// Rolling-window report count snapshot. Append-only; only the latest row
/// is authoritative, history is kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyMetric {
    pub aggregated_issue_id: Uuid,
    pub window_minutes: u32,
    pub report_count: u32,
    pub calculated_at: DateTime<Utc>,
}

/// The four weighted score components plus the gated total. All values
/// rounded to two decimals so persisted and displayed numbers agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub urgency_component: f64,
    pub impact_component: f64,
    pub frequency_component: f64,
    pub environmental_component: f64,
    pub total_score: f64,
}

/// Append-only priority history for one canonical issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritySnapshot {
    pub aggregated_issue_id: Uuid,
    pub breakdown: PriorityBreakdown,
    pub computed_at: DateTime<Utc>,
}

// --- Admin audit ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminActionKind {
    StatusChange {
        from: IssueStatus,
        to: IssueStatus,
    },
    AuthorityReassignment {
        from: Option<Uuid>,
        to: Uuid,
    },
    PriorityOverride {
        score: f64,
        justification: String,
    },
    SpamCorrection {
        report_id: Uuid,
        is_spam: bool,
    },
    Note {
        text: String,
    },
}

/// Immutable audit record of a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAction {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub aggregated_issue_id: Uuid,
    pub action: AdminActionKind,
    pub created_at: DateTime<Utc>,
}

// --- Reference data (read-only lookups) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub location_type: LocationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authority {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

// --- Thresholds shared across crates ---

/// Dashboard treats any score at or above this as mandatory human review.
pub const MANDATORY_REVIEW_SCORE: f64 = 90.0;

/// Extraction confidence below this triggers model escalation.
pub const EXTRACTION_ESCALATION_THRESHOLD: f32 = 0.6;

/// Fast-path urgency below this triggers model escalation (unless spam).
pub const URGENCY_ESCALATION_THRESHOLD: f32 = 0.5;

/// Frequency window is fixed, not configurable.
pub const FREQUENCY_WINDOW_MINUTES: u32 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_levels_order() {
        assert!(UrgencyLevel::Critical > UrgencyLevel::High);
        assert!(UrgencyLevel::High > UrgencyLevel::Medium);
        assert!(UrgencyLevel::Medium > UrgencyLevel::Low);
    }

    #[test]
    fn snake_case_serde_round_trip() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: IssueStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IssueStatus::InProgress);
    }

    #[test]
    fn admin_action_kind_tagged_serde() {
        let action = AdminActionKind::PriorityOverride {
            score: 95.0,
            justification: "VC directive".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "priority_override");
    }
}

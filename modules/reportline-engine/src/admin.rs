//! Admin actions over canonical issues. Every mutation writes its audit
//! record first; priority overrides go through a snapshot like any other
//! score so the derivation invariant stays inspectable.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use reportline_common::{
    AdminAction, AdminActionKind, IssueStatus, PriorityBreakdown, PrioritySnapshot, ReportType,
};

use crate::store::TriageStore;

pub struct AdminDesk {
    store: Arc<dyn TriageStore>,
}

impl AdminDesk {
    pub fn new(store: Arc<dyn TriageStore>) -> Self {
        Self { store }
    }

    async fn audit(&self, admin_id: Uuid, issue_id: Uuid, action: AdminActionKind) -> Result<()> {
        self.store
            .append_admin_action(&AdminAction {
                id: Uuid::new_v4(),
                admin_id,
                aggregated_issue_id: issue_id,
                action,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn change_status(
        &self,
        admin_id: Uuid,
        issue_id: Uuid,
        to: IssueStatus,
    ) -> Result<()> {
        let issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| anyhow!("no issue {issue_id}"))?;
        self.audit(
            admin_id,
            issue_id,
            AdminActionKind::StatusChange {
                from: issue.status,
                to,
            },
        )
        .await?;
        self.store.update_issue_status(issue_id, to).await?;
        info!(%issue_id, status = %to, "issue status changed");
        Ok(())
    }

    pub async fn reassign_authority(
        &self,
        admin_id: Uuid,
        issue_id: Uuid,
        authority_id: Uuid,
    ) -> Result<()> {
        let issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| anyhow!("no issue {issue_id}"))?;
        self.audit(
            admin_id,
            issue_id,
            AdminActionKind::AuthorityReassignment {
                from: issue.authority_id,
                to: authority_id,
            },
        )
        .await?;
        self.store.update_issue_authority(issue_id, authority_id).await
    }

    /// The one sanctioned way to set priority directly. The override is
    /// audited, then recorded as a snapshot whose components carry the
    /// previous breakdown so the jump stays visible in history.
    pub async fn override_priority(
        &self,
        admin_id: Uuid,
        issue_id: Uuid,
        score: f64,
        justification: &str,
    ) -> Result<()> {
        let score = score.clamp(0.0, 100.0);
        self.audit(
            admin_id,
            issue_id,
            AdminActionKind::PriorityOverride {
                score,
                justification: justification.to_string(),
            },
        )
        .await?;

        let previous = self
            .store
            .latest_priority_snapshot(issue_id)
            .await?
            .map(|s| s.breakdown)
            .unwrap_or(PriorityBreakdown {
                urgency_component: 0.0,
                impact_component: 0.0,
                frequency_component: 0.0,
                environmental_component: 0.0,
                total_score: 0.0,
            });

        self.store
            .insert_priority_snapshot(&PrioritySnapshot {
                aggregated_issue_id: issue_id,
                breakdown: PriorityBreakdown {
                    total_score: score,
                    ..previous
                },
                computed_at: Utc::now(),
            })
            .await
    }

    /// Patch a misclassified report. Touches only the spam fields of the
    /// metadata row; everything else stays as triage wrote it.
    pub async fn correct_spam(
        &self,
        admin_id: Uuid,
        issue_id: Uuid,
        report_id: Uuid,
        is_spam: bool,
    ) -> Result<()> {
        self.audit(
            admin_id,
            issue_id,
            AdminActionKind::SpamCorrection { report_id, is_spam },
        )
        .await?;
        let report_type = if is_spam {
            ReportType::Spam
        } else {
            ReportType::General
        };
        self.store
            .patch_spam_fields(report_id, report_type, 1.0, "admin spam correction")
            .await
    }

    pub async fn add_note(&self, admin_id: Uuid, issue_id: Uuid, text: &str) -> Result<()> {
        self.audit(
            admin_id,
            issue_id,
            AdminActionKind::Note {
                text: text.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use reportline_common::AggregatedIssue;

    async fn seeded_issue(store: &InMemoryStore) -> Uuid {
        let issue = AggregatedIssue {
            id: Uuid::new_v4(),
            category: "water".into(),
            location_id: None,
            authority_id: None,
            status: IssueStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_issue(&issue).await.unwrap();
        issue.id
    }

    #[tokio::test]
    async fn status_change_is_audited() {
        let store = Arc::new(InMemoryStore::new());
        let issue_id = seeded_issue(&store).await;
        let desk = AdminDesk::new(store.clone());

        desk.change_status(Uuid::new_v4(), issue_id, IssueStatus::InProgress)
            .await
            .unwrap();

        let issue = store.get_issue(issue_id).await.unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::InProgress);
        let actions = store.admin_actions().await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            actions[0].action,
            AdminActionKind::StatusChange {
                from: IssueStatus::Open,
                to: IssueStatus::InProgress
            }
        ));
    }

    #[tokio::test]
    async fn priority_override_appends_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let issue_id = seeded_issue(&store).await;
        let desk = AdminDesk::new(store.clone());

        desk.override_priority(Uuid::new_v4(), issue_id, 97.5, "confirmed outbreak")
            .await
            .unwrap();

        let snapshot = store.latest_priority_snapshot(issue_id).await.unwrap().unwrap();
        assert!((snapshot.breakdown.total_score - 97.5).abs() < 1e-9);
        assert_eq!(store.admin_actions().await.len(), 1);
    }

    #[tokio::test]
    async fn spam_correction_patches_only_spam_fields() {
        let store = Arc::new(InMemoryStore::new());
        let issue_id = seeded_issue(&store).await;
        let report_id = Uuid::new_v4();
        store
            .upsert_metadata(&reportline_common::AutomationMetadata {
                report_id,
                category: "water".into(),
                urgency_score: 0.75,
                impact_scope: reportline_common::ImpactScope::Single,
                is_environmental: true,
                confidence_score: 0.8,
                urgency_level: reportline_common::UrgencyLevel::High,
                report_type: ReportType::Spam,
                reporter_welfare_flag: false,
                requires_immediate_action: false,
                spam_confidence: 0.9,
                reasoning: "advertising link".into(),
                analyzed_at: Utc::now(),
            })
            .await
            .unwrap();

        let desk = AdminDesk::new(store.clone());
        desk.correct_spam(Uuid::new_v4(), issue_id, report_id, false)
            .await
            .unwrap();

        let meta = store.get_metadata(report_id).await.unwrap().unwrap();
        assert_eq!(meta.report_type, ReportType::General);
        assert!((meta.urgency_score - 0.75).abs() < 1e-6);
        assert_eq!(meta.category, "water");
    }
}

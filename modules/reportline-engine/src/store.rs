// Store seam for the pipeline.
//
// TriageStore is everything the engine needs from the persistence
// collaborator, expressed as keyed get/insert/upsert/query operations.
// A SQL-backed implementation maps find_open_issue + insert_issue onto a
// unique-index upsert; the in-memory implementation here serves tests and
// the demo bin. Deterministic testing: no database, no Docker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use reportline_common::{
    AdminAction, AggregatedIssue, Authority, AutomationMetadata, Category, FrequencyMetric,
    IssueAggregationMap, IssueReport, IssueStatus, Location, PrioritySnapshot, ReportType,
};

/// Typed outcome of a best-effort write. Non-critical persistence failures
/// surface here instead of vanishing into a log line, so both callers and
/// tests can assert "write failed but the pipeline still succeeded".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Skipped(String),
}

impl WriteOutcome {
    pub fn written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

#[async_trait]
pub trait TriageStore: Send + Sync {
    // --- Reports & metadata ---

    async fn get_report(&self, id: Uuid) -> Result<Option<IssueReport>>;

    /// Idempotent on report_id: one metadata row per report.
    async fn upsert_metadata(&self, meta: &AutomationMetadata) -> Result<()>;

    async fn get_metadata(&self, report_id: Uuid) -> Result<Option<AutomationMetadata>>;

    /// Admin correction surface: only the spam fields may be patched.
    async fn patch_spam_fields(
        &self,
        report_id: Uuid,
        report_type: ReportType,
        spam_confidence: f32,
        reasoning: &str,
    ) -> Result<()>;

    // --- Canonical issues ---

    async fn find_open_issue(
        &self,
        category: &str,
        location_id: Option<Uuid>,
    ) -> Result<Option<AggregatedIssue>>;

    async fn insert_issue(&self, issue: &AggregatedIssue) -> Result<()>;

    async fn get_issue(&self, id: Uuid) -> Result<Option<AggregatedIssue>>;

    async fn update_issue_status(&self, id: Uuid, status: IssueStatus) -> Result<()>;

    async fn update_issue_authority(&self, id: Uuid, authority_id: Uuid) -> Result<()>;

    async fn insert_mapping(&self, edge: &IssueAggregationMap) -> Result<()>;

    // --- Metrics & snapshots (append-only) ---

    async fn count_reports_for_issue(&self, issue_id: Uuid) -> Result<u32>;

    /// Count linked reports whose creation time falls at or after `since`.
    async fn count_reports_in_window(&self, issue_id: Uuid, since: DateTime<Utc>) -> Result<u32>;

    async fn insert_frequency_metric(&self, metric: &FrequencyMetric) -> Result<()>;

    async fn latest_frequency_metric(&self, issue_id: Uuid) -> Result<Option<FrequencyMetric>>;

    async fn insert_priority_snapshot(&self, snapshot: &PrioritySnapshot) -> Result<()>;

    async fn latest_priority_snapshot(&self, issue_id: Uuid) -> Result<Option<PrioritySnapshot>>;

    // --- Reference data (read-only) ---

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn list_locations(&self) -> Result<Vec<Location>>;

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>>;

    async fn get_authority_by_slug(&self, slug: &str) -> Result<Option<Authority>>;

    // --- Audit ---

    async fn append_admin_action(&self, action: &AdminAction) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    reports: HashMap<Uuid, IssueReport>,
    metadata: HashMap<Uuid, AutomationMetadata>,
    issues: HashMap<Uuid, AggregatedIssue>,
    mappings: Vec<IssueAggregationMap>,
    frequency_metrics: Vec<FrequencyMetric>,
    priority_snapshots: Vec<PrioritySnapshot>,
    admin_actions: Vec<AdminAction>,
    categories: Vec<Category>,
    locations: Vec<Location>,
    authorities: Vec<Authority>,
}

/// Keyed in-memory store. Write-failure injection flags let tests exercise
/// the pipeline's degraded-persistence paths.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    fail_metadata_writes: AtomicBool,
    fail_mapping_writes: AtomicBool,
    fail_frequency_writes: AtomicBool,
    fail_snapshot_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_reference(
        &self,
        categories: Vec<Category>,
        locations: Vec<Location>,
        authorities: Vec<Authority>,
    ) {
        let mut inner = self.inner.write().await;
        inner.categories = categories;
        inner.locations = locations;
        inner.authorities = authorities;
    }

    pub async fn insert_report(&self, report: IssueReport) {
        self.inner.write().await.reports.insert(report.id, report);
    }

    pub fn set_fail_metadata_writes(&self, fail: bool) {
        self.fail_metadata_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_mapping_writes(&self, fail: bool) {
        self.fail_mapping_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_frequency_writes(&self, fail: bool) {
        self.fail_frequency_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_snapshot_writes(&self, fail: bool) {
        self.fail_snapshot_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn open_issue_count(&self) -> usize {
        self.inner
            .read()
            .await
            .issues
            .values()
            .filter(|i| i.status != IssueStatus::Resolved)
            .count()
    }

    pub async fn frequency_metric_count(&self) -> usize {
        self.inner.read().await.frequency_metrics.len()
    }

    pub async fn priority_snapshot_count(&self) -> usize {
        self.inner.read().await.priority_snapshots.len()
    }

    pub async fn admin_actions(&self) -> Vec<AdminAction> {
        self.inner.read().await.admin_actions.clone()
    }
}

#[async_trait]
impl TriageStore for InMemoryStore {
    async fn get_report(&self, id: Uuid) -> Result<Option<IssueReport>> {
        Ok(self.inner.read().await.reports.get(&id).cloned())
    }

    async fn upsert_metadata(&self, meta: &AutomationMetadata) -> Result<()> {
        if self.fail_metadata_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected metadata write failure"));
        }
        self.inner
            .write()
            .await
            .metadata
            .insert(meta.report_id, meta.clone());
        Ok(())
    }

    async fn get_metadata(&self, report_id: Uuid) -> Result<Option<AutomationMetadata>> {
        Ok(self.inner.read().await.metadata.get(&report_id).cloned())
    }

    async fn patch_spam_fields(
        &self,
        report_id: Uuid,
        report_type: ReportType,
        spam_confidence: f32,
        reasoning: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let meta = inner
            .metadata
            .get_mut(&report_id)
            .ok_or_else(|| anyhow!("no metadata for report {report_id}"))?;
        meta.report_type = report_type;
        meta.spam_confidence = spam_confidence;
        meta.reasoning = reasoning.to_string();
        Ok(())
    }

    async fn find_open_issue(
        &self,
        category: &str,
        location_id: Option<Uuid>,
    ) -> Result<Option<AggregatedIssue>> {
        Ok(self
            .inner
            .read()
            .await
            .issues
            .values()
            .find(|issue| {
                issue.category == category
                    && issue.location_id == location_id
                    && matches!(issue.status, IssueStatus::Open | IssueStatus::InProgress)
            })
            .cloned())
    }

    async fn insert_issue(&self, issue: &AggregatedIssue) -> Result<()> {
        self.inner
            .write()
            .await
            .issues
            .insert(issue.id, issue.clone());
        Ok(())
    }

    async fn get_issue(&self, id: Uuid) -> Result<Option<AggregatedIssue>> {
        Ok(self.inner.read().await.issues.get(&id).cloned())
    }

    async fn update_issue_status(&self, id: Uuid, status: IssueStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let issue = inner
            .issues
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no issue {id}"))?;
        issue.status = status;
        issue.updated_at = Utc::now();
        Ok(())
    }

    async fn update_issue_authority(&self, id: Uuid, authority_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let issue = inner
            .issues
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no issue {id}"))?;
        issue.authority_id = Some(authority_id);
        issue.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_mapping(&self, edge: &IssueAggregationMap) -> Result<()> {
        if self.fail_mapping_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected mapping write failure"));
        }
        self.inner.write().await.mappings.push(edge.clone());
        Ok(())
    }

    async fn count_reports_for_issue(&self, issue_id: Uuid) -> Result<u32> {
        Ok(self
            .inner
            .read()
            .await
            .mappings
            .iter()
            .filter(|m| m.aggregated_issue_id == issue_id)
            .count() as u32)
    }

    async fn count_reports_in_window(&self, issue_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
        let inner = self.inner.read().await;
        let count = inner
            .mappings
            .iter()
            .filter(|m| m.aggregated_issue_id == issue_id)
            .filter_map(|m| inner.reports.get(&m.report_id))
            .filter(|r| r.created_at >= since)
            .count();
        Ok(count as u32)
    }

    async fn insert_frequency_metric(&self, metric: &FrequencyMetric) -> Result<()> {
        if self.fail_frequency_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected frequency write failure"));
        }
        self.inner.write().await.frequency_metrics.push(metric.clone());
        Ok(())
    }

    async fn latest_frequency_metric(&self, issue_id: Uuid) -> Result<Option<FrequencyMetric>> {
        Ok(self
            .inner
            .read()
            .await
            .frequency_metrics
            .iter()
            .filter(|m| m.aggregated_issue_id == issue_id)
            .max_by_key(|m| m.calculated_at)
            .cloned())
    }

    async fn insert_priority_snapshot(&self, snapshot: &PrioritySnapshot) -> Result<()> {
        if self.fail_snapshot_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected snapshot write failure"));
        }
        self.inner.write().await.priority_snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn latest_priority_snapshot(&self, issue_id: Uuid) -> Result<Option<PrioritySnapshot>> {
        Ok(self
            .inner
            .read()
            .await
            .priority_snapshots
            .iter()
            .filter(|s| s.aggregated_issue_id == issue_id)
            .max_by_key(|s| s.computed_at)
            .cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.inner.read().await.categories.clone())
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        Ok(self.inner.read().await.locations.clone())
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>> {
        Ok(self
            .inner
            .read()
            .await
            .locations
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn get_authority_by_slug(&self, slug: &str) -> Result<Option<Authority>> {
        Ok(self
            .inner
            .read()
            .await
            .authorities
            .iter()
            .find(|a| a.slug == slug)
            .cloned())
    }

    async fn append_admin_action(&self, action: &AdminAction) -> Result<()> {
        self.inner.write().await.admin_actions.push(action.clone());
        Ok(())
    }
}

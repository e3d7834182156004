//! Rolling-window frequency tracking.
//!
//! Recomputed from scratch on every new report: O(reports in window), which
//! stays cheap because the window is a fixed 30 minutes. The metric write is
//! best-effort; the fresh in-memory count is returned either way.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use reportline_common::{FrequencyMetric, FREQUENCY_WINDOW_MINUTES};

use crate::store::{TriageStore, WriteOutcome};

pub struct FrequencyTracker {
    store: Arc<dyn TriageStore>,
}

impl FrequencyTracker {
    pub fn new(store: Arc<dyn TriageStore>) -> Self {
        Self { store }
    }

    /// Count reports linked to the issue in the trailing window and persist
    /// a new metric snapshot. Returns the count and the write outcome.
    pub async fn record(&self, aggregated_issue_id: Uuid) -> Result<(u32, WriteOutcome)> {
        let now = Utc::now();
        let since = now - Duration::minutes(FREQUENCY_WINDOW_MINUTES as i64);
        let report_count = self
            .store
            .count_reports_in_window(aggregated_issue_id, since)
            .await?;

        let metric = FrequencyMetric {
            aggregated_issue_id,
            window_minutes: FREQUENCY_WINDOW_MINUTES,
            report_count,
            calculated_at: now,
        };

        let outcome = match self.store.insert_frequency_metric(&metric).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                warn!(issue_id = %aggregated_issue_id, error = %e, "frequency metric write failed, continuing");
                WriteOutcome::Skipped(e.to_string())
            }
        };

        Ok((report_count, outcome))
    }
}

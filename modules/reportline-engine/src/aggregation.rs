//! The aggregation engine: find or create the canonical issue for a
//! (category, location) tuple and link the report to it.
//!
//! Find-or-create is serialized per tuple with a keyed async mutex, so two
//! concurrent submissions for a never-yet-seen tuple produce exactly one
//! canonical issue. A SQL-backed store would get the same guarantee from a
//! partial unique index over (category, location_id) WHERE status != 'resolved'
//! plus an upsert; a plain read-then-write has a duplicate race either way.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use reportline_common::{AggregatedIssue, IssueAggregationMap, IssueStatus};

use crate::store::TriageStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOutcome {
    pub aggregated_issue_id: Uuid,
    pub is_new: bool,
}

type TupleKey = (String, Option<Uuid>);

pub struct AggregationEngine {
    store: Arc<dyn TriageStore>,
    locks: Mutex<HashMap<TupleKey, Arc<Mutex<()>>>>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn TriageStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn tuple_lock(&self, key: &TupleKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.clone()).or_default().clone()
    }

    /// Link `report_id` to the open canonical issue for the tuple, creating
    /// the issue if none exists. At most one open issue per tuple survives
    /// concurrent submissions.
    pub async fn find_or_link(
        &self,
        report_id: Uuid,
        category: &str,
        location_id: Option<Uuid>,
    ) -> Result<AggregationOutcome> {
        let key = (category.to_string(), location_id);
        let lock = self.tuple_lock(&key).await;
        let _guard = lock.lock().await;

        let (issue_id, is_new) = match self.store.find_open_issue(category, location_id).await? {
            Some(existing) => {
                debug!(issue_id = %existing.id, category, "linking report to existing issue");
                (existing.id, false)
            }
            None => {
                let now = Utc::now();
                let issue = AggregatedIssue {
                    id: Uuid::new_v4(),
                    category: category.to_string(),
                    location_id,
                    authority_id: None,
                    status: IssueStatus::Open,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_issue(&issue).await?;
                info!(issue_id = %issue.id, category, "created canonical issue");
                (issue.id, true)
            }
        };

        self.store
            .insert_mapping(&IssueAggregationMap {
                report_id,
                aggregated_issue_id: issue_id,
                linked_at: Utc::now(),
            })
            .await?;

        Ok(AggregationOutcome {
            aggregated_issue_id: issue_id,
            is_new,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn second_report_links_to_same_issue() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AggregationEngine::new(store.clone());
        let location = Some(Uuid::new_v4());

        let first = engine
            .find_or_link(Uuid::new_v4(), "wifi", location)
            .await
            .unwrap();
        let second = engine
            .find_or_link(Uuid::new_v4(), "wifi", location)
            .await
            .unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.aggregated_issue_id, second.aggregated_issue_id);
        assert_eq!(store.open_issue_count().await, 1);
    }

    #[tokio::test]
    async fn different_tuples_get_different_issues() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AggregationEngine::new(store.clone());
        let location = Some(Uuid::new_v4());

        let wifi = engine.find_or_link(Uuid::new_v4(), "wifi", location).await.unwrap();
        let water = engine.find_or_link(Uuid::new_v4(), "water", location).await.unwrap();
        let elsewhere = engine.find_or_link(Uuid::new_v4(), "wifi", None).await.unwrap();

        assert!(wifi.is_new && water.is_new && elsewhere.is_new);
        assert_eq!(store.open_issue_count().await, 3);
    }

    #[tokio::test]
    async fn resolved_issue_is_not_reused() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AggregationEngine::new(store.clone());
        let location = Some(Uuid::new_v4());

        let first = engine.find_or_link(Uuid::new_v4(), "water", location).await.unwrap();
        store
            .update_issue_status(first.aggregated_issue_id, IssueStatus::Resolved)
            .await
            .unwrap();

        let second = engine.find_or_link(Uuid::new_v4(), "water", location).await.unwrap();
        assert!(second.is_new);
        assert_ne!(first.aggregated_issue_id, second.aggregated_issue_id);
    }

    #[tokio::test]
    async fn concurrent_submissions_create_one_issue() {
        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(AggregationEngine::new(store.clone()));
        let location = Some(Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.find_or_link(Uuid::new_v4(), "wifi", location).await
            }));
        }

        let mut issue_ids = Vec::new();
        let mut new_count = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if outcome.is_new {
                new_count += 1;
            }
            issue_ids.push(outcome.aggregated_issue_id);
        }

        assert_eq!(new_count, 1);
        assert!(issue_ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.open_issue_count().await, 1);
    }
}

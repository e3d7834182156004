pub mod extractor;
pub mod orchestrator;
pub mod spam;
pub mod urgency;

pub use extractor::{CategoryExtractor, ExtractionResult};
pub use orchestrator::{is_environmental, AutomationOutput, TriageOrchestrator};
pub use spam::{SpamClassifier, SpamVerdict};
pub use urgency::{UrgencyAssessment, UrgencyAssessor};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use ai_client::RemoteClassifier;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    /// Scripted classifier: returns canned responses in order and counts
    /// calls, so tests can assert the short-circuit property.
    pub struct ScriptedClassifier {
        responses: Vec<Result<String, String>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        pub fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn always(response: &str) -> Arc<Self> {
            Self::new(vec![Ok(response.to_string())])
        }

        pub fn failing() -> Arc<Self> {
            Self::new(vec![Err("connection refused".to_string())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteClassifier for ScriptedClassifier {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.responses.len().saturating_sub(1));
            match &self.responses[idx] {
                Ok(text) => Ok(text.clone()),
                Err(msg) => Err(anyhow!("{msg}")),
            }
        }
    }
}

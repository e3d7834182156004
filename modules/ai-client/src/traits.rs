// The classifier seam. Triage components hold Option<Arc<dyn RemoteClassifier>>,
// so "unconfigured" is a first-class state and tests run against scripted mocks:
// no network, no API keys. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

/// A remote model that accepts a system prompt plus untrusted user content
/// and returns free text. The response is adversarial input: callers must
/// route it through [`crate::parse`] and never let it steer control flow
/// beyond the declared output contract.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

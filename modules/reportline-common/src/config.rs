use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the remote classifier. Absent means heuristics-only:
    /// every classifier runs its fast path and never escalates.
    pub anthropic_api_key: Option<String>,
    /// Model used for triage escalations.
    pub classifier_model: String,
    /// Per-call timeout for remote classifier requests, in seconds.
    pub classifier_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            classifier_timeout_secs: env::var("CLASSIFIER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }

    pub fn heuristics_only(&self) -> bool {
        self.anthropic_api_key.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_key_are_heuristics_only() {
        let config = Config {
            anthropic_api_key: None,
            classifier_model: "claude-haiku-4-5-20251001".into(),
            classifier_timeout_secs: 15,
        };
        assert!(config.heuristics_only());
    }
}

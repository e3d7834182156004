use thiserror::Error;

/// Fatal pipeline errors. Non-fatal persistence problems never become one
/// of these; they surface as `WriteOutcome::Skipped` on the engine side.
#[derive(Error, Debug)]
pub enum ReportlineError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Missing reference data: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

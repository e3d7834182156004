pub mod admin;
pub mod aggregation;
pub mod frequency;
pub mod pipeline;
pub mod priority;
pub mod routing;
pub mod store;

pub use admin::AdminDesk;
pub use aggregation::{AggregationEngine, AggregationOutcome};
pub use frequency::FrequencyTracker;
pub use pipeline::{PipelineCoordinator, PipelineResult, ProgressEvent, SubmissionRequest};
pub use priority::{score, PriorityInputs};
pub use routing::{resolve_authority, RoutingDecision};
pub use store::{InMemoryStore, TriageStore, WriteOutcome};

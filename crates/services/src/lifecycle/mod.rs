//! Batch lifecycle: submission, polling, enrichment, reporting.
//!
//! All progress lives in [`LifecycleMessage`]; nothing here keeps state
//! between deliveries.

pub mod message;
pub mod orchestrator;
pub mod results;
pub mod retry;
pub mod scheduler;

pub use message::{AudioFileEvent, AudioFileInfo, EnrichmentRequestState, EnrichmentStatus, LifecycleMessage};
pub use orchestrator::{LifecycleOrchestrator, Outcome, RequeueReason, Terminal, outcome_label};
pub use results::{FetchedResults, fetch_results};
pub use retry::{Classification, RetryDecision, RetryPolicy};
pub use scheduler::{AudioCandidate, JobSubmissionScheduler, SubmissionSummary, job_name};

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Dashboard mirror of one batch. Never read back by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionJob {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job_name: String,
    pub job_location: String,
    pub locale: String,
    pub phase: JobPhase,
    #[serde(default)]
    pub uses_custom_model: bool,
    #[serde(default)]
    pub polling_counter: u32,
    #[serde(default)]
    pub failed_execution_counter: u32,
    #[serde(default)]
    pub file_urls: Vec<String>,
    pub successful_count: Option<u32>,
    pub failed_count: Option<u32>,
    pub last_error: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl TranscriptionJob {
    pub const COLLECTION: &'static str = "transcription_jobs";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Submitted,
    Polling,
    EnrichmentPending,
    Retrying,
    Reported,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Reported | JobPhase::Failed)
    }
}

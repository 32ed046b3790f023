mod client;

pub use client::SpeechBatchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Request body for creating a batch transcription job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionDefinition {
    pub display_name: String,
    pub locale: String,
    pub content_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<EntityReference>,
    pub properties: TranscriptionProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    #[serde(rename = "self")]
    pub self_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionProperties {
    pub diarization_enabled: bool,
    pub word_level_timestamps_enabled: bool,
    pub punctuation_mode: String,
    pub profanity_filter_mode: String,
}

/// Remote job state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        match value {
            "NotStarted" => Ok(Self::NotStarted),
            "Running" => Ok(Self::Running),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            other => Err(ProviderError::MalformedPayload(format!(
                "unknown transcription status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderJobError {
    pub code: String,
    pub message: String,
}

impl ProviderJobError {
    /// Provider error codes for which resubmitting the same audio may succeed.
    pub fn is_retryable_code(&self) -> bool {
        matches!(
            self.code.as_str(),
            "InvalidUri" | "Internal" | "Timeout" | "Transient"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub error: Option<ProviderJobError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Transcription,
    TranscriptionReport,
    Other(String),
}

impl ArtifactKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "Transcription" => Self::Transcription,
            "TranscriptionReport" => Self::TranscriptionReport,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content_url: String,
}

/// Per-job summary the provider attaches as a `TranscriptionReport` artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderReport {
    pub successful_transcriptions_count: u32,
    pub failed_transcriptions_count: u32,
    pub details: Vec<ProviderReportDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderReportDetail {
    pub source: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProviderReportDetail {
    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("Failed") && !self.source.is_empty()
    }
}

/// The batch speech-to-text REST service.
#[async_trait]
pub trait BatchTranscriptionService: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Creates a job and returns its location URL.
    async fn create_job(&self, definition: &TranscriptionDefinition) -> Result<String, ProviderError>;

    async fn get_job_status(&self, job_location: &str) -> Result<JobStatus, ProviderError>;

    async fn list_result_artifacts(&self, job_location: &str) -> Result<Vec<ResultArtifact>, ProviderError>;

    async fn fetch_artifact(&self, artifact: &ResultArtifact) -> Result<Vec<u8>, ProviderError>;

    /// Deletes a job. A job that no longer exists counts as deleted.
    async fn delete_job(&self, job_location: &str) -> Result<(), ProviderError>;
}

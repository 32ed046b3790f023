use batchscribe_transcription::AudioDetails;
use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentKind;
use crate::storage::file_name_from_url;

/// Queue payload and state record for one submitted batch.
///
/// The message is the only place batch progress lives; each handler
/// invocation receives it, advances it, and either republishes it or
/// reports the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleMessage {
    pub job_location: String,
    pub job_name: String,
    pub locale: String,
    #[serde(default)]
    pub uses_custom_model: bool,
    pub audio_files: Vec<AudioFileInfo>,
    #[serde(default)]
    pub polling_counter: u32,
    #[serde(default)]
    pub failed_execution_counter: u32,
}

impl LifecycleMessage {
    pub fn new(
        job_location: impl Into<String>,
        job_name: impl Into<String>,
        locale: impl Into<String>,
        uses_custom_model: bool,
        audio_files: Vec<AudioFileInfo>,
    ) -> Self {
        Self {
            job_location: job_location.into(),
            job_name: job_name.into(),
            locale: locale.into(),
            uses_custom_model,
            audio_files,
            polling_counter: 0,
            failed_execution_counter: 0,
        }
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn file_by_name(&self, file_name: &str) -> Option<&AudioFileInfo> {
        self.audio_files.iter().find(|f| f.file_name() == file_name)
    }

    /// Whether every file has a recorded request for each of `kinds`.
    pub fn all_enrichments_submitted(&self, kinds: &[EnrichmentKind]) -> bool {
        self.audio_files
            .iter()
            .all(|file| kinds.iter().all(|kind| file.enrichment(*kind).is_some()))
    }

    /// AND over every recorded enrichment request of every file.
    pub fn all_enrichments_completed(&self) -> bool {
        self.audio_files.iter().all(|file| {
            file.enrichment_requests
                .iter()
                .all(|r| r.status == EnrichmentStatus::Completed)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileInfo {
    pub file_url: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub enrichment_requests: Vec<EnrichmentRequestState>,
    /// Header inspection result captured at submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_details: Option<AudioDetails>,
}

impl AudioFileInfo {
    pub fn new(file_url: impl Into<String>, retry_count: u32) -> Self {
        Self {
            file_url: file_url.into(),
            retry_count,
            enrichment_requests: Vec::new(),
            audio_details: None,
        }
    }

    pub fn file_name(&self) -> String {
        file_name_from_url(&self.file_url)
    }

    pub fn enrichment(&self, kind: EnrichmentKind) -> Option<&EnrichmentRequestState> {
        self.enrichment_requests.iter().find(|r| r.kind == kind)
    }

    pub fn enrichment_mut(&mut self, kind: EnrichmentKind) -> Option<&mut EnrichmentRequestState> {
        self.enrichment_requests.iter_mut().find(|r| r.kind == kind)
    }

    /// Records or replaces the request state for its kind.
    pub fn set_enrichment(&mut self, state: EnrichmentRequestState) {
        match self.enrichment_mut(state.kind) {
            Some(existing) => *existing = state,
            None => self.enrichment_requests.push(state),
        }
    }

    /// Non-fatal notes about the audio, e.g. an unreadable header.
    pub fn advisories(&self) -> Vec<String> {
        match self.audio_details.as_ref().and_then(|d| d.error.as_ref()) {
            Some(error) => vec![format!("Audio header not inspected: {error}")],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrichmentStatus {
    #[default]
    None,
    Running,
    Completed,
}

/// One enrichment request of one audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequestState {
    pub kind: EnrichmentKind,
    #[serde(default)]
    pub request_id: String,
    pub status: EnrichmentStatus,
    /// Set when the request ended without a usable result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichmentRequestState {
    pub fn running(kind: EnrichmentKind, request_id: impl Into<String>) -> Self {
        Self {
            kind,
            request_id: request_id.into(),
            status: EnrichmentStatus::Running,
            error: None,
        }
    }

    /// A request that finished (or never started) with an error.
    pub fn failed(kind: EnrichmentKind, request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind,
            request_id: request_id.into(),
            status: EnrichmentStatus::Completed,
            error: Some(error.into()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == EnrichmentStatus::Completed && self.error.is_none()
    }
}

/// Per-file event on the start queue, emitted on upload and on resubmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileEvent {
    pub file_url: String,
    #[serde(default)]
    pub retry_count: u32,
}

impl AudioFileEvent {
    pub fn new(file_url: impl Into<String>, retry_count: u32) -> Self {
        Self {
            file_url: file_url.into(),
            retry_count,
        }
    }
}

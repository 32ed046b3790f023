use std::collections::HashMap;

use batchscribe_transcription::TranscriptionResult;
use tracing::{debug, warn};

use super::message::LifecycleMessage;
use super::retry::{Classification, RetryPolicy};
use crate::error::ProviderError;
use crate::speech::{ArtifactKind, BatchTranscriptionService, ProviderReport};
use crate::storage::file_name_from_url;

/// Everything downloaded from a succeeded provider job.
#[derive(Debug, Default)]
pub struct FetchedResults {
    /// Transcripts keyed by the index of their file in the message.
    pub transcripts: HashMap<usize, TranscriptionResult>,
    pub report: Option<ProviderReport>,
    /// Problems that do not belong to a single file.
    pub general_errors: Vec<String>,
}

impl FetchedResults {
    /// Failed provider details keyed by file name: `(errorKind, errorMessage)`.
    pub fn failed_files(&self) -> HashMap<String, (String, String)> {
        self.report
            .iter()
            .flat_map(|r| r.details.iter())
            .filter(|d| d.is_failed())
            .map(|d| {
                (
                    file_name_from_url(&d.source),
                    (
                        d.error_kind.clone().unwrap_or_else(|| "unknown".to_string()),
                        d.error_message.clone().unwrap_or_else(|| "unknown".to_string()),
                    ),
                )
            })
            .collect()
    }
}

/// Lists and downloads the job's transcripts and its report.
///
/// Retryable download failures abort the fetch so the whole step is retried;
/// anything else is recorded as a general error and the file is left without
/// a transcript.
pub async fn fetch_results(
    speech: &dyn BatchTranscriptionService,
    policy: &RetryPolicy,
    message: &LifecycleMessage,
) -> Result<FetchedResults, ProviderError> {
    let artifacts = speech.list_result_artifacts(&message.job_location).await?;
    let mut fetched = FetchedResults::default();

    for artifact in &artifacts {
        match artifact.kind {
            ArtifactKind::Transcription => {
                let bytes = match speech.fetch_artifact(artifact).await {
                    Ok(bytes) => bytes,
                    Err(e) if policy.classify(&e) == Classification::Retryable => return Err(e),
                    Err(e) => {
                        fetched
                            .general_errors
                            .push(format!("Failed getting transcript {}: {e}", artifact.name));
                        continue;
                    }
                };
                let transcript = match TranscriptionResult::from_json(&bytes) {
                    Ok(t) => t,
                    Err(e) => {
                        fetched
                            .general_errors
                            .push(format!("Transcript {} is not valid: {e}", artifact.name));
                        continue;
                    }
                };
                if transcript.source.is_empty() {
                    fetched
                        .general_errors
                        .push("Transcription source is unknown, skipping evaluation.".to_string());
                    continue;
                }

                let file_name = file_name_from_url(&transcript.source);
                let Some(index) = message
                    .audio_files
                    .iter()
                    .position(|f| f.file_name() == file_name)
                else {
                    fetched
                        .general_errors
                        .push(format!("Transcript for {file_name} does not belong to this job."));
                    continue;
                };
                if fetched.transcripts.contains_key(&index) {
                    fetched
                        .general_errors
                        .push(format!("Duplicate audio file in job, skipping: {file_name}."));
                    continue;
                }
                debug!(job_name = %message.job_name, file = %file_name, "Transcript fetched");
                fetched.transcripts.insert(index, transcript);
            }
            ArtifactKind::TranscriptionReport => match fetch_report(speech, artifact).await {
                Ok(report) => fetched.report = Some(report),
                Err(e) if policy.classify(&e) == Classification::Retryable => return Err(e),
                Err(e) => {
                    warn!(job_name = %message.job_name, error = %e, "Provider report unreadable");
                    fetched.general_errors.push(format!("Provider report unreadable: {e}"));
                }
            },
            ArtifactKind::Other(_) => {}
        }
    }
    Ok(fetched)
}

pub async fn fetch_report(
    speech: &dyn BatchTranscriptionService,
    artifact: &crate::speech::ResultArtifact,
) -> Result<ProviderReport, ProviderError> {
    let bytes = speech.fetch_artifact(artifact).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

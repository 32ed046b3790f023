use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use batchscribe_services::error::ProviderError;
use batchscribe_services::speech::{
    ArtifactKind, BatchTranscriptionService, JobState, JobStatus, ProviderJobError, ProviderReport,
    ProviderReportDetail, ResultArtifact, TranscriptionDefinition,
};
use batchscribe_services::storage::file_name_from_url;
use tokio::sync::Barrier;

use super::transcripts::sample_transcript;

/// One scripted answer of `get_job_status`.
#[derive(Debug, Clone)]
pub enum StatusStep {
    NotStarted,
    Running,
    Succeeded,
    Failed { code: String, message: String },
    Http(u16),
    Timeout,
}

impl StatusStep {
    fn answer(&self) -> Result<JobStatus, ProviderError> {
        let status = |state| Ok(JobStatus { state, error: None });
        match self {
            StatusStep::NotStarted => status(JobState::NotStarted),
            StatusStep::Running => status(JobState::Running),
            StatusStep::Succeeded => status(JobState::Succeeded),
            StatusStep::Failed { code, message } => Ok(JobStatus {
                state: JobState::Failed,
                error: Some(ProviderJobError {
                    code: code.clone(),
                    message: message.clone(),
                }),
            }),
            StatusStep::Http(status) => Err(ProviderError::Http {
                status: *status,
                body: "scripted".to_string(),
            }),
            StatusStep::Timeout => Err(ProviderError::Timeout),
        }
    }
}

#[derive(Default)]
struct State {
    jobs: usize,
    created: Vec<TranscriptionDefinition>,
    create_errors: VecDeque<u16>,
    scripts: HashMap<String, VecDeque<StatusStep>>,
    default_script: Vec<StatusStep>,
    artifacts: HashMap<String, Vec<ResultArtifact>>,
    contents: HashMap<String, Vec<u8>>,
    failing_files: HashSet<String>,
    status_calls: usize,
    list_calls: usize,
    fetch_calls: usize,
    deleted: Vec<String>,
}

/// Scriptable batch transcription service.
///
/// Every created job gets one transcript per content URL, except for files
/// marked failing, which show up as failed details in the provider report.
pub struct FakeSpeech {
    state: Mutex<State>,
    status_gate: Mutex<Option<Arc<Barrier>>>,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                default_script: vec![StatusStep::Succeeded],
                ..State::default()
            }),
            status_gate: Mutex::new(None),
        }
    }

    /// Status script for jobs created from now on. The last step repeats.
    pub fn script_new_jobs(&self, steps: Vec<StatusStep>) {
        self.state.lock().unwrap().default_script = steps;
    }

    /// Replaces the status script of an existing job. The last step repeats.
    pub fn script(&self, job_location: &str, steps: Vec<StatusStep>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(job_location.to_string(), steps.into());
    }

    /// Holds every `get_job_status` call until `callers` of them wait together.
    pub fn gate_status_calls(&self, callers: usize) {
        *self.status_gate.lock().unwrap() = Some(Arc::new(Barrier::new(callers)));
    }

    pub fn fail_file(&self, file_name: &str) {
        self.state.lock().unwrap().failing_files.insert(file_name.to_string());
    }

    /// Makes the next `create_job` calls fail with the given HTTP statuses.
    pub fn fail_creates(&self, statuses: &[u16]) {
        self.state.lock().unwrap().create_errors.extend(statuses.iter().copied());
    }

    pub fn created(&self) -> Vec<TranscriptionDefinition> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl BatchTranscriptionService for FakeSpeech {
    fn name(&self) -> &str {
        "fake-speech"
    }

    async fn create_job(&self, definition: &TranscriptionDefinition) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.create_errors.pop_front() {
            return Err(ProviderError::Http {
                status,
                body: "scripted".to_string(),
            });
        }

        state.jobs += 1;
        let location = format!("https://speech.test/speechtotext/v3.1/transcriptions/{}", state.jobs);
        state.created.push(definition.clone());

        let mut artifacts = Vec::new();
        let mut report = ProviderReport::default();
        for (index, url) in definition.content_urls.iter().enumerate() {
            let name = file_name_from_url(url);
            if state.failing_files.contains(&name) {
                report.failed_transcriptions_count += 1;
                report.details.push(ProviderReportDetail {
                    source: url.clone(),
                    status: "Failed".to_string(),
                    error_kind: Some("InvalidData".to_string()),
                    error_message: Some("audio could not be decoded".to_string()),
                });
                continue;
            }
            report.successful_transcriptions_count += 1;
            report.details.push(ProviderReportDetail {
                source: url.clone(),
                status: "Succeeded".to_string(),
                ..ProviderReportDetail::default()
            });

            let content_url = format!("{location}/files/{index}");
            let payload = serde_json::to_vec(&sample_transcript(url)).unwrap();
            state.contents.insert(content_url.clone(), payload);
            artifacts.push(ResultArtifact {
                name: format!("contenturl_{index}.json"),
                kind: ArtifactKind::Transcription,
                content_url,
            });
        }

        let report_url = format!("{location}/files/report");
        state
            .contents
            .insert(report_url.clone(), serde_json::to_vec(&report).unwrap());
        artifacts.push(ResultArtifact {
            name: "report.json".to_string(),
            kind: ArtifactKind::TranscriptionReport,
            content_url: report_url,
        });

        state.artifacts.insert(location.clone(), artifacts);
        let script = state.default_script.clone();
        state.scripts.insert(location.clone(), script.into());
        Ok(location)
    }

    async fn get_job_status(&self, job_location: &str) -> Result<JobStatus, ProviderError> {
        let gate = self.status_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let Some(script) = state.scripts.get_mut(job_location) else {
            return Err(ProviderError::NotFound(job_location.to_string()));
        };
        let step = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        step.unwrap_or(StatusStep::Succeeded).answer()
    }

    async fn list_result_artifacts(&self, job_location: &str) -> Result<Vec<ResultArtifact>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        state
            .artifacts
            .get(job_location)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(job_location.to_string()))
    }

    async fn fetch_artifact(&self, artifact: &ResultArtifact) -> Result<Vec<u8>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        state
            .contents
            .get(&artifact.content_url)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(artifact.content_url.clone()))
    }

    async fn delete_job(&self, job_location: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(job_location.to_string());
        state.scripts.remove(job_location);
        if let Some(artifacts) = state.artifacts.remove(job_location) {
            for artifact in artifacts {
                state.contents.remove(&artifact.content_url);
            }
        }
        Ok(())
    }
}

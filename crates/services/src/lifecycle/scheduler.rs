use std::sync::Arc;

use batchscribe_config::{LifecycleSettings, QueueSettings, SpeechSettings, StorageSettings};
use batchscribe_db::models::JobPhase;
use batchscribe_transcription::{ReportDetail, build_batch_report, pipeline};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::message::{AudioFileEvent, AudioFileInfo, LifecycleMessage};
use super::retry::{Classification, RetryPolicy};
use crate::error::{LifecycleResult, ProviderError, StorageError};
use crate::mirror::{JobMirror, record_best_effort};
use crate::queue::{MessageQueue, publish_json};
use crate::speech::{
    BatchTranscriptionService, EntityReference, SpeechBatchClient, TranscriptionDefinition,
    TranscriptionProperties,
};
use crate::storage::{ObjectRef, StorageService};

/// An input object waiting to be transcribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCandidate {
    pub object: ObjectRef,
    pub retry_count: u32,
}

impl AudioCandidate {
    pub fn new(object: ObjectRef, retry_count: u32) -> Self {
        Self { object, retry_count }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub submitted_jobs: usize,
    pub submitted_files: usize,
    pub failed_jobs: usize,
    /// Files handed back to the start queue for another attempt.
    pub resubmitted_files: usize,
    /// Candidates left for the next invocation by the per-run cap.
    pub deferred_files: usize,
    /// Every job name used by the run, submitted or not, in order.
    pub job_names: Vec<String>,
}

/// Groups unprocessed audio into provider jobs and starts tracking them.
pub struct JobSubmissionScheduler {
    storage: Arc<dyn StorageService>,
    queue: Arc<dyn MessageQueue>,
    speech: Arc<dyn BatchTranscriptionService>,
    mirror: Arc<dyn JobMirror>,
    speech_settings: SpeechSettings,
    containers: StorageSettings,
    lifecycle: LifecycleSettings,
    queues: QueueSettings,
    policy: RetryPolicy,
}

impl JobSubmissionScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageService>,
        queue: Arc<dyn MessageQueue>,
        speech: Arc<dyn BatchTranscriptionService>,
        mirror: Arc<dyn JobMirror>,
        speech_settings: SpeechSettings,
        containers: StorageSettings,
        lifecycle: LifecycleSettings,
        queues: QueueSettings,
    ) -> Self {
        let lifecycle = lifecycle.normalized();
        Self {
            policy: RetryPolicy::from_settings(&lifecycle),
            storage,
            queue,
            speech,
            mirror,
            speech_settings,
            containers,
            lifecycle,
            queues,
        }
    }

    /// Lists the input container, skipping files already claimed by a job.
    pub async fn discover(&self) -> LifecycleResult<Vec<AudioCandidate>> {
        let mut candidates = Vec::new();
        for object in self.storage.list(&self.containers.audio_input_container).await? {
            let claim = ObjectRef::new(&self.containers.audio_claimed_container, &object.name);
            if self.storage.exists(&claim).await? {
                continue;
            }
            candidates.push(AudioCandidate::new(object, 0));
        }
        Ok(candidates)
    }

    /// Submits `candidates` in stable order, at most
    /// `files_per_transcription_job` files per job and
    /// `messages_per_function_execution` jobs per call.
    pub async fn run(
        &self,
        candidates: Vec<AudioCandidate>,
        started_at: DateTime<Utc>,
    ) -> LifecycleResult<SubmissionSummary> {
        let mut summary = SubmissionSummary::default();
        if candidates.is_empty() {
            return Ok(summary);
        }

        let groups: Vec<&[AudioCandidate]> = candidates
            .chunks(self.lifecycle.files_per_transcription_job)
            .collect();
        let allowed = groups.len().min(self.lifecycle.messages_per_function_execution);
        summary.deferred_files = groups[allowed..].iter().map(|g| g.len()).sum();

        let run_id = run_id();
        for (index, group) in groups[..allowed].iter().enumerate() {
            let job_name = job_name(started_at, &run_id, index);
            self.submit_group(&job_name, group, &mut summary).await?;
            summary.job_names.push(job_name);
        }

        info!(
            submitted_jobs = summary.submitted_jobs,
            submitted_files = summary.submitted_files,
            failed_jobs = summary.failed_jobs,
            resubmitted_files = summary.resubmitted_files,
            deferred_files = summary.deferred_files,
            "Submission run finished"
        );
        Ok(summary)
    }

    async fn submit_group(
        &self,
        job_name: &str,
        group: &[AudioCandidate],
        summary: &mut SubmissionSummary,
    ) -> LifecycleResult<()> {
        let mut files = Vec::with_capacity(group.len());
        for candidate in group {
            let mut info = AudioFileInfo::new(self.storage.url(&candidate.object), candidate.retry_count);
            if self.lifecycle.inspect_audio {
                info.audio_details = self.inspect(&candidate.object).await;
            }
            files.push(info);
        }

        let definition = self.definition(job_name, &files);
        match self.speech.create_job(&definition).await {
            Ok(job_location) => {
                let message = LifecycleMessage::new(
                    job_location,
                    job_name,
                    &definition.locale,
                    definition.model.is_some(),
                    files,
                );
                publish_json(
                    self.queue.as_ref(),
                    &self.queues.name,
                    &message,
                    self.policy.polling_delay(0),
                )
                .await?;
                self.claim(group, job_name).await?;
                record_best_effort(self.mirror.as_ref(), &message, JobPhase::Submitted, None, None).await;

                summary.submitted_jobs += 1;
                summary.submitted_files += group.len();
                info!(
                    job_name,
                    job_location = %message.job_location,
                    files = group.len(),
                    "Batch submitted"
                );
            }
            Err(e) => self.handle_submission_failure(job_name, group, files, e, summary).await?,
        }
        Ok(())
    }

    async fn handle_submission_failure(
        &self,
        job_name: &str,
        group: &[AudioCandidate],
        files: Vec<AudioFileInfo>,
        err: ProviderError,
        summary: &mut SubmissionSummary,
    ) -> LifecycleResult<()> {
        let retryable = self.policy.classify(&err) == Classification::Retryable;
        warn!(job_name, error = %err, retryable, "Batch submission failed");

        let mut failures = Vec::new();
        for (candidate, file) in group.iter().zip(files) {
            if retryable && self.policy.should_resubmit_file(candidate.retry_count) {
                let event = AudioFileEvent::new(file.file_url.clone(), candidate.retry_count + 1);
                publish_json(
                    self.queue.as_ref(),
                    &self.queues.start_name,
                    &event,
                    self.policy.retry_delay,
                )
                .await?;
                self.claim(std::slice::from_ref(candidate), job_name).await?;
                summary.resubmitted_files += 1;
                continue;
            }

            let name = &candidate.object.name;
            let note = format!(
                "Submission of {name} in job {job_name} failed after {} retries with error: {err}",
                candidate.retry_count
            );
            self.storage
                .write(&self.containers.error_report_output_container, &format!("{name}.txt"), note.as_bytes())
                .await?;
            match self
                .storage
                .move_object(&candidate.object, &self.containers.error_files_output_container, name)
                .await
            {
                Ok(_) => {}
                Err(StorageError::NotFound { .. }) => {
                    warn!(file = %name, "Audio missing, not moved to error files")
                }
                Err(e) => return Err(e.into()),
            }
            failures.push(
                ReportDetail::failed(file.file_url.clone(), err.kind(), err.to_string())
                    .with_advisories(file.advisories()),
            );
        }

        if !failures.is_empty() {
            let report = build_batch_report(job_name, Vec::new(), failures);
            self.storage
                .write(
                    &self.containers.error_report_output_container,
                    &format!("jobs/{job_name}.json"),
                    &report.to_json()?,
                )
                .await?;
            summary.failed_jobs += 1;
            error!(job_name, failed_files = report.failed_count, "Batch submission given up");
        }
        Ok(())
    }

    async fn inspect(&self, object: &ObjectRef) -> Option<batchscribe_transcription::AudioDetails> {
        match self.storage.read(object).await {
            Ok(bytes) => {
                let details = pipeline::inspect(&bytes, &object.name);
                if let Some(e) = &details.error {
                    warn!(file = %object.name, error = %e, "Audio header unreadable, cost estimate skipped");
                }
                Some(details)
            }
            Err(e) => {
                warn!(file = %object.name, error = %e, "Audio not readable for inspection");
                None
            }
        }
    }

    async fn claim(&self, group: &[AudioCandidate], job_name: &str) -> LifecycleResult<()> {
        for candidate in group {
            self.storage
                .write(
                    &self.containers.audio_claimed_container,
                    &candidate.object.name,
                    job_name.as_bytes(),
                )
                .await?;
        }
        Ok(())
    }

    fn definition(&self, job_name: &str, files: &[AudioFileInfo]) -> TranscriptionDefinition {
        let settings = &self.speech_settings;
        TranscriptionDefinition {
            display_name: job_name.to_string(),
            locale: settings.primary_locale().to_string(),
            content_urls: files.iter().map(|f| f.file_url.clone()).collect(),
            model: settings.custom_model().map(|id| EntityReference {
                self_url: SpeechBatchClient::model_url(&settings.endpoint, id),
            }),
            properties: TranscriptionProperties {
                diarization_enabled: settings.add_diarization,
                word_level_timestamps_enabled: settings.add_word_level_timestamps,
                punctuation_mode: settings.punctuation_mode.replace(' ', ""),
                profanity_filter_mode: settings.profanity_filter_mode.clone(),
            },
        }
    }
}

/// `{start:%Y-%m-%dT%H:%M:%S}_{run_id}_{index}`. The run id keeps two
/// invocations started in the same second apart.
pub fn job_name(started_at: DateTime<Utc>, run_id: &str, index: usize) -> String {
    format!("{}_{run_id}_{index}", started_at.format("%Y-%m-%dT%H:%M:%S"))
}

fn run_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

use std::sync::Arc;
use std::time::Duration;

use batchscribe_config::{LifecycleSettings, OutputSettings, QueueSettings, StorageSettings};
use batchscribe_db::models::JobPhase;
use batchscribe_transcription::{
    BatchReport, ReportDetail, TranscriptionResult, build_batch_report, build_html, build_result_json,
    estimate_cost,
};
use tracing::{error, info, warn};

use super::message::{AudioFileEvent, AudioFileInfo, EnrichmentRequestState, EnrichmentStatus, LifecycleMessage};
use super::results::{FetchedResults, fetch_report, fetch_results};
use super::retry::{Classification, RetryDecision, RetryPolicy};
use crate::enrichment::{
    EnrichmentInput, EnrichmentKind, EnrichmentProvider, ProviderRequestStatus, apply_enrichment,
};
use crate::error::{LifecycleError, LifecycleResult, ProviderError, QueueError, StorageError};
use crate::mirror::{JobMirror, record_best_effort};
use crate::queue::{MessageQueue, publish_json};
use crate::speech::{ArtifactKind, BatchTranscriptionService, JobState, ProviderJobError, ProviderReport};
use crate::storage::{ObjectRef, StorageService, file_stem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    /// The provider job has not finished yet.
    Polling,
    /// At least one enrichment request is still running.
    EnrichmentPending,
    /// A retryable failure consumed one execution retry.
    TransientError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The provider job succeeded; per-file outcomes are in the report.
    Succeeded,
    /// The provider job failed or a fatal error ended the batch.
    Failed,
    /// Retryable failures exceeded the retry limit.
    FailedExecution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Requeued {
        reason: RequeueReason,
        delay: Duration,
        message: LifecycleMessage,
    },
    Reported {
        terminal: Terminal,
        report: BatchReport,
    },
}

/// Failure inside one handling step: provider failures go through the retry
/// policy, infrastructure failures go back to the queue.
enum StepError {
    Provider(ProviderError),
    Lifecycle(LifecycleError),
}

impl From<ProviderError> for StepError {
    fn from(err: ProviderError) -> Self {
        StepError::Provider(err)
    }
}

impl From<LifecycleError> for StepError {
    fn from(err: LifecycleError) -> Self {
        StepError::Lifecycle(err)
    }
}

impl From<StorageError> for StepError {
    fn from(err: StorageError) -> Self {
        StepError::Lifecycle(err.into())
    }
}

impl From<QueueError> for StepError {
    fn from(err: QueueError) -> Self {
        StepError::Lifecycle(err.into())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        StepError::Lifecycle(err.into())
    }
}

type StepResult<T> = Result<T, StepError>;

/// Drives one batch per delivery: poll, fetch, enrich, report.
pub struct LifecycleOrchestrator {
    storage: Arc<dyn StorageService>,
    queue: Arc<dyn MessageQueue>,
    speech: Arc<dyn BatchTranscriptionService>,
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    mirror: Arc<dyn JobMirror>,
    containers: StorageSettings,
    output: OutputSettings,
    queues: QueueSettings,
    policy: RetryPolicy,
    enrichment_delay: Duration,
}

impl LifecycleOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageService>,
        queue: Arc<dyn MessageQueue>,
        speech: Arc<dyn BatchTranscriptionService>,
        providers: Vec<Arc<dyn EnrichmentProvider>>,
        mirror: Arc<dyn JobMirror>,
        containers: StorageSettings,
        output: OutputSettings,
        lifecycle: LifecycleSettings,
        queues: QueueSettings,
    ) -> Self {
        let lifecycle = lifecycle.normalized();
        Self {
            storage,
            queue,
            speech,
            providers,
            mirror,
            containers,
            output,
            queues,
            policy: RetryPolicy::from_settings(&lifecycle),
            enrichment_delay: Duration::from_secs(lifecycle.enrichment_polling_delay_secs),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Advances a batch by one step.
    ///
    /// Returns `Err` only for storage, queue or serialization failures; the
    /// caller abandons the delivery and the queue redelivers it unchanged.
    pub async fn handle(&self, mut message: LifecycleMessage) -> LifecycleResult<Outcome> {
        if let Some(report) = self.stored_report(&message.job_name).await? {
            info!(
                job_name = %message.job_name,
                job_location = %message.job_location,
                "Batch already reported, skipping provider calls"
            );
            self.delete_job_best_effort(&message).await;
            let terminal = if report.successful_count == 0 && report.failed_count > 0 {
                Terminal::Failed
            } else {
                Terminal::Succeeded
            };
            return Ok(Outcome::Reported { terminal, report });
        }

        let polling_delay = self.policy.polling_delay(message.polling_counter);
        message.polling_counter = message.polling_counter.saturating_add(1);

        info!(
            job_name = %message.job_name,
            job_location = %message.job_location,
            polling_counter = message.polling_counter,
            failed_execution_counter = message.failed_execution_counter,
            "Handling lifecycle message"
        );

        match self.advance(&mut message, polling_delay).await {
            Ok(outcome) => Ok(outcome),
            Err(StepError::Lifecycle(e)) => Err(e),
            Err(StepError::Provider(e)) => self.on_provider_error(message, e).await,
        }
    }

    async fn advance(&self, message: &mut LifecycleMessage, polling_delay: Duration) -> StepResult<Outcome> {
        let status = self.speech.get_job_status(&message.job_location).await?;
        match status.state {
            JobState::NotStarted | JobState::Running => {
                Ok(self.requeue(message, RequeueReason::Polling, polling_delay).await?)
            }
            JobState::Failed => self.report_failed_job(message, status.error).await,
            JobState::Succeeded => self.on_succeeded(message).await,
        }
    }

    async fn on_succeeded(&self, message: &mut LifecycleMessage) -> StepResult<Outcome> {
        if !self.providers.is_empty() {
            let kinds: Vec<EnrichmentKind> = self.providers.iter().map(|p| p.kind()).collect();

            if !message.all_enrichments_submitted(&kinds) {
                let fetched = fetch_results(self.speech.as_ref(), &self.policy, message).await?;
                self.submit_enrichments(message, &fetched).await?;
                if !message.all_enrichments_completed() {
                    return Ok(self
                        .requeue(message, RequeueReason::EnrichmentPending, self.enrichment_delay)
                        .await?);
                }
                return self.finish(message, fetched).await;
            }

            self.poll_enrichments(message).await?;
            if !message.all_enrichments_completed() {
                return Ok(self
                    .requeue(message, RequeueReason::EnrichmentPending, self.enrichment_delay)
                    .await?);
            }
        }

        let fetched = fetch_results(self.speech.as_ref(), &self.policy, message).await?;
        self.finish(message, fetched).await
    }

    fn provider(&self, kind: EnrichmentKind) -> Option<&Arc<dyn EnrichmentProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    async fn submit_enrichments(&self, message: &mut LifecycleMessage, fetched: &FetchedResults) -> StepResult<()> {
        let locale = message.locale.clone();
        for (index, file) in message.audio_files.iter_mut().enumerate() {
            let file_name = file.file_name();
            for provider in &self.providers {
                let kind = provider.kind();
                if file.enrichment(kind).is_some() {
                    continue;
                }

                let Some(transcript) = fetched.transcripts.get(&index) else {
                    file.set_enrichment(EnrichmentRequestState::failed(kind, "", "no transcript available"));
                    continue;
                };
                if !transcript.all_phrases_succeeded() {
                    file.set_enrichment(EnrichmentRequestState::failed(
                        kind,
                        "",
                        "transcript contains unrecognized phrases",
                    ));
                    continue;
                }

                let input = EnrichmentInput {
                    file_name: &file_name,
                    locale: &locale,
                    transcript,
                };
                match provider.submit(&input).await {
                    Ok(request_id) => file.set_enrichment(EnrichmentRequestState::running(kind, request_id)),
                    Err(e) if self.policy.classify(&e) == Classification::Retryable => return Err(e.into()),
                    Err(e) => {
                        warn!(file = %file_name, kind = %kind, error = %e, "Enrichment submission rejected");
                        file.set_enrichment(EnrichmentRequestState::failed(kind, "", e.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    async fn poll_enrichments(&self, message: &mut LifecycleMessage) -> StepResult<()> {
        for file in &mut message.audio_files {
            for state in &mut file.enrichment_requests {
                if state.status != EnrichmentStatus::Running {
                    continue;
                }
                let Some(provider) = self.provider(state.kind) else {
                    state.status = EnrichmentStatus::Completed;
                    state.error = Some("enrichment kind no longer configured".to_string());
                    continue;
                };
                match provider.poll(&state.request_id).await {
                    Ok(ProviderRequestStatus::Running) => {}
                    Ok(ProviderRequestStatus::Completed) => state.status = EnrichmentStatus::Completed,
                    Ok(ProviderRequestStatus::Failed(reason)) => {
                        state.status = EnrichmentStatus::Completed;
                        state.error = Some(reason);
                    }
                    Err(e) if self.policy.classify(&e) == Classification::Retryable => return Err(e.into()),
                    Err(e) => {
                        state.status = EnrichmentStatus::Completed;
                        state.error = Some(e.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    async fn finish(&self, message: &LifecycleMessage, mut fetched: FetchedResults) -> StepResult<Outcome> {
        let failed_files = fetched.failed_files();
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for (index, file) in message.audio_files.iter().enumerate() {
            let file_name = file.file_name();

            if let Some(transcript) = fetched.transcripts.remove(&index) {
                let detail = self
                    .complete_file(message, file, &file_name, transcript)
                    .await?;
                successes.push(detail);
                continue;
            }

            let (kind, reason) = failed_files.get(&file_name).cloned().unwrap_or_else(|| {
                (
                    "MissingResult".to_string(),
                    "provider returned no transcript for this file".to_string(),
                )
            });
            let note = format!("Transcription \"{file_name}\" failed with error \"{kind}\" and message \"{reason}\"");
            error!(job_name = %message.job_name, file = %file_name, error_kind = %kind, "{note}");
            self.park_failed_file(file, &file_name, &note).await?;
            failures.push(ReportDetail::failed(&file.file_url, kind, reason).with_advisories(file.advisories()));
        }

        let report = build_batch_report(&message.job_name, successes, failures);
        self.write_report(&message.job_name, &report, &fetched.general_errors)
            .await?;
        self.delete_job_best_effort(message).await;
        record_best_effort(self.mirror.as_ref(), message, JobPhase::Reported, Some(&report), None).await;

        info!(
            job_name = %message.job_name,
            successful = report.successful_count,
            failed = report.failed_count,
            "Batch reported"
        );
        Ok(Outcome::Reported {
            terminal: Terminal::Succeeded,
            report,
        })
    }

    /// Applies enrichment results and writes every output of one file.
    async fn complete_file(
        &self,
        message: &LifecycleMessage,
        file: &AudioFileInfo,
        file_name: &str,
        transcript: TranscriptionResult,
    ) -> StepResult<ReportDetail> {
        let mut transcript = transcript;
        let mut outputs = Vec::new();
        let mut enrichment_errors = Vec::new();

        for state in &file.enrichment_requests {
            if let Some(error) = &state.error {
                enrichment_errors.push(format!("{}: {error}", state.kind));
                continue;
            }
            let Some(provider) = self.provider(state.kind) else {
                continue;
            };
            match provider.fetch(&state.request_id).await {
                Ok(result) => {
                    let payload = serde_json::to_vec_pretty(&result.raw)?;
                    let written = self
                        .storage
                        .write(
                            &self.containers.json_result_output_container,
                            &format!("{file_name}.{}.json", state.kind),
                            &payload,
                        )
                        .await?;
                    outputs.push(self.storage.url(&written));
                    enrichment_errors.extend(result.errors.iter().map(|e| format!("{}: {e}", state.kind)));
                    transcript = apply_enrichment(transcript, &result);
                }
                Err(e) if self.policy.classify(&e) == Classification::Retryable => return Err(e.into()),
                Err(e) => enrichment_errors.push(format!("{}: {e}", state.kind)),
            }
        }

        if self.provider(EnrichmentKind::PiiRedaction).is_some() {
            transcript = transcript.keep_best_alternative_only();
        }

        let mut written = self.write_outputs(file, file_name, &transcript, &message.job_name).await?;
        written.extend(outputs);

        let estimated_cost = file.audio_details.as_ref().filter(|d| d.is_valid()).map(|details| {
            estimate_cost(
                details.duration_secs,
                details.channels,
                message.uses_custom_model,
                self.providers.len(),
                transcript.recognized_phrases.len(),
            )
        });

        Ok(ReportDetail::succeeded(&file.file_url, written)
            .with_advisories(file.advisories())
            .with_enrichment_errors(enrichment_errors)
            .with_estimated_cost(estimated_cost))
    }

    async fn write_outputs(
        &self,
        file: &AudioFileInfo,
        file_name: &str,
        transcript: &TranscriptionResult,
        job_name: &str,
    ) -> StepResult<Vec<String>> {
        let containers = &self.containers;
        let mut outputs = Vec::new();

        let json = build_result_json(transcript)?;
        let json_name = format!("{file_name}.json");
        let object = self
            .storage
            .write(&containers.json_result_output_container, &json_name, &json)
            .await?;
        outputs.push(self.storage.url(&object));

        let html = self.output.create_html_result_file.then(|| build_html(transcript, job_name));
        let html_name = format!("{file_name}.html");
        if let Some(html) = &html {
            let object = self
                .storage
                .write(&containers.html_result_output_container, &html_name, html.as_bytes())
                .await?;
            outputs.push(self.storage.url(&object));
        }

        let source = self.input_object(file, file_name);
        if self.output.create_consolidated_output_files {
            let folder = file_stem(file_name);
            let consolidated = &containers.consolidated_files_output_container;
            let audio_copy = ObjectRef::new(consolidated, format!("{folder}/{file_name}"));
            if self.storage.exists(&source).await? {
                let audio = self.storage.read(&source).await?;
                self.storage
                    .write(&audio_copy.container, &audio_copy.name, &audio)
                    .await?;
            } else if !self.storage.exists(&audio_copy).await? {
                warn!(file = %file_name, "Audio missing, consolidated copy skipped");
            }
            self.storage
                .write(consolidated, &format!("{folder}/{json_name}"), &json)
                .await?;
            if let Some(html) = &html {
                self.storage
                    .write(consolidated, &format!("{folder}/{html_name}"), html.as_bytes())
                    .await?;
            }
        }

        if self.output.create_audio_processed_container {
            match self
                .storage
                .move_object(&source, &containers.audio_processed_container, file_name)
                .await
            {
                Ok(_) => {}
                Err(StorageError::NotFound { .. }) => {
                    warn!(file = %file_name, "Audio missing, not moved to processed container")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(outputs)
    }

    fn input_object(&self, file: &AudioFileInfo, file_name: &str) -> ObjectRef {
        self.storage
            .parse_url(&file.file_url)
            .unwrap_or_else(|| ObjectRef::new(&self.containers.audio_input_container, file_name))
    }

    /// Writes `{file}.txt` next to the error reports and moves the audio to
    /// the error-files container.
    async fn park_failed_file(&self, file: &AudioFileInfo, file_name: &str, note: &str) -> LifecycleResult<()> {
        self.storage
            .write(
                &self.containers.error_report_output_container,
                &format!("{file_name}.txt"),
                note.as_bytes(),
            )
            .await?;
        let source = self.input_object(file, file_name);
        match self
            .storage
            .move_object(&source, &self.containers.error_files_output_container, file_name)
            .await
        {
            Ok(_) => Ok(()),
            Err(StorageError::NotFound { .. }) => {
                warn!(file = %file_name, "Audio missing, not moved to error files");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The batch report of an earlier delivery of this job, if one was written.
    /// The remote job is deleted right after the report, so a redelivered
    /// message must not poll it again.
    async fn stored_report(&self, job_name: &str) -> LifecycleResult<Option<BatchReport>> {
        let object = ObjectRef::new(&self.containers.report_output_container, format!("jobs/{job_name}.json"));
        if !self.storage.exists(&object).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(&object).await?;
        match serde_json::from_slice(&bytes) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                warn!(job_name, error = %e, "Stored report unreadable, batch will be reported again");
                Ok(None)
            }
        }
    }

    /// Writes the batch report keyed by job name, plus a text summary when
    /// anything failed.
    async fn write_report(
        &self,
        job_name: &str,
        report: &BatchReport,
        general_errors: &[String],
    ) -> LifecycleResult<()> {
        let containers = &self.containers;
        self.storage
            .write(
                &containers.report_output_container,
                &format!("jobs/{job_name}.json"),
                &report.to_json()?,
            )
            .await?;
        self.storage
            .write(
                &containers.report_output_container,
                &format!("jobs/{job_name}.csv"),
                report.to_csv().as_bytes(),
            )
            .await?;

        if !report.is_fully_successful() || !general_errors.is_empty() {
            let mut text = report.to_error_text();
            for line in general_errors {
                text.push_str(line);
                text.push('\n');
            }
            self.storage
                .write(
                    &containers.error_report_output_container,
                    &format!("jobs/{job_name}.txt"),
                    text.as_bytes(),
                )
                .await?;
        }
        Ok(())
    }

    /// The provider reported the whole job as failed. Files whose error may be
    /// transient go back to the start queue while their retry budget lasts.
    async fn report_failed_job(
        &self,
        message: &mut LifecycleMessage,
        job_error: Option<ProviderJobError>,
    ) -> StepResult<Outcome> {
        let job_error = job_error.unwrap_or_else(|| ProviderJobError {
            code: "unknown".to_string(),
            message: "unknown".to_string(),
        });
        let summary = format!(
            "Got failed transcription for job {} with error {} (Error code: {}).",
            message.job_name, job_error.message, job_error.code
        );
        error!(job_name = %message.job_name, code = %job_error.code, "{summary}");

        let mut general_errors = vec![summary];
        if let Some(report) = self.provider_report_best_effort(message).await {
            general_errors.push(format!("Report file: {}", serde_json::to_string(&report)?));
        }

        let resubmit = job_error.is_retryable_code();
        let mut failures = Vec::new();
        for file in &message.audio_files {
            let file_name = file.file_name();
            if resubmit && self.policy.should_resubmit_file(file.retry_count) {
                let event = AudioFileEvent::new(file.file_url.clone(), file.retry_count + 1);
                publish_json(self.queue.as_ref(), &self.queues.start_name, &event, self.policy.retry_delay).await?;
                info!(file = %file_name, retry_count = file.retry_count, "Audio resubmitted");
                failures.push(
                    ReportDetail::failed(&file.file_url, &job_error.code, &job_error.message).with_advisories(
                        [file.advisories(), vec![format!("Resubmitted as attempt {}", file.retry_count + 1)]].concat(),
                    ),
                );
                continue;
            }

            let note = format!(
                "Failed transcription with name {file_name} in job {} after {} retries with error: {} (Error: {}).",
                message.job_name, file.retry_count, job_error.message, job_error.code
            );
            self.park_failed_file(file, &file_name, &note).await?;
            failures.push(
                ReportDetail::failed(&file.file_url, &job_error.code, &job_error.message)
                    .with_advisories(file.advisories()),
            );
        }

        let report = build_batch_report(&message.job_name, Vec::new(), failures);
        self.write_report(&message.job_name, &report, &general_errors).await?;
        self.delete_job_best_effort(message).await;
        record_best_effort(
            self.mirror.as_ref(),
            message,
            JobPhase::Failed,
            Some(&report),
            Some(&job_error.message),
        )
        .await;

        Ok(Outcome::Reported {
            terminal: Terminal::Failed,
            report,
        })
    }

    async fn provider_report_best_effort(&self, message: &LifecycleMessage) -> Option<ProviderReport> {
        let artifacts = match self.speech.list_result_artifacts(&message.job_location).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!(job_name = %message.job_name, error = %e, "Result artifacts not listed");
                return None;
            }
        };
        let artifact = artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::TranscriptionReport)?;
        match fetch_report(self.speech.as_ref(), artifact).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(job_name = %message.job_name, error = %e, "Provider report not fetched");
                None
            }
        }
    }

    async fn on_provider_error(&self, mut message: LifecycleMessage, err: ProviderError) -> LifecycleResult<Outcome> {
        match self.policy.classify(&err) {
            Classification::Retryable => {
                match self.policy.register_failure(&mut message.failed_execution_counter) {
                    RetryDecision::Retry { delay } => {
                        warn!(
                            job_name = %message.job_name,
                            failed_execution_counter = message.failed_execution_counter,
                            delay_secs = delay.as_secs(),
                            error = %err,
                            "Transient provider failure, retrying"
                        );
                        self.requeue(&message, RequeueReason::TransientError, delay).await
                    }
                    RetryDecision::Escalate => {
                        self.fail_batch(&message, &err, Terminal::FailedExecution).await
                    }
                }
            }
            Classification::Fatal => self.fail_batch(&message, &err, Terminal::Failed).await,
        }
    }

    /// Reports every file of the batch as failed with `err`.
    async fn fail_batch(
        &self,
        message: &LifecycleMessage,
        err: &ProviderError,
        terminal: Terminal,
    ) -> LifecycleResult<Outcome> {
        let reason = match terminal {
            Terminal::FailedExecution => format!(
                "{err} in job {} at {} (gave up after {} failed executions)",
                message.job_name, message.job_location, message.failed_execution_counter
            ),
            _ => format!("{err} in job {} at {}", message.job_name, message.job_location),
        };
        error!(job_name = %message.job_name, terminal = ?terminal, "{reason}");

        let mut failures = Vec::new();
        for file in &message.audio_files {
            let file_name = file.file_name();
            self.park_failed_file(file, &file_name, &reason).await?;
            failures.push(ReportDetail::failed(&file.file_url, err.kind(), &reason).with_advisories(file.advisories()));
        }

        let report = build_batch_report(&message.job_name, Vec::new(), failures);
        self.write_report(&message.job_name, &report, &[]).await?;
        self.delete_job_best_effort(message).await;
        record_best_effort(self.mirror.as_ref(), message, JobPhase::Failed, Some(&report), Some(&reason)).await;

        Ok(Outcome::Reported { terminal, report })
    }

    async fn delete_job_best_effort(&self, message: &LifecycleMessage) {
        if let Err(e) = self.speech.delete_job(&message.job_location).await {
            warn!(
                job_name = %message.job_name,
                job_location = %message.job_location,
                error = %e,
                "Provider job deletion failed"
            );
        }
    }

    async fn requeue(
        &self,
        message: &LifecycleMessage,
        reason: RequeueReason,
        delay: Duration,
    ) -> LifecycleResult<Outcome> {
        publish_json(self.queue.as_ref(), &self.queues.name, message, delay).await?;

        let phase = match reason {
            RequeueReason::Polling => JobPhase::Polling,
            RequeueReason::EnrichmentPending => JobPhase::EnrichmentPending,
            RequeueReason::TransientError => JobPhase::Retrying,
        };
        record_best_effort(self.mirror.as_ref(), message, phase, None, None).await;

        info!(
            job_name = %message.job_name,
            reason = ?reason,
            polling_counter = message.polling_counter,
            failed_execution_counter = message.failed_execution_counter,
            delay_secs = delay.as_secs(),
            "Lifecycle message requeued"
        );
        Ok(Outcome::Requeued {
            reason,
            delay,
            message: message.clone(),
        })
    }
}

/// Short label for logs and the scan endpoint summary.
pub fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Requeued { reason: RequeueReason::Polling, .. } => "polling",
        Outcome::Requeued { reason: RequeueReason::EnrichmentPending, .. } => "enrichment-pending",
        Outcome::Requeued { reason: RequeueReason::TransientError, .. } => "retrying",
        Outcome::Reported { terminal: Terminal::Succeeded, .. } => "reported",
        Outcome::Reported { terminal: Terminal::Failed, .. } => "failed",
        Outcome::Reported { terminal: Terminal::FailedExecution, .. } => "failed-execution",
    }
}

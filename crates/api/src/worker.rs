//! Queue consumer and scan trigger: the glue between the queues and the
//! lifecycle services.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use batchscribe_config::{LifecycleSettings, QueueSettings};
use batchscribe_services::error::{LifecycleResult, QueueError};
use batchscribe_services::lifecycle::{
    AudioCandidate, AudioFileEvent, JobSubmissionScheduler, LifecycleMessage, LifecycleOrchestrator,
    SubmissionSummary, outcome_label,
};
use batchscribe_services::queue::{Delivery, MessageQueue, publish_json};
use batchscribe_services::storage::StorageService;
use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What happened to one lifecycle delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Handled and completed; carries the outcome label.
    Handled(&'static str),
    /// Released for redelivery after the lock duration.
    Abandoned,
    /// Unparseable past `max_delivery_count`; dropped.
    DeadLettered,
}

pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    orchestrator: Arc<LifecycleOrchestrator>,
    queue_name: String,
    lock: Duration,
    idle: Duration,
    max_delivery_count: u32,
    concurrency: usize,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        orchestrator: Arc<LifecycleOrchestrator>,
        queues: &QueueSettings,
        lifecycle: &LifecycleSettings,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            queue_name: queues.name.clone(),
            lock: Duration::from_secs(lifecycle.lock_duration_secs),
            idle: Duration::from_millis(queues.receive_idle_ms),
            max_delivery_count: lifecycle.max_delivery_count,
            concurrency: lifecycle.consumer_concurrency.max(1),
        }
    }

    /// Receives and processes at most one lifecycle message.
    pub async fn process_next(&self) -> Result<Option<ConsumeOutcome>, QueueError> {
        let Some(delivery) = self.queue.receive(&self.queue_name, self.lock).await? else {
            return Ok(None);
        };
        self.process(delivery).await.map(Some)
    }

    async fn process(&self, delivery: Delivery) -> Result<ConsumeOutcome, QueueError> {
        let message = match LifecycleMessage::from_json(&delivery.payload) {
            Ok(message) => message,
            Err(e) => return self.reject_malformed(&delivery, &e.to_string()).await,
        };

        match self.orchestrator.handle(message).await {
            Ok(outcome) => {
                self.queue.complete(&delivery).await?;
                Ok(ConsumeOutcome::Handled(outcome_label(&outcome)))
            }
            Err(e) => {
                warn!(
                    delivery_id = %delivery.id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "Lifecycle step failed, message will be redelivered"
                );
                self.queue.abandon(&delivery, self.lock).await?;
                Ok(ConsumeOutcome::Abandoned)
            }
        }
    }

    async fn reject_malformed(&self, delivery: &Delivery, reason: &str) -> Result<ConsumeOutcome, QueueError> {
        if delivery.delivery_count >= self.max_delivery_count {
            error!(
                delivery_id = %delivery.id,
                delivery_count = delivery.delivery_count,
                payload = %delivery.payload,
                reason,
                "Malformed lifecycle message dead-lettered"
            );
            self.queue.complete(delivery).await?;
            return Ok(ConsumeOutcome::DeadLettered);
        }
        warn!(delivery_id = %delivery.id, reason, "Malformed lifecycle message");
        self.queue.abandon(delivery, self.lock).await?;
        Ok(ConsumeOutcome::Abandoned)
    }

    /// Runs `consumer_concurrency` polling loops until the task is dropped.
    /// Dropping the future aborts every loop.
    pub async fn run(self: Arc<Self>) {
        info!(
            queue = %self.queue_name,
            backend = self.queue.name(),
            concurrency = self.concurrency,
            "Lifecycle consumer started"
        );
        let mut workers = JoinSet::new();
        for worker in 0..self.concurrency {
            workers.spawn(self.clone().poll(worker));
        }
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Lifecycle worker stopped");
            }
        }
    }

    async fn poll(self: Arc<Self>, worker: usize) {
        loop {
            match self.process_next().await {
                Ok(Some(outcome)) => debug!(worker, outcome = ?outcome, "Lifecycle delivery processed"),
                Ok(None) => tokio::time::sleep(self.idle).await,
                Err(e) => {
                    error!(error = %e, "Lifecycle queue unavailable");
                    tokio::time::sleep(self.idle).await;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub start_events: usize,
    pub discovered: usize,
    pub submitted_jobs: usize,
    pub submitted_files: usize,
    pub failed_jobs: usize,
    pub resubmitted_files: usize,
    pub deferred_files: usize,
    pub job_names: Vec<String>,
}

impl ScanSummary {
    fn with_submission(mut self, summary: &SubmissionSummary) -> Self {
        self.submitted_jobs = summary.submitted_jobs;
        self.submitted_files = summary.submitted_files;
        self.failed_jobs = summary.failed_jobs;
        self.resubmitted_files = summary.resubmitted_files;
        self.deferred_files = summary.deferred_files;
        self.job_names = summary.job_names.clone();
        self
    }
}

/// Collects start-queue events and unclaimed input files and submits them.
pub struct ScanTrigger {
    storage: Arc<dyn StorageService>,
    queue: Arc<dyn MessageQueue>,
    scheduler: Arc<JobSubmissionScheduler>,
    start_queue: String,
    lock: Duration,
    max_events: usize,
    max_delivery_count: u32,
    running: tokio::sync::Mutex<()>,
}

impl ScanTrigger {
    pub fn new(
        storage: Arc<dyn StorageService>,
        queue: Arc<dyn MessageQueue>,
        scheduler: Arc<JobSubmissionScheduler>,
        queues: QueueSettings,
        lifecycle: LifecycleSettings,
    ) -> Self {
        Self {
            storage,
            queue,
            scheduler,
            start_queue: queues.start_name,
            lock: Duration::from_secs(lifecycle.lock_duration_secs),
            max_events: lifecycle
                .files_per_transcription_job
                .saturating_mul(lifecycle.messages_per_function_execution),
            max_delivery_count: lifecycle.max_delivery_count,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Publishes an upload event for `file_url` on the start queue.
    pub async fn enqueue_upload(&self, file_url: &str) -> Result<String, QueueError> {
        let event = AudioFileEvent::new(file_url, 0);
        publish_json(self.queue.as_ref(), &self.start_queue, &event, Duration::ZERO).await
    }

    /// One scheduler invocation. Overlapping calls wait for each other.
    pub async fn scan(&self) -> LifecycleResult<ScanSummary> {
        let _guard = self.running.lock().await;

        let (mut candidates, deliveries) = self.drain_start_queue().await?;
        let start_events = candidates.len();

        let mut seen: HashSet<_> = candidates.iter().map(|c| c.object.clone()).collect();
        let mut discovered = 0;
        for candidate in self.scheduler.discover().await? {
            if seen.insert(candidate.object.clone()) {
                discovered += 1;
                candidates.push(candidate);
            }
        }

        let summary = ScanSummary {
            start_events,
            discovered,
            ..ScanSummary::default()
        };
        if candidates.is_empty() {
            return Ok(summary);
        }

        match self.scheduler.run(candidates, Utc::now()).await {
            Ok(submission) => {
                for delivery in &deliveries {
                    self.queue.complete(delivery).await?;
                }
                Ok(summary.with_submission(&submission))
            }
            Err(e) => {
                for delivery in &deliveries {
                    if let Err(abandon) = self.queue.abandon(delivery, self.lock).await {
                        warn!(delivery_id = %delivery.id, error = %abandon, "Start event not released");
                    }
                }
                Err(e)
            }
        }
    }

    async fn drain_start_queue(&self) -> LifecycleResult<(Vec<AudioCandidate>, Vec<Delivery>)> {
        let mut candidates = Vec::new();
        let mut deliveries = Vec::new();

        while deliveries.len() < self.max_events {
            let Some(delivery) = self.queue.receive(&self.start_queue, self.lock).await? else {
                break;
            };

            let event = match serde_json::from_str::<AudioFileEvent>(&delivery.payload) {
                Ok(event) => event,
                Err(e) => {
                    self.reject_start_event(&delivery, &e.to_string()).await?;
                    continue;
                }
            };
            let Some(object) = self.storage.parse_url(&event.file_url) else {
                error!(file_url = %event.file_url, "Start event points outside storage, dropped");
                self.queue.complete(&delivery).await?;
                continue;
            };

            candidates.push(AudioCandidate::new(object, event.retry_count));
            deliveries.push(delivery);
        }
        Ok((candidates, deliveries))
    }

    async fn reject_start_event(&self, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        if delivery.delivery_count >= self.max_delivery_count {
            error!(delivery_id = %delivery.id, payload = %delivery.payload, reason, "Malformed start event dead-lettered");
            return self.queue.complete(delivery).await;
        }
        warn!(delivery_id = %delivery.id, reason, "Malformed start event");
        self.queue.abandon(delivery, self.lock).await
    }
}

use std::sync::Arc;

use anyhow::Context;
use batchscribe_config::{QueueBackend, Settings};
use batchscribe_services::enrichment::{EnrichmentProvider, build_providers};
use batchscribe_services::lifecycle::{JobSubmissionScheduler, LifecycleOrchestrator};
use batchscribe_services::mirror::{JobMirror, MongoJobMirror, NoopMirror};
use batchscribe_services::queue::{MemoryQueue, MessageQueue, RedisQueue};
use batchscribe_services::speech::{BatchTranscriptionService, SpeechBatchClient};
use batchscribe_services::storage::{LocalStorage, StorageService};
use tracing::info;

use crate::worker::{QueueConsumer, ScanTrigger};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: Arc<dyn MessageQueue>,
    pub scan: Arc<ScanTrigger>,
    pub consumer: Arc<QueueConsumer>,
}

impl AppState {
    /// Connects every collaborator named in `settings`.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let storage: Arc<dyn StorageService> = Arc::new(LocalStorage::new(&settings.storage.root));

        let queue: Arc<dyn MessageQueue> = match settings.queue.backend {
            QueueBackend::Memory => Arc::new(MemoryQueue::new()),
            QueueBackend::Redis => Arc::new(
                RedisQueue::connect(&settings.queue.redis_url)
                    .await
                    .context("connecting to the Redis queue")?,
            ),
        };

        let speech: Arc<dyn BatchTranscriptionService> =
            Arc::new(SpeechBatchClient::new(&settings.speech).context("building the speech client")?);

        let providers = build_providers(
            &settings.enrichment,
            storage.clone(),
            &settings.storage.json_result_output_container,
            settings.speech.request_timeout_secs,
        )
        .context("building enrichment providers")?;

        let mirror: Arc<dyn JobMirror> = if settings.database.enabled {
            let db = batchscribe_db::connect(&settings.database)
                .await
                .context("connecting to MongoDB")?;
            Arc::new(MongoJobMirror::new(&db))
        } else {
            Arc::new(NoopMirror)
        };

        info!(
            queue = queue.name(),
            speech = speech.name(),
            enrichment_providers = providers.len(),
            "Collaborators ready"
        );

        Ok(Self::from_parts(settings, storage, queue, speech, providers, mirror))
    }

    /// Wires the scheduler, orchestrator and triggers around ready collaborators.
    pub fn from_parts(
        settings: Settings,
        storage: Arc<dyn StorageService>,
        queue: Arc<dyn MessageQueue>,
        speech: Arc<dyn BatchTranscriptionService>,
        providers: Vec<Arc<dyn EnrichmentProvider>>,
        mirror: Arc<dyn JobMirror>,
    ) -> Self {
        let settings = settings.normalized();

        let scheduler = Arc::new(JobSubmissionScheduler::new(
            storage.clone(),
            queue.clone(),
            speech.clone(),
            mirror.clone(),
            settings.speech.clone(),
            settings.storage.clone(),
            settings.lifecycle.clone(),
            settings.queue.clone(),
        ));
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            storage.clone(),
            queue.clone(),
            speech,
            providers,
            mirror,
            settings.storage.clone(),
            settings.output.clone(),
            settings.lifecycle.clone(),
            settings.queue.clone(),
        ));

        let scan = Arc::new(ScanTrigger::new(
            storage,
            queue.clone(),
            scheduler,
            settings.queue.clone(),
            settings.lifecycle.clone(),
        ));
        let consumer = Arc::new(QueueConsumer::new(
            queue.clone(),
            orchestrator,
            &settings.queue,
            &settings.lifecycle,
        ));

        Self {
            settings: Arc::new(settings),
            queue,
            scan,
            consumer,
        }
    }
}

use std::sync::Arc;

use batchscribe_api::state::AppState;
use batchscribe_config::Settings;
use batchscribe_services::enrichment::EnrichmentProvider;
use batchscribe_services::lifecycle::{JobSubmissionScheduler, LifecycleMessage, LifecycleOrchestrator};
use batchscribe_services::mirror::NoopMirror;
use batchscribe_services::queue::MemoryQueue;
use batchscribe_services::storage::{LocalStorage, ObjectRef, StorageService};
use batchscribe_transcription::BatchReport;
use tempfile::TempDir;

use super::fake_speech::FakeSpeech;

/// Temp-dir storage, in-memory queue and a scripted speech service.
pub struct Harness {
    _dir: TempDir,
    pub settings: Settings,
    pub storage: Arc<LocalStorage>,
    pub queue: Arc<MemoryQueue>,
    pub speech: Arc<FakeSpeech>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.storage.root = dir.path().to_string_lossy().into_owned();
        configure(&mut settings);

        Self {
            storage: Arc::new(LocalStorage::new(dir.path())),
            _dir: dir,
            settings: settings.normalized(),
            queue: Arc::new(MemoryQueue::new()),
            speech: Arc::new(FakeSpeech::new()),
        }
    }

    pub fn scheduler(&self) -> JobSubmissionScheduler {
        JobSubmissionScheduler::new(
            self.storage.clone(),
            self.queue.clone(),
            self.speech.clone(),
            Arc::new(NoopMirror),
            self.settings.speech.clone(),
            self.settings.storage.clone(),
            self.settings.lifecycle.clone(),
            self.settings.queue.clone(),
        )
    }

    pub fn orchestrator(&self, providers: Vec<Arc<dyn EnrichmentProvider>>) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(
            self.storage.clone(),
            self.queue.clone(),
            self.speech.clone(),
            providers,
            Arc::new(NoopMirror),
            self.settings.storage.clone(),
            self.settings.output.clone(),
            self.settings.lifecycle.clone(),
            self.settings.queue.clone(),
        )
    }

    pub fn app_state(&self, providers: Vec<Arc<dyn EnrichmentProvider>>) -> AppState {
        AppState::from_parts(
            self.settings.clone(),
            self.storage.clone(),
            self.queue.clone(),
            self.speech.clone(),
            providers,
            Arc::new(NoopMirror),
        )
    }

    /// Writes `bytes` into the audio input container.
    pub async fn upload(&self, name: &str, bytes: &[u8]) -> ObjectRef {
        self.storage
            .write(&self.settings.storage.audio_input_container, name, bytes)
            .await
            .unwrap()
    }

    pub fn input(&self, name: &str) -> ObjectRef {
        ObjectRef::new(&self.settings.storage.audio_input_container, name)
    }

    pub async fn exists(&self, container: &str, name: &str) -> bool {
        self.storage.exists(&ObjectRef::new(container, name)).await.unwrap()
    }

    pub async fn read_string(&self, container: &str, name: &str) -> String {
        let bytes = self.storage.read(&ObjectRef::new(container, name)).await.unwrap();
        String::from_utf8(bytes).unwrap()
    }

    pub async fn report(&self, job_name: &str) -> Option<BatchReport> {
        let object = ObjectRef::new(&self.settings.storage.report_output_container, format!("jobs/{job_name}.json"));
        if !self.storage.exists(&object).await.unwrap() {
            return None;
        }
        let bytes = self.storage.read(&object).await.unwrap();
        Some(serde_json::from_slice(&bytes).unwrap())
    }

    /// Lifecycle messages waiting on the lifecycle queue, in publish order.
    pub fn lifecycle_messages(&self) -> Vec<LifecycleMessage> {
        self.queue
            .pending(&self.settings.queue.name)
            .into_iter()
            .map(|(payload, _)| LifecycleMessage::from_json(&payload).unwrap())
            .collect()
    }

    /// Submits every uploaded file and returns the published lifecycle message.
    pub async fn submit_uploaded(&self) -> LifecycleMessage {
        let scheduler = self.scheduler();
        let candidates = scheduler.discover().await.unwrap();
        scheduler.run(candidates, chrono::Utc::now()).await.unwrap();
        let mut messages = self.lifecycle_messages();
        assert_eq!(messages.len(), 1, "expected exactly one submitted batch");
        messages.remove(0)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

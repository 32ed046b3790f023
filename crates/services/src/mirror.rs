use async_trait::async_trait;
use batchscribe_db::models::{JobPhase, TranscriptionJob};
use batchscribe_transcription::BatchReport;
use bson::{DateTime, doc};
use mongodb::{Collection, Database};
use tracing::warn;

use crate::error::MirrorError;
use crate::lifecycle::LifecycleMessage;

/// Optional dashboard copy of batch progress. Never read by the pipeline.
#[async_trait]
pub trait JobMirror: Send + Sync + 'static {
    async fn record(
        &self,
        message: &LifecycleMessage,
        phase: JobPhase,
        report: Option<&BatchReport>,
        last_error: Option<&str>,
    ) -> Result<(), MirrorError>;
}

/// Records and logs mirror failures without propagating them.
pub async fn record_best_effort(
    mirror: &dyn JobMirror,
    message: &LifecycleMessage,
    phase: JobPhase,
    report: Option<&BatchReport>,
    last_error: Option<&str>,
) {
    if let Err(e) = mirror.record(message, phase, report, last_error).await {
        warn!(job_name = %message.job_name, error = %e, "Job mirror update failed");
    }
}

pub struct NoopMirror;

#[async_trait]
impl JobMirror for NoopMirror {
    async fn record(
        &self,
        _message: &LifecycleMessage,
        _phase: JobPhase,
        _report: Option<&BatchReport>,
        _last_error: Option<&str>,
    ) -> Result<(), MirrorError> {
        Ok(())
    }
}

/// Upserts one document per job name.
pub struct MongoJobMirror {
    collection: Collection<TranscriptionJob>,
}

impl MongoJobMirror {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(TranscriptionJob::COLLECTION),
        }
    }
}

#[async_trait]
impl JobMirror for MongoJobMirror {
    async fn record(
        &self,
        message: &LifecycleMessage,
        phase: JobPhase,
        report: Option<&BatchReport>,
        last_error: Option<&str>,
    ) -> Result<(), MirrorError> {
        let now = DateTime::now();
        let file_urls: Vec<&str> = message.audio_files.iter().map(|f| f.file_url.as_str()).collect();

        let mut set = doc! {
            "job_location": &message.job_location,
            "locale": &message.locale,
            "phase": bson::to_bson(&phase)?,
            "uses_custom_model": message.uses_custom_model,
            "polling_counter": message.polling_counter as i64,
            "failed_execution_counter": message.failed_execution_counter as i64,
            "file_urls": file_urls,
            "updated_at": now,
        };
        if let Some(report) = report {
            set.insert("successful_count", report.successful_count as i64);
            set.insert("failed_count", report.failed_count as i64);
        }
        if let Some(error) = last_error {
            set.insert("last_error", error);
        }

        self.collection
            .update_one(
                doc! { "job_name": &message.job_name },
                doc! {
                    "$set": set,
                    "$setOnInsert": { "created_at": now },
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}

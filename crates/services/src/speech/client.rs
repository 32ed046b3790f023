use std::time::Duration;

use async_trait::async_trait;
use batchscribe_config::SpeechSettings;
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    ArtifactKind, BatchTranscriptionService, JobState, JobStatus, ProviderJobError, ResultArtifact,
    TranscriptionDefinition,
};
use crate::error::ProviderError;
use crate::http::{check_status, is_not_found, read_json, trim_endpoint};

const API_PATH: &str = "speechtotext/v3.1";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Deserialize)]
struct CreatedTranscription {
    #[serde(rename = "self")]
    self_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResource {
    status: String,
    #[serde(default)]
    properties: Option<TranscriptionResourceProperties>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResourceProperties {
    #[serde(default)]
    error: Option<ResourceError>,
}

#[derive(Debug, Deserialize)]
struct ResourceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilePage {
    #[serde(default)]
    values: Vec<FileEntry>,
    #[serde(rename = "@nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    #[serde(default)]
    name: String,
    kind: String,
    links: FileLinks,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileLinks {
    content_url: String,
}

/// REST client for the v3.1 batch transcription API.
pub struct SpeechBatchClient {
    endpoint: String,
    key: String,
    client: reqwest::Client,
}

impl SpeechBatchClient {
    pub fn new(settings: &SpeechSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: trim_endpoint(&settings.endpoint).to_string(),
            key: settings.subscription_key.clone(),
            client,
        })
    }

    /// URL of a custom model, as referenced from a job definition.
    pub fn model_url(endpoint: &str, model_id: &str) -> String {
        format!("{}/{API_PATH}/models/{model_id}", trim_endpoint(endpoint))
    }
}

#[async_trait]
impl BatchTranscriptionService for SpeechBatchClient {
    fn name(&self) -> &str {
        "speech-batch-v3.1"
    }

    async fn create_job(&self, definition: &TranscriptionDefinition) -> Result<String, ProviderError> {
        let url = format!("{}/{API_PATH}/transcriptions", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .header(KEY_HEADER, &self.key)
            .json(definition)
            .send()
            .await?;

        let location_header = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let created: CreatedTranscription = read_json(resp).await?;
        let location = location_header.unwrap_or(created.self_url);

        info!(
            job_name = %definition.display_name,
            job_location = %location,
            files = definition.content_urls.len(),
            "Transcription job created"
        );
        Ok(location)
    }

    async fn get_job_status(&self, job_location: &str) -> Result<JobStatus, ProviderError> {
        let resp = self
            .client
            .get(job_location)
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        let resource: TranscriptionResource = read_json(resp).await?;
        let state = JobState::parse(&resource.status)?;

        let error = resource
            .properties
            .and_then(|p| p.error)
            .map(|e| ProviderJobError {
                code: e.code.unwrap_or_else(|| "unknown".to_string()),
                message: e.message.unwrap_or_else(|| "unknown".to_string()),
            });
        debug!(job_location, status = ?state, "Transcription status polled");
        Ok(JobStatus { state, error })
    }

    async fn list_result_artifacts(&self, job_location: &str) -> Result<Vec<ResultArtifact>, ProviderError> {
        let mut artifacts = Vec::new();
        let mut next = Some(format!("{job_location}/files"));

        while let Some(url) = next.take() {
            let resp = self
                .client
                .get(&url)
                .header(KEY_HEADER, &self.key)
                .send()
                .await?;
            let page: FilePage = read_json(resp).await?;
            artifacts.extend(page.values.into_iter().map(|f| ResultArtifact {
                name: f.name,
                kind: ArtifactKind::parse(&f.kind),
                content_url: f.links.content_url,
            }));
            next = page.next_link.filter(|link| !link.is_empty());
        }

        debug!(job_location, count = artifacts.len(), "Result artifacts listed");
        Ok(artifacts)
    }

    async fn fetch_artifact(&self, artifact: &ResultArtifact) -> Result<Vec<u8>, ProviderError> {
        // Content URLs carry their own SAS token.
        let resp = self.client.get(&artifact.content_url).send().await?;
        if is_not_found(resp.status()) {
            return Err(ProviderError::NotFound(artifact.name.clone()));
        }
        let resp = check_status(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn delete_job(&self, job_location: &str) -> Result<(), ProviderError> {
        let resp = self
            .client
            .delete(job_location)
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        if is_not_found(resp.status()) {
            debug!(job_location, "Transcription job already deleted");
            return Ok(());
        }
        check_status(resp).await?;
        info!(job_location, "Transcription job deleted");
        Ok(())
    }
}

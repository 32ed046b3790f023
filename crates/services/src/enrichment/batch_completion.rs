use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use batchscribe_config::EnrichmentSettings;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{
    EnrichmentInput, EnrichmentKind, EnrichmentProvider, EnrichmentResult, ProviderRequestStatus,
    conversation_transcript,
};
use crate::error::ProviderError;
use crate::http::{check_status, read_json, trim_endpoint};
use crate::storage::{ObjectRef, StorageService};

const API_VERSION: &str = "2023-05-04-preview";
const KEY_HEADER: &str = "api-key";
const DEFAULT_MODEL: &str = "gpt-35-turbo";
const MAX_TOKENS: u32 = 1024;
const REQUEST_PREFIX: &str = "completion-requests";
const RESULT_PREFIX: &str = "completion-results";

/// LLM batch completion. The prompt file is staged in storage as JSON Lines
/// and the service writes its answers back as another JSON Lines file.
pub struct BatchCompletionProvider {
    endpoint: String,
    key: String,
    model: String,
    prompt: String,
    storage: Arc<dyn StorageService>,
    container: String,
    client: reqwest::Client,
}

impl BatchCompletionProvider {
    pub fn new(
        settings: &EnrichmentSettings,
        storage: Arc<dyn StorageService>,
        container: &str,
        request_timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let model = if settings.openai_deployment.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            settings.openai_deployment.clone()
        };
        Ok(Self {
            endpoint: trim_endpoint(&settings.openai_endpoint).to_string(),
            key: settings.openai_key.clone(),
            model,
            prompt: settings.batch_completion_prompt.clone().unwrap_or_default(),
            storage,
            container: container.to_string(),
            client,
        })
    }

    async fn get_operation(&self, request_id: &str) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .get(request_id)
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        if let Some(object) = self.storage.parse_url(url) {
            return self
                .storage
                .read(&object)
                .await
                .map_err(|e| ProviderError::NotFound(e.to_string()));
        }
        let resp = check_status(self.client.get(url).send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// One JSON Lines request per prompt.
pub fn build_request_lines(prompt: &str, transcript: &str) -> String {
    let mut lines = json!({
        "prompt": format!("{prompt}\n\n{transcript}"),
        "max_tokens": MAX_TOKENS,
    })
    .to_string();
    lines.push('\n');
    lines
}

/// Parses a JSON Lines result file; unparsable lines are reported, not fatal.
pub fn parse_result_lines(content: &str) -> (Vec<Value>, Vec<String>) {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(e) => errors.push(format!("line {}: {e}", index + 1)),
        }
    }
    (values, errors)
}

fn map_status(status: &str) -> ProviderRequestStatus {
    match status.to_ascii_lowercase().as_str() {
        "completed" | "succeeded" => ProviderRequestStatus::Completed,
        "failed" | "cancelled" | "canceled" | "expired" => {
            ProviderRequestStatus::Failed(format!("batch completion {status}"))
        }
        _ => ProviderRequestStatus::Running,
    }
}

#[async_trait]
impl EnrichmentProvider for BatchCompletionProvider {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::BatchCompletion
    }

    async fn submit(&self, input: &EnrichmentInput<'_>) -> Result<String, ProviderError> {
        let transcript = conversation_transcript(input.transcript);
        if transcript.is_empty() {
            return Err(ProviderError::MalformedPayload(format!(
                "{} has no text to complete",
                input.file_name
            )));
        }

        let name = format!("{REQUEST_PREFIX}/{}.jsonl", input.file_name);
        let request_file = self
            .storage
            .write(&self.container, &name, build_request_lines(&self.prompt, &transcript).as_bytes())
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let body = json!({
            "model": self.model,
            "blob_prefix": input.file_name,
            "content_url": self.storage.url(&request_file),
            "target_container": self.storage.url(&ObjectRef::new(&self.container, RESULT_PREFIX)),
        });
        let resp = self
            .client
            .post(format!(
                "{}/openai/completions:submit-batch?api-version={API_VERSION}",
                self.endpoint
            ))
            .header(KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let location = resp
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedPayload("missing operation-location header".to_string()))?;

        info!(file = input.file_name, "Batch completion submitted");
        Ok(location)
    }

    async fn poll(&self, request_id: &str) -> Result<ProviderRequestStatus, ProviderError> {
        let operation = self.get_operation(request_id).await?;
        let status = operation
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::MalformedPayload("missing status".to_string()))?;
        Ok(map_status(status))
    }

    async fn fetch(&self, request_id: &str) -> Result<EnrichmentResult, ProviderError> {
        let operation = self.get_operation(request_id).await?;
        let content_url = operation
            .pointer("/result/content_url")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::MalformedPayload("missing result.content_url".to_string()))?;

        let bytes = self.download(content_url).await?;
        let (values, errors) = parse_result_lines(&String::from_utf8_lossy(&bytes));
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Skipped unparsable completion lines");
        }

        Ok(EnrichmentResult {
            kind: EnrichmentKind::BatchCompletion,
            documents: Vec::new(),
            raw: Value::Array(values),
            errors,
        })
    }
}

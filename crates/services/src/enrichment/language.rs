use std::time::Duration;

use async_trait::async_trait;
use batchscribe_config::{EnrichmentSettings, SentimentAnalysisSetting};
use batchscribe_transcription::Sentiment;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{
    EnrichedDocument, EnrichmentInput, EnrichmentKind, EnrichmentProvider, EnrichmentResult,
    ProviderRequestStatus, channel_documents, sentiment_documents, speaker_identifier,
};
use crate::error::ProviderError;
use crate::http::{check_status, read_json, trim_endpoint};

const API_VERSION: &str = "2023-04-01";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

#[derive(Debug, Deserialize)]
struct JobState {
    status: String,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    tasks: Option<JobTasks>,
}

#[derive(Debug, Deserialize)]
struct JobTasks {
    #[serde(default)]
    items: Vec<TaskItem>,
}

#[derive(Debug, Deserialize)]
struct TaskItem {
    #[serde(default)]
    results: Option<TaskResults>,
}

#[derive(Debug, Deserialize)]
struct TaskResults {
    #[serde(default)]
    documents: Vec<DocumentResult>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResult {
    id: String,
    #[serde(default)]
    confidence_scores: Option<Sentiment>,
    #[serde(default)]
    redacted_text: Option<String>,
}

/// Sentiment, PII redaction and conversation summarization through the
/// language service's asynchronous jobs API. One instance serves one kind.
pub struct LanguageJobProvider {
    kind: EnrichmentKind,
    endpoint: String,
    key: String,
    sentiment_level: SentimentAnalysisSetting,
    client: reqwest::Client,
}

impl LanguageJobProvider {
    pub fn new(
        kind: EnrichmentKind,
        settings: &EnrichmentSettings,
        request_timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        if kind == EnrichmentKind::BatchCompletion {
            return Err(ProviderError::MalformedPayload(
                "batch completion is not served by the language service".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            kind,
            endpoint: trim_endpoint(&settings.language_endpoint).to_string(),
            key: settings.language_key.clone(),
            sentiment_level: settings.sentiment_analysis,
            client,
        })
    }

    fn request_body(&self, input: &EnrichmentInput<'_>) -> Option<(String, Value)> {
        let language = input.locale.split('-').next().unwrap_or("en");
        match self.kind {
            EnrichmentKind::Sentiment | EnrichmentKind::PiiRedaction => {
                let docs = if self.kind == EnrichmentKind::Sentiment {
                    sentiment_documents(input.transcript, self.sentiment_level)
                } else {
                    channel_documents(input.transcript)
                };
                if docs.is_empty() {
                    return None;
                }
                let documents: Vec<Value> = docs
                    .into_iter()
                    .map(|d| json!({ "id": d.id, "language": language, "text": d.text }))
                    .collect();
                let task = if self.kind == EnrichmentKind::Sentiment {
                    json!({ "kind": "SentimentAnalysis", "taskName": "sentiment", "parameters": { "opinionMining": false } })
                } else {
                    json!({ "kind": "PiiEntityRecognition", "taskName": "pii", "parameters": { "domain": "none" } })
                };
                Some((
                    format!("{}/language/analyze-text/jobs?api-version={API_VERSION}", self.endpoint),
                    json!({
                        "displayName": input.file_name,
                        "analysisInput": { "documents": documents },
                        "tasks": [task],
                    }),
                ))
            }
            EnrichmentKind::ConversationSummarization => {
                let label = speaker_identifier(input.transcript);
                let items: Vec<Value> = input
                    .transcript
                    .phrases_in_reading_order()
                    .into_iter()
                    .filter_map(|p| p.best().map(|b| (p, b)))
                    .filter(|(_, b)| !b.display.is_empty())
                    .enumerate()
                    .map(|(i, (p, b))| {
                        json!({
                            "id": i.to_string(),
                            "participantId": label(p.channel, p.speaker),
                            "text": b.display,
                        })
                    })
                    .collect();
                if items.is_empty() {
                    return None;
                }
                Some((
                    format!("{}/language/analyze-conversations/jobs?api-version={API_VERSION}", self.endpoint),
                    json!({
                        "displayName": input.file_name,
                        "analysisInput": { "conversations": [{
                            "id": "1",
                            "language": language,
                            "modality": "text",
                            "conversationItems": items,
                        }]},
                        "tasks": [{
                            "kind": "ConversationalSummarizationTask",
                            "taskName": "summary",
                            "parameters": { "summaryAspects": ["issue", "resolution"] },
                        }],
                    }),
                ))
            }
            EnrichmentKind::BatchCompletion => None,
        }
    }

    async fn get_job(&self, request_id: &str) -> Result<(JobState, Value), ProviderError> {
        let resp = self
            .client
            .get(request_id)
            .header(KEY_HEADER, &self.key)
            .send()
            .await?;
        let raw: Value = read_json(resp).await?;
        let state: JobState = serde_json::from_value(raw.clone())?;
        Ok((state, raw))
    }
}

fn map_status(state: &JobState) -> ProviderRequestStatus {
    match state.status.as_str() {
        "succeeded" | "partiallyCompleted" | "partiallySucceeded" => ProviderRequestStatus::Completed,
        "failed" | "cancelled" | "cancelling" => {
            let detail = state
                .errors
                .first()
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("no error detail");
            ProviderRequestStatus::Failed(format!("job {}: {detail}", state.status))
        }
        _ => ProviderRequestStatus::Running,
    }
}

#[async_trait]
impl EnrichmentProvider for LanguageJobProvider {
    fn kind(&self) -> EnrichmentKind {
        self.kind
    }

    async fn submit(&self, input: &EnrichmentInput<'_>) -> Result<String, ProviderError> {
        let Some((url, body)) = self.request_body(input) else {
            return Err(ProviderError::MalformedPayload(format!(
                "{} has no text to analyze",
                input.file_name
            )));
        };

        let resp = self
            .client
            .post(&url)
            .header(KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let location = resp
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedPayload("missing operation-location header".to_string()))?;

        info!(kind = %self.kind, file = input.file_name, "Language job submitted");
        Ok(location)
    }

    async fn poll(&self, request_id: &str) -> Result<ProviderRequestStatus, ProviderError> {
        let (state, _) = self.get_job(request_id).await?;
        let status = map_status(&state);
        debug!(kind = %self.kind, status = %state.status, "Language job polled");
        Ok(status)
    }

    async fn fetch(&self, request_id: &str) -> Result<EnrichmentResult, ProviderError> {
        let (state, raw) = self.get_job(request_id).await?;
        if let ProviderRequestStatus::Failed(message) = map_status(&state) {
            return Err(ProviderError::MalformedPayload(message));
        }

        let mut documents = Vec::new();
        let mut errors = Vec::new();
        for results in state.tasks.into_iter().flat_map(|t| t.items).filter_map(|i| i.results) {
            documents.extend(results.documents.into_iter().map(|d| EnrichedDocument {
                id: d.id,
                sentiment: d.confidence_scores,
                redacted_text: d.redacted_text,
            }));
            errors.extend(results.errors.into_iter().map(|e| e.to_string()));
        }

        Ok(EnrichmentResult {
            kind: self.kind,
            documents,
            raw,
            errors,
        })
    }
}

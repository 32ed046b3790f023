use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use batchscribe_services::enrichment::{
    EnrichedDocument, EnrichmentInput, EnrichmentKind, EnrichmentProvider, EnrichmentResult,
    ProviderRequestStatus,
};
use batchscribe_services::error::ProviderError;
use batchscribe_transcription::Sentiment;

#[derive(Default)]
struct State {
    submitted: Vec<String>,
    polls: HashMap<String, u32>,
    fetches: usize,
    submit_errors: Vec<u16>,
}

/// Enrichment provider that completes each request after a fixed number of polls.
pub struct FakeEnrichment {
    kind: EnrichmentKind,
    polls_until_complete: u32,
    state: Mutex<State>,
}

impl FakeEnrichment {
    pub fn new(kind: EnrichmentKind, polls_until_complete: u32) -> Self {
        Self {
            kind,
            polls_until_complete,
            state: Mutex::new(State::default()),
        }
    }

    /// Makes the next submissions fail with the given HTTP statuses.
    pub fn fail_submits(&self, statuses: &[u16]) {
        self.state.lock().unwrap().submit_errors.extend(statuses.iter().rev().copied());
    }

    /// File names submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }
}

#[async_trait]
impl EnrichmentProvider for FakeEnrichment {
    fn kind(&self) -> EnrichmentKind {
        self.kind
    }

    async fn submit(&self, input: &EnrichmentInput<'_>) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.submit_errors.pop() {
            return Err(ProviderError::Http {
                status,
                body: "scripted".to_string(),
            });
        }
        state.submitted.push(input.file_name.to_string());
        Ok(format!("{}-{}", self.kind, input.file_name))
    }

    async fn poll(&self, request_id: &str) -> Result<ProviderRequestStatus, ProviderError> {
        let mut state = self.state.lock().unwrap();
        let polls = state.polls.entry(request_id.to_string()).or_default();
        *polls += 1;
        if *polls >= self.polls_until_complete {
            Ok(ProviderRequestStatus::Completed)
        } else {
            Ok(ProviderRequestStatus::Running)
        }
    }

    async fn fetch(&self, request_id: &str) -> Result<EnrichmentResult, ProviderError> {
        self.state.lock().unwrap().fetches += 1;
        let documents = match self.kind {
            EnrichmentKind::Sentiment => vec![EnrichedDocument {
                id: "0".to_string(),
                sentiment: Some(Sentiment {
                    positive: 0.8,
                    neutral: 0.15,
                    negative: 0.05,
                }),
                redacted_text: None,
            }],
            _ => Vec::new(),
        };
        Ok(EnrichmentResult {
            kind: self.kind,
            documents,
            raw: serde_json::json!({ "requestId": request_id, "kind": self.kind.as_str() }),
            errors: Vec::new(),
        })
    }
}

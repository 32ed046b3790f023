mod batch_completion;
mod language;

pub use batch_completion::BatchCompletionProvider;
pub use language::LanguageJobProvider;

use std::sync::Arc;

use async_trait::async_trait;
use batchscribe_config::{EnrichmentSettings, SentimentAnalysisSetting};
use batchscribe_transcription::{Sentiment, TranscriptionResult};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::storage::StorageService;

/// Enrichment variants applied to a finished transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrichmentKind {
    Sentiment,
    PiiRedaction,
    ConversationSummarization,
    BatchCompletion,
}

impl EnrichmentKind {
    /// Suffix used for the per-file payload, `{file}.{suffix}.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sentiment => "sentiment",
            Self::PiiRedaction => "pii",
            Self::ConversationSummarization => "summary",
            Self::BatchCompletion => "completion",
        }
    }
}

impl std::fmt::Display for EnrichmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds switched on by configuration, in a fixed order.
pub fn enabled_kinds(settings: &EnrichmentSettings) -> Vec<EnrichmentKind> {
    let mut kinds = Vec::new();
    if settings.sentiment_enabled() {
        kinds.push(EnrichmentKind::Sentiment);
    }
    if settings.pii_enabled() {
        kinds.push(EnrichmentKind::PiiRedaction);
    }
    if settings.conversation_summarization {
        kinds.push(EnrichmentKind::ConversationSummarization);
    }
    if settings.batch_completion_enabled() {
        kinds.push(EnrichmentKind::BatchCompletion);
    }
    kinds
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRequestStatus {
    Running,
    Completed,
    Failed(String),
}

pub struct EnrichmentInput<'a> {
    pub file_name: &'a str,
    pub locale: &'a str,
    pub transcript: &'a TranscriptionResult,
}

/// Per-document output of an enrichment request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub kind: EnrichmentKind,
    pub documents: Vec<EnrichedDocument>,
    /// Provider payload as returned, persisted next to the transcript.
    pub raw: serde_json::Value,
    /// Document-level errors that did not fail the whole request.
    pub errors: Vec<String>,
}

/// One enrichment capability. Every variant is driven through the same
/// submit / poll / fetch cycle.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync + 'static {
    fn kind(&self) -> EnrichmentKind;

    /// Starts a request and returns its id.
    async fn submit(&self, input: &EnrichmentInput<'_>) -> Result<String, ProviderError>;

    async fn poll(&self, request_id: &str) -> Result<ProviderRequestStatus, ProviderError>;

    async fn fetch(&self, request_id: &str) -> Result<EnrichmentResult, ProviderError>;
}

/// Builds one provider per enabled kind.
pub fn build_providers(
    settings: &EnrichmentSettings,
    storage: Arc<dyn StorageService>,
    request_container: &str,
    request_timeout_secs: u64,
) -> Result<Vec<Arc<dyn EnrichmentProvider>>, ProviderError> {
    let mut providers: Vec<Arc<dyn EnrichmentProvider>> = Vec::new();
    for kind in enabled_kinds(settings) {
        let provider: Arc<dyn EnrichmentProvider> = match kind {
            EnrichmentKind::BatchCompletion => Arc::new(BatchCompletionProvider::new(
                settings,
                storage.clone(),
                request_container,
                request_timeout_secs,
            )?),
            _ => Arc::new(LanguageJobProvider::new(kind, settings, request_timeout_secs)?),
        };
        providers.push(provider);
    }
    Ok(providers)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextDocument {
    pub id: String,
    pub text: String,
}

/// Utterance documents are keyed `{channel}_{offsetTicks}`, audio documents by channel.
pub fn sentiment_documents(transcript: &TranscriptionResult, level: SentimentAnalysisSetting) -> Vec<TextDocument> {
    match level {
        SentimentAnalysisSetting::None => Vec::new(),
        SentimentAnalysisSetting::UtteranceLevel => transcript
            .phrases_in_reading_order()
            .into_iter()
            .filter_map(|phrase| {
                let best = phrase.best()?;
                (!best.display.is_empty()).then(|| TextDocument {
                    id: utterance_key(phrase.channel, phrase.offset_in_ticks),
                    text: best.display.clone(),
                })
            })
            .collect(),
        SentimentAnalysisSetting::AudioLevel => channel_documents(transcript),
    }
}

/// One document per channel, the channel's best phrases joined by spaces in
/// reading order.
pub fn channel_documents(transcript: &TranscriptionResult) -> Vec<TextDocument> {
    let mut channels: Vec<u32> = transcript.recognized_phrases.iter().map(|p| p.channel).collect();
    channels.sort_unstable();
    channels.dedup();

    channels
        .into_iter()
        .map(|channel| TextDocument {
            id: channel.to_string(),
            text: channel_phrase_texts(transcript, channel).join(" "),
        })
        .filter(|doc| !doc.text.is_empty())
        .collect()
}

fn channel_phrase_texts(transcript: &TranscriptionResult, channel: u32) -> Vec<String> {
    transcript
        .phrases_in_reading_order()
        .into_iter()
        .filter(|p| p.channel == channel)
        .filter_map(|p| p.best().map(|b| b.display.clone()))
        .filter(|text| !text.is_empty())
        .collect()
}

fn utterance_key(channel: u32, offset_in_ticks: f64) -> String {
    format!("{channel}_{}", offset_in_ticks.max(0.0) as u64)
}

/// Labels a turn by whatever distinguishes participants in this recording.
pub fn speaker_identifier(transcript: &TranscriptionResult) -> impl Fn(u32, Option<u32>) -> String {
    let multi_channel = transcript.channel_count() > 1;
    let mut speakers: Vec<u32> = transcript.recognized_phrases.iter().filter_map(|p| p.speaker).collect();
    speakers.sort_unstable();
    speakers.dedup();
    let multi_speaker = speakers.len() > 1;

    move |channel, speaker| {
        let speaker = speaker.unwrap_or_default();
        match (multi_channel, multi_speaker) {
            (true, true) => format!("Channel{channel}_Speaker{speaker}"),
            (true, false) => format!("Channel_{channel}"),
            (false, true) => format!("Speaker_{speaker}"),
            (false, false) => "Speaker".to_string(),
        }
    }
}

/// `Label: lexical` lines in reading order.
pub fn conversation_transcript(transcript: &TranscriptionResult) -> String {
    let label = speaker_identifier(transcript);
    transcript
        .phrases_in_reading_order()
        .into_iter()
        .filter_map(|p| {
            p.best()
                .map(|b| format!("{}: {}", label(p.channel, p.speaker), b.lexical))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merges a fetched enrichment result into the transcript.
///
/// Summaries and completions leave the transcript untouched; they are stored
/// as separate artifacts.
pub fn apply_enrichment(transcript: TranscriptionResult, result: &EnrichmentResult) -> TranscriptionResult {
    match result.kind {
        EnrichmentKind::Sentiment => apply_sentiment(transcript, &result.documents),
        EnrichmentKind::PiiRedaction => apply_redaction(transcript, &result.documents),
        EnrichmentKind::ConversationSummarization | EnrichmentKind::BatchCompletion => transcript,
    }
}

fn apply_sentiment(mut transcript: TranscriptionResult, documents: &[EnrichedDocument]) -> TranscriptionResult {
    for doc in documents {
        let Some(sentiment) = doc.sentiment else {
            continue;
        };
        if doc.id.contains('_') {
            if let Some(best) = transcript
                .recognized_phrases
                .iter_mut()
                .find(|p| utterance_key(p.channel, p.offset_in_ticks) == doc.id)
                .and_then(|p| p.n_best.first_mut())
            {
                best.sentiment = Some(sentiment);
            }
        } else if let Some(combined) = transcript
            .combined_recognized_phrases
            .iter_mut()
            .find(|c| c.channel.to_string() == doc.id)
        {
            combined.sentiment = Some(sentiment);
        }
    }
    transcript
}

/// Replaces display text with the redacted channel text and drops every
/// unredacted form, keeping only the best alternative per phrase.
pub fn apply_redaction(transcript: TranscriptionResult, documents: &[EnrichedDocument]) -> TranscriptionResult {
    let mut transcript = transcript.keep_best_alternative_only();

    for doc in documents {
        let (Some(redacted), Ok(channel)) = (doc.redacted_text.as_deref(), doc.id.parse::<u32>()) else {
            continue;
        };

        for combined in transcript
            .combined_recognized_phrases
            .iter_mut()
            .filter(|c| c.channel == channel)
        {
            combined.display = redacted.to_string();
            combined.lexical.clear();
            combined.itn.clear();
            combined.masked_itn.clear();
        }

        let redacted_chars: Vec<char> = redacted.chars().collect();
        let mut order: Vec<usize> = (0..transcript.recognized_phrases.len())
            .filter(|i| transcript.recognized_phrases[*i].channel == channel)
            .collect();
        order.sort_by(|a, b| {
            transcript.recognized_phrases[*a]
                .offset_in_ticks
                .total_cmp(&transcript.recognized_phrases[*b].offset_in_ticks)
        });

        let mut start = 0usize;
        for index in order {
            let Some(best) = transcript.recognized_phrases[index].n_best.first_mut() else {
                continue;
            };
            if best.display.is_empty() {
                continue;
            }
            let len = best.display.chars().count();
            let end = (start + len).min(redacted_chars.len());
            let begin = start.min(end);
            best.display = redacted_chars[begin..end].iter().collect();
            best.lexical.clear();
            best.itn.clear();
            best.masked_itn.clear();
            start += len + 1;
        }
    }
    transcript
}

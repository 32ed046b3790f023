use serde::{Deserialize, Serialize};

/// Provider durations and offsets are expressed in 100ns ticks.
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// A provider transcription result for one audio file.
///
/// Immutable once deserialized; transformations such as redaction return a
/// new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_ticks: Option<f64>,
    /// ISO 8601 duration, e.g. `PT1M12.5S`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// One entry per audio channel with the whole-channel text.
    #[serde(default)]
    pub combined_recognized_phrases: Vec<CombinedPhrase>,
    #[serde(default)]
    pub recognized_phrases: Vec<RecognizedPhrase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedPhrase {
    #[serde(default)]
    pub channel: u32,
    #[serde(default)]
    pub lexical: String,
    #[serde(default)]
    pub itn: String,
    #[serde(rename = "maskedITN", default)]
    pub masked_itn: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedPhrase {
    #[serde(default)]
    pub recognition_status: String,
    #[serde(default)]
    pub channel: u32,
    /// Present only when diarization was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<u32>,
    #[serde(default)]
    pub offset: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub offset_in_ticks: f64,
    #[serde(default)]
    pub duration_in_ticks: f64,
    #[serde(default)]
    pub n_best: Vec<NBest>,
}

impl RecognizedPhrase {
    pub fn offset_secs(&self) -> f64 {
        self.offset_in_ticks / TICKS_PER_SECOND
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_in_ticks / TICKS_PER_SECOND
    }

    /// The highest ranked alternative, if the provider returned any.
    pub fn best(&self) -> Option<&NBest> {
        self.n_best.first()
    }

    pub fn is_success(&self) -> bool {
        self.recognition_status == "Success"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NBest {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub lexical: String,
    #[serde(default)]
    pub itn: String,
    #[serde(rename = "maskedITN", default)]
    pub masked_itn: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub word: String,
    #[serde(default)]
    pub offset: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub offset_in_ticks: f64,
    #[serde(default)]
    pub duration_in_ticks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl TranscriptionResult {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Audio duration in seconds, preferring the tick count over the ISO string.
    pub fn duration_secs(&self) -> f64 {
        if let Some(ticks) = self.duration_in_ticks {
            return ticks / TICKS_PER_SECOND;
        }
        self.duration
            .as_deref()
            .and_then(parse_iso8601_duration)
            .unwrap_or(0.0)
    }

    /// Number of distinct channels carrying recognized speech.
    pub fn channel_count(&self) -> usize {
        let mut channels: Vec<u32> = self
            .combined_recognized_phrases
            .iter()
            .map(|p| p.channel)
            .chain(self.recognized_phrases.iter().map(|p| p.channel))
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels.len()
    }

    /// Recognized phrases sorted by offset. Ties keep provider order.
    pub fn phrases_in_reading_order(&self) -> Vec<&RecognizedPhrase> {
        let mut phrases: Vec<&RecognizedPhrase> = self.recognized_phrases.iter().collect();
        phrases.sort_by(|a, b| a.offset_in_ticks.total_cmp(&b.offset_in_ticks));
        phrases
    }

    /// Whether every phrase was recognized without error.
    pub fn all_phrases_succeeded(&self) -> bool {
        self.recognized_phrases.iter().all(RecognizedPhrase::is_success)
    }

    /// The display text of the whole recording, one line per phrase in reading order.
    pub fn display_text(&self) -> String {
        self.phrases_in_reading_order()
            .into_iter()
            .filter_map(|p| p.best().map(|b| b.display.as_str()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drops every alternative but the best one, as required once PII redaction
    /// has rewritten the top hypothesis.
    pub fn keep_best_alternative_only(mut self) -> Self {
        for phrase in &mut self.recognized_phrases {
            phrase.n_best.truncate(1);
        }
        self
    }
}

/// Parses the subset of ISO 8601 durations the provider emits (`PT#H#M#.#S`).
pub fn parse_iso8601_duration(value: &str) -> Option<f64> {
    let rest = value.trim().strip_prefix("PT")?;
    let mut total = 0.0;
    let mut number = String::new();
    for c in rest.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' | 'M' | 'S' => {
                let amount: f64 = number.parse().ok()?;
                number.clear();
                total += match c {
                    'H' => amount * 3600.0,
                    'M' => amount * 60.0,
                    _ => amount,
                };
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(total)
}

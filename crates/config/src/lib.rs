use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Hard ceilings applied on top of whatever the environment provides.
pub const MAX_FILES_PER_TRANSCRIPTION_JOB: usize = 1000;
pub const MAX_MESSAGES_PER_FUNCTION_EXECUTION: usize = 5000;
pub const MAX_RETRY_LIMIT: u32 = 16;
pub const MAX_CONSUMER_CONCURRENCY: usize = 64;
pub const MIN_POLLING_DELAY_IN_MINUTES: u64 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub speech: SpeechSettings,
    pub lifecycle: LifecycleSettings,
    pub output: OutputSettings,
    pub enrichment: EnrichmentSettings,
    pub queue: QueueSettings,
    pub database: DatabaseSettings,
    pub api: ApiSettings,
}

impl Settings {
    /// Loads settings from `config/default.toml`, `config/local.toml` and
    /// `BATCHSCRIBE__SECTION__KEY` environment variables, in that order.
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("BATCHSCRIBE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings.normalized())
    }

    /// Clamps every bounded value into its supported range.
    pub fn normalized(mut self) -> Self {
        self.lifecycle = self.lifecycle.normalized();
        self
    }

    pub fn log_summary(&self) {
        tracing::info!(
            locale = %self.speech.primary_locale(),
            files_per_job = self.lifecycle.files_per_transcription_job,
            messages_per_execution = self.lifecycle.messages_per_function_execution,
            retry_limit = self.lifecycle.retry_limit,
            initial_polling_delay_min = self.lifecycle.initial_polling_delay_in_minutes,
            max_polling_delay_min = self.lifecycle.max_polling_delay_in_minutes,
            consumer_concurrency = self.lifecycle.consumer_concurrency,
            enrichment_kinds = self.enrichment.enabled_kind_count(),
            queue_backend = ?self.queue.backend,
            database = self.database.enabled,
            "Settings loaded"
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory of the local storage backend. One sub-directory per container.
    pub root: String,
    pub audio_input_container: String,
    pub audio_claimed_container: String,
    pub audio_processed_container: String,
    pub json_result_output_container: String,
    pub html_result_output_container: String,
    pub consolidated_files_output_container: String,
    pub report_output_container: String,
    pub error_report_output_container: String,
    pub error_files_output_container: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
            audio_input_container: "audio-input".to_string(),
            audio_claimed_container: "audio-claimed".to_string(),
            audio_processed_container: "audio-processed".to_string(),
            json_result_output_container: "json-result-output".to_string(),
            html_result_output_container: "html-result-output".to_string(),
            consolidated_files_output_container: "consolidated-files".to_string(),
            report_output_container: "batch-reports".to_string(),
            error_report_output_container: "error-report".to_string(),
            error_files_output_container: "error-files".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub endpoint: String,
    pub subscription_key: String,
    /// Either a bare locale (`en-US`) or `en-US | English (United States)`.
    pub locale: String,
    pub custom_model_id: Option<String>,
    pub add_diarization: bool,
    pub add_word_level_timestamps: bool,
    pub punctuation_mode: String,
    pub profanity_filter_mode: String,
    pub request_timeout_secs: u64,
}

impl SpeechSettings {
    /// The locale code without its display-name suffix.
    pub fn primary_locale(&self) -> &str {
        self.locale.split('|').next().unwrap_or_default().trim()
    }

    /// The custom model id, if one is configured and non-blank.
    pub fn custom_model(&self) -> Option<&str> {
        self.custom_model_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://westeurope.api.cognitive.microsoft.com".to_string(),
            subscription_key: String::new(),
            locale: "en-US".to_string(),
            custom_model_id: None,
            add_diarization: false,
            add_word_level_timestamps: false,
            punctuation_mode: "DictatedAndAutomatic".to_string(),
            profanity_filter_mode: "Masked".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub files_per_transcription_job: usize,
    pub messages_per_function_execution: usize,
    pub retry_limit: u32,
    pub initial_polling_delay_in_minutes: u64,
    pub max_polling_delay_in_minutes: u64,
    /// Fixed delay before retrying a step that hit a transient provider error.
    pub retry_delay_secs: u64,
    /// Fixed delay between enrichment status polls.
    pub enrichment_polling_delay_secs: u64,
    /// Deliveries after which an unprocessable message is dead-lettered.
    pub max_delivery_count: u32,
    /// How long a received message stays invisible before it is redelivered.
    pub lock_duration_secs: u64,
    /// Cron expression for the periodic input scan.
    pub scan_schedule: String,
    /// Parse audio headers at submission time for cost estimation.
    pub inspect_audio: bool,
    /// Lifecycle deliveries handled in parallel by one process.
    pub consumer_concurrency: usize,
}

impl LifecycleSettings {
    pub fn normalized(mut self) -> Self {
        self.files_per_transcription_job = self
            .files_per_transcription_job
            .clamp(1, MAX_FILES_PER_TRANSCRIPTION_JOB);
        self.messages_per_function_execution = self
            .messages_per_function_execution
            .clamp(1, MAX_MESSAGES_PER_FUNCTION_EXECUTION);
        self.retry_limit = self.retry_limit.min(MAX_RETRY_LIMIT);
        self.max_polling_delay_in_minutes = self
            .max_polling_delay_in_minutes
            .max(MIN_POLLING_DELAY_IN_MINUTES);
        self.initial_polling_delay_in_minutes = self
            .initial_polling_delay_in_minutes
            .clamp(MIN_POLLING_DELAY_IN_MINUTES, self.max_polling_delay_in_minutes);
        self.max_delivery_count = self.max_delivery_count.max(1);
        self.consumer_concurrency = self.consumer_concurrency.clamp(1, MAX_CONSUMER_CONCURRENCY);
        self
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            files_per_transcription_job: 16,
            messages_per_function_execution: 500,
            retry_limit: 4,
            initial_polling_delay_in_minutes: 2,
            max_polling_delay_in_minutes: 180,
            retry_delay_secs: 60,
            enrichment_polling_delay_secs: 60,
            max_delivery_count: 10,
            lock_duration_secs: 300,
            scan_schedule: "0 */2 * * * *".to_string(),
            inspect_audio: true,
            consumer_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub create_html_result_file: bool,
    pub create_consolidated_output_files: bool,
    pub create_audio_processed_container: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentAnalysisSetting {
    #[default]
    None,
    UtteranceLevel,
    AudioLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PiiRedactionSetting {
    #[default]
    None,
    HypothesisAndTranscript,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub language_endpoint: String,
    pub language_key: String,
    pub sentiment_analysis: SentimentAnalysisSetting,
    pub pii_redaction: PiiRedactionSetting,
    pub conversation_summarization: bool,
    pub openai_endpoint: String,
    pub openai_key: String,
    pub openai_deployment: String,
    /// Enables LLM batch completion when set.
    pub batch_completion_prompt: Option<String>,
}

impl EnrichmentSettings {
    pub fn sentiment_enabled(&self) -> bool {
        self.sentiment_analysis != SentimentAnalysisSetting::None
    }

    pub fn pii_enabled(&self) -> bool {
        self.pii_redaction != PiiRedactionSetting::None
    }

    pub fn batch_completion_enabled(&self) -> bool {
        self.batch_completion_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    pub fn enabled_kind_count(&self) -> usize {
        [
            self.sentiment_enabled(),
            self.pii_enabled(),
            self.conversation_summarization,
            self.batch_completion_enabled(),
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub backend: QueueBackend,
    pub redis_url: String,
    /// Lifecycle (fetch-transcription) queue name.
    pub name: String,
    /// Queue receiving per-file upload events.
    pub start_name: String,
    /// Idle wait between empty receives.
    pub receive_idle_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            name: "lifecycle".to_string(),
            start_name: "start-transcription".to_string(),
            receive_idle_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub enabled: bool,
    pub url: String,
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "mongodb://localhost:27017".to_string(),
            name: "batchscribe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

impl ApiSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

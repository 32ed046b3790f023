use thiserror::Error;

/// Failure of a call to an external provider (speech, language, LLM).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Deserialization failed: {0}")]
    Deserialize(String),
    #[error("Malformed provider payload: {0}")]
    MalformedPayload(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short tag written into report details as `errorKind`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Http { .. } => "HttpError",
            ProviderError::Timeout => "Timeout",
            ProviderError::Transport(_) => "TransportError",
            ProviderError::Deserialize(_) => "DeserializationError",
            ProviderError::MalformedPayload(_) => "MalformedPayload",
            ProviderError::NotFound(_) => "NotFound",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            ProviderError::Deserialize(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Deserialize(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {container}/{name}")]
    NotFound { container: String, name: String },
    #[error("Invalid object name: {0}")]
    InvalidName(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),
    #[error("Unknown delivery: {0}")]
    UnknownDelivery(String),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Infrastructure failure while driving a batch. The delivery is abandoned and
/// the queue redelivers it.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    Bson(#[from] bson::ser::Error),
}

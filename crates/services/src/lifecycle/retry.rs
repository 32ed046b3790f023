use std::time::Duration;

use batchscribe_config::LifecycleSettings;

use crate::error::ProviderError;

/// Polling delays double per poll up to this exponent.
const MAX_BACKOFF_EXPONENT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Fatal,
}

/// What to do after a retryable failure has been counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Republish the unchanged state after `delay`.
    Retry { delay: Duration },
    /// The retry budget is spent; report the batch as failed.
    Escalate,
}

/// Error classification and the two bounded counters of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub initial_polling_delay: Duration,
    pub max_polling_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &LifecycleSettings) -> Self {
        Self {
            retry_limit: settings.retry_limit,
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            initial_polling_delay: Duration::from_secs(settings.initial_polling_delay_in_minutes * 60),
            max_polling_delay: Duration::from_secs(settings.max_polling_delay_in_minutes * 60),
        }
    }

    pub fn classify(&self, error: &ProviderError) -> Classification {
        match error {
            ProviderError::Timeout | ProviderError::Transport(_) => Classification::Retryable,
            ProviderError::Http { status, .. } if is_retryable_status(*status) => Classification::Retryable,
            ProviderError::Http { .. }
            | ProviderError::Deserialize(_)
            | ProviderError::MalformedPayload(_)
            | ProviderError::NotFound(_) => Classification::Fatal,
        }
    }

    /// Counts one failed execution and decides whether another attempt is allowed.
    ///
    /// With a limit of `n`, failures `1..=n` retry and failure `n + 1` escalates.
    pub fn register_failure(&self, failed_execution_counter: &mut u32) -> RetryDecision {
        *failed_execution_counter = failed_execution_counter.saturating_add(1);
        if *failed_execution_counter > self.retry_limit {
            RetryDecision::Escalate
        } else {
            RetryDecision::Retry {
                delay: self.retry_delay,
            }
        }
    }

    /// Backoff for the poll following `polling_counter` earlier polls:
    /// `initial * 2^min(counter, 8)`, capped at the maximum.
    pub fn polling_delay(&self, polling_counter: u32) -> Duration {
        let factor = 2u32.pow(polling_counter.min(MAX_BACKOFF_EXPONENT));
        self.initial_polling_delay
            .saturating_mul(factor)
            .min(self.max_polling_delay)
    }

    /// Whether a file that failed on the provider side may be submitted again.
    pub fn should_resubmit_file(&self, retry_count: u32) -> bool {
        retry_count < self.retry_limit
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

use std::fmt::Write;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailStatus {
    Succeeded,
    Failed,
}

/// Outcome of one audio file within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub status: DetailStatus,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Locations of every artifact written for this file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Non-fatal observations, e.g. an unreadable audio header.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
    /// Enrichment kinds that failed while the transcription itself succeeded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrichment_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

impl ReportDetail {
    pub fn succeeded(source_url: impl Into<String>, outputs: Vec<String>) -> Self {
        Self {
            status: DetailStatus::Succeeded,
            source_url: source_url.into(),
            error_kind: None,
            error_message: None,
            outputs,
            advisories: Vec::new(),
            enrichment_errors: Vec::new(),
            estimated_cost: None,
        }
    }

    pub fn failed(
        source_url: impl Into<String>,
        error_kind: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            status: DetailStatus::Failed,
            source_url: source_url.into(),
            error_kind: Some(error_kind.into()),
            error_message: Some(error_message.into()),
            outputs: Vec::new(),
            advisories: Vec::new(),
            enrichment_errors: Vec::new(),
            estimated_cost: None,
        }
    }

    pub fn with_advisories(mut self, advisories: Vec<String>) -> Self {
        self.advisories = advisories;
        self
    }

    pub fn with_enrichment_errors(mut self, errors: Vec<String>) -> Self {
        self.enrichment_errors = errors;
        self
    }

    pub fn with_estimated_cost(mut self, cost: Option<f64>) -> Self {
        self.estimated_cost = cost;
        self
    }
}

/// Batch-level outcome, written exactly once per job name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub job_name: String,
    pub successful_count: usize,
    pub failed_count: usize,
    pub details: Vec<ReportDetail>,
}

/// Combines per-file outcomes into a batch report. Successes come first, each
/// group keeps the order it was given in.
pub fn build_batch_report(
    job_name: &str,
    successes: Vec<ReportDetail>,
    failures: Vec<ReportDetail>,
) -> BatchReport {
    let successful_count = successes.len();
    let failed_count = failures.len();
    let mut details = successes;
    details.extend(failures);

    BatchReport {
        job_name: job_name.to_string(),
        successful_count,
        failed_count,
        details,
    }
}

impl BatchReport {
    pub fn is_fully_successful(&self) -> bool {
        self.failed_count == 0
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Flat `status,source,errorKind,errorMessage,outputs` rows for spreadsheet consumers.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("status,sourceUrl,errorKind,errorMessage,outputs,advisories\n");
        for detail in &self.details {
            let status = match detail.status {
                DetailStatus::Succeeded => "Succeeded",
                DetailStatus::Failed => "Failed",
            };
            let _ = writeln!(
                csv,
                "{},{},{},{},{},{}",
                status,
                csv_field(&detail.source_url),
                csv_field(detail.error_kind.as_deref().unwrap_or_default()),
                csv_field(detail.error_message.as_deref().unwrap_or_default()),
                csv_field(&detail.outputs.join(";")),
                csv_field(&detail.advisories.join(";")),
            );
        }
        csv
    }

    /// Plain-text summary for the error-report container.
    pub fn to_error_text(&self) -> String {
        let mut text = format!(
            "Job {}: {} succeeded, {} failed\n",
            self.job_name, self.successful_count, self.failed_count
        );
        for detail in self
            .details
            .iter()
            .filter(|d| d.status == DetailStatus::Failed)
        {
            let _ = writeln!(
                text,
                "{} failed with error \"{}\" and message \"{}\"",
                detail.source_url,
                detail.error_kind.as_deref().unwrap_or("unknown"),
                detail.error_message.as_deref().unwrap_or("unknown"),
            );
        }
        text
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

//! Pure report builders. Callers own every storage write.

pub mod batch;
pub mod html;

pub use batch::{BatchReport, DetailStatus, ReportDetail, build_batch_report};
pub use html::build_html;

use crate::model::TranscriptionResult;

/// Serializes a transcript into the indented JSON written to the result container.
pub fn build_result_json(result: &TranscriptionResult) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(result)
}

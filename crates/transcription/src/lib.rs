pub mod cost;
pub mod model;
pub mod pipeline;
pub mod report;

pub use cost::estimate_cost;
pub use model::{CombinedPhrase, NBest, RecognizedPhrase, Sentiment, TranscriptionResult, Word};
pub use pipeline::{AudioDetailError, AudioDetails, AudioFormat};
pub use report::{BatchReport, DetailStatus, ReportDetail, build_batch_report, build_html, build_result_json};

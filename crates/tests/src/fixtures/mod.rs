pub mod fake_enrichment;
pub mod fake_speech;
pub mod harness;
pub mod transcripts;

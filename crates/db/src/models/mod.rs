pub mod transcription_job;

pub use transcription_job::{JobPhase, TranscriptionJob};

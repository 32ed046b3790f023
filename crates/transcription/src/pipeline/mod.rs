pub mod audio_details;

pub use audio_details::{AudioDetailError, AudioDetails, AudioFormat, inspect};

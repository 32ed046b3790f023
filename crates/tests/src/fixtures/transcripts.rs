use std::io::Cursor;

use batchscribe_transcription::{CombinedPhrase, NBest, RecognizedPhrase, TranscriptionResult};

/// A two-phrase, single-channel transcript for `source`.
pub fn sample_transcript(source: &str) -> TranscriptionResult {
    TranscriptionResult {
        source: source.to_string(),
        timestamp: Some("2024-03-01T10:00:00Z".to_string()),
        duration_in_ticks: Some(40_000_000.0),
        duration: Some("PT4S".to_string()),
        combined_recognized_phrases: vec![CombinedPhrase {
            channel: 0,
            lexical: "hello there how are you".to_string(),
            itn: "hello there how are you".to_string(),
            masked_itn: "hello there how are you".to_string(),
            display: "Hello there. How are you?".to_string(),
            sentiment: None,
        }],
        recognized_phrases: vec![
            phrase(0.5, Some(1), "Hello there."),
            phrase(2.0, Some(2), "How are you?"),
        ],
    }
}

pub fn phrase(offset_secs: f64, speaker: Option<u32>, display: &str) -> RecognizedPhrase {
    let lexical = display
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ', "");
    RecognizedPhrase {
        recognition_status: "Success".to_string(),
        channel: 0,
        speaker,
        offset: format!("PT{offset_secs}S"),
        duration: "PT1S".to_string(),
        offset_in_ticks: offset_secs * 10_000_000.0,
        duration_in_ticks: 10_000_000.0,
        n_best: vec![
            NBest {
                confidence: 0.92,
                lexical: lexical.clone(),
                itn: lexical.clone(),
                masked_itn: lexical.clone(),
                display: display.to_string(),
                sentiment: None,
                words: None,
            },
            NBest {
                confidence: 0.31,
                lexical: lexical.clone(),
                itn: lexical.clone(),
                masked_itn: lexical,
                display: display.to_uppercase(),
                sentiment: None,
                words: None,
            },
        ],
    }
}

/// A valid 16-bit PCM WAV of `seconds` length.
pub fn wav_bytes(channels: u16, sample_rate: u32, seconds: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(sample_rate * seconds * channels as u32) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A WAV whose `fmt ` chunk is cut short.
pub fn truncated_wav() -> Vec<u8> {
    let mut bytes = wav_bytes(1, 8000, 1);
    bytes.truncate(24);
    bytes
}

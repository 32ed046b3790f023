use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How far past the ID3 tag the MP3 parser looks for the first frame header.
const MP3_SYNC_SEARCH_WINDOW: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AudioDetailError {
    #[error("Header parse error: {0}")]
    HeaderParse(String),
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Unknown,
}

/// Header-level facts about an audio file, recovered without decoding it.
///
/// A zero `channels`/`duration_secs` pair together with `error` is the
/// "skip cost estimation" sentinel; it never fails a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDetails {
    pub format: AudioFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub duration_secs: f64,
    pub error: Option<AudioDetailError>,
}

impl AudioDetails {
    fn failed(format: AudioFormat, error: AudioDetailError) -> Self {
        Self {
            format,
            channels: 0,
            sample_rate: 0,
            bits_per_sample: 0,
            duration_secs: 0.0,
            error: Some(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.channels > 0 && self.duration_secs > 0.0
    }
}

/// Inspects an audio buffer's container header.
///
/// The file extension decides the parser when it is `wav` or `mp3`; otherwise
/// the leading magic bytes are sniffed.
pub fn inspect(bytes: &[u8], filename: &str) -> AudioDetails {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let result = match extension.as_deref() {
        Some("wav") | Some("wave") => inspect_wav(bytes).map_err(|e| (AudioFormat::Wav, e)),
        Some("mp3") => inspect_mp3(bytes).map_err(|e| (AudioFormat::Mp3, e)),
        _ if bytes.starts_with(b"RIFF") => inspect_wav(bytes).map_err(|e| (AudioFormat::Wav, e)),
        _ if bytes.starts_with(b"ID3") || is_frame_sync(bytes) => {
            inspect_mp3(bytes).map_err(|e| (AudioFormat::Mp3, e))
        }
        _ => Err((
            AudioFormat::Unknown,
            AudioDetailError::UnsupportedFormat(filename.to_string()),
        )),
    };

    result.unwrap_or_else(|(format, error)| AudioDetails::failed(format, error))
}

fn header_error(message: impl Into<String>) -> AudioDetailError {
    AudioDetailError::HeaderParse(message.into())
}

fn read_u16_le(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

struct WavFormat {
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    bits_per_sample: u16,
}

/// Walks the RIFF sub-chunks looking for `fmt ` and `data`.
fn inspect_wav(bytes: &[u8]) -> Result<AudioDetails, AudioDetailError> {
    if bytes.len() < 12 {
        return Err(header_error("buffer shorter than RIFF header"));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(header_error("missing RIFF tag"));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(header_error("missing WAVE tag"));
    }

    let mut format: Option<WavFormat> = None;
    let mut data_len: Option<u64> = None;
    let mut cursor = 12;

    while cursor + 8 <= bytes.len() {
        let id = &bytes[cursor..cursor + 4];
        let size = read_u32_le(bytes, cursor + 4).unwrap_or(0) as usize;
        let body = cursor + 8;

        match id {
            b"fmt " => {
                if size < 16 || body + 16 > bytes.len() {
                    return Err(header_error("truncated fmt chunk"));
                }
                format = Some(WavFormat {
                    channels: read_u16_le(bytes, body + 2).unwrap_or(0),
                    sample_rate: read_u32_le(bytes, body + 4).unwrap_or(0),
                    byte_rate: read_u32_le(bytes, body + 8).unwrap_or(0),
                    bits_per_sample: read_u16_le(bytes, body + 14).unwrap_or(0),
                });
            }
            b"data" => {
                // Streamed WAVs leave the size at 0 or u32::MAX; fall back to what we hold.
                let available = bytes.len().saturating_sub(body) as u64;
                let declared = size as u64;
                data_len = Some(if declared == 0 || declared == u32::MAX as u64 {
                    available
                } else {
                    declared
                });
                break;
            }
            _ => {}
        }

        // Chunks are word aligned.
        cursor = body.saturating_add(size).saturating_add(size & 1);
    }

    let format = format.ok_or_else(|| header_error("missing fmt chunk"))?;
    let data_len = data_len.ok_or_else(|| header_error("missing data chunk"))?;

    if format.channels == 0 || format.sample_rate == 0 {
        return Err(header_error("fmt chunk declares zero channels or sample rate"));
    }

    let bytes_per_second = if format.bits_per_sample > 0 {
        format.sample_rate as f64 * format.channels as f64 * format.bits_per_sample as f64 / 8.0
    } else {
        format.byte_rate as f64
    };
    if bytes_per_second <= 0.0 {
        return Err(header_error("cannot derive byte rate"));
    }

    Ok(AudioDetails {
        format: AudioFormat::Wav,
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        duration_secs: data_len as f64 / bytes_per_second,
        error: None,
    })
}

fn is_frame_sync(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    version: MpegVersion,
    layer: u8,
    bitrate_kbps: u32,
    sample_rate: u32,
    channels: u16,
}

impl FrameHeader {
    fn parse(bytes: &[u8]) -> Option<Self> {
        if !is_frame_sync(bytes) || bytes.len() < 4 {
            return None;
        }
        let version = match (bytes[1] >> 3) & 0b11 {
            0b00 => MpegVersion::V25,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (bytes[1] >> 1) & 0b11 {
            0b01 => 3,
            0b10 => 2,
            0b11 => 1,
            _ => return None,
        };
        let bitrate_index = (bytes[2] >> 4) as usize;
        let sample_rate_index = ((bytes[2] >> 2) & 0b11) as usize;
        if bitrate_index == 0 || bitrate_index == 15 || sample_rate_index == 3 {
            return None;
        }

        let bitrate_kbps = bitrate_table(version, layer)[bitrate_index];
        let sample_rate = match version {
            MpegVersion::V1 => [44_100, 48_000, 32_000][sample_rate_index],
            MpegVersion::V2 => [22_050, 24_000, 16_000][sample_rate_index],
            MpegVersion::V25 => [11_025, 12_000, 8_000][sample_rate_index],
        };
        let channels = if bytes[3] >> 6 == 0b11 { 1 } else { 2 };

        Some(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            channels,
        })
    }

    fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (1, _) => 384,
            (2, _) => 1152,
            (_, MpegVersion::V1) => 1152,
            _ => 576,
        }
    }

    /// Offset of a Xing/Info tag relative to the frame start.
    fn xing_offset(&self) -> usize {
        match (self.version, self.channels) {
            (MpegVersion::V1, 1) => 4 + 17,
            (MpegVersion::V1, _) => 4 + 32,
            (_, 1) => 4 + 9,
            _ => 4 + 17,
        }
    }
}

fn bitrate_table(version: MpegVersion, layer: u8) -> &'static [u32; 15] {
    const V1_L1: [u32; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
    const V1_L2: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
    const V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
    const V2_L1: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
    const V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

    match (version, layer) {
        (MpegVersion::V1, 1) => &V1_L1,
        (MpegVersion::V1, 2) => &V1_L2,
        (MpegVersion::V1, _) => &V1_L3,
        (_, 1) => &V2_L1,
        _ => &V2_L23,
    }
}

/// Size of a leading ID3v2 tag, including its optional footer.
fn id3v2_len(bytes: &[u8]) -> usize {
    if bytes.len() < 10 || &bytes[0..3] != b"ID3" {
        return 0;
    }
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

/// Estimates MP3 duration from the first frame header.
///
/// Uses the Xing/Info or VBRI frame count when present, otherwise assumes a
/// constant bitrate over the remaining bytes.
fn inspect_mp3(bytes: &[u8]) -> Result<AudioDetails, AudioDetailError> {
    let start = id3v2_len(bytes);
    if start >= bytes.len() {
        return Err(header_error("no audio frames after ID3 tag"));
    }

    let search_end = bytes.len().min(start + MP3_SYNC_SEARCH_WINDOW);
    let (frame_start, header) = (start..search_end)
        .find_map(|i| FrameHeader::parse(&bytes[i..]).map(|h| (i, h)))
        .ok_or_else(|| header_error("no MPEG frame header found"))?;

    let xing_at = frame_start + header.xing_offset();
    let vbri_at = frame_start + 4 + 32;
    let frame_count = match bytes.get(xing_at..xing_at + 4) {
        Some(b"Xing") | Some(b"Info") => read_u32_be(bytes, xing_at + 4)
            .filter(|flags| flags & 0x1 != 0)
            .and_then(|_| read_u32_be(bytes, xing_at + 8)),
        _ => None,
    }
    .or_else(|| match bytes.get(vbri_at..vbri_at + 4) {
        Some(b"VBRI") => read_u32_be(bytes, vbri_at + 14),
        _ => None,
    });

    let duration_secs = match frame_count {
        Some(frames) if frames > 0 => {
            frames as f64 * header.samples_per_frame() as f64 / header.sample_rate as f64
        }
        _ => {
            let mut audio_len = bytes.len() - frame_start;
            if bytes.len() >= 128 && &bytes[bytes.len() - 128..bytes.len() - 125] == b"TAG" {
                audio_len = audio_len.saturating_sub(128);
            }
            audio_len as f64 * 8.0 / (header.bitrate_kbps as f64 * 1000.0)
        }
    };

    Ok(AudioDetails {
        format: AudioFormat::Mp3,
        channels: header.channels,
        sample_rate: header.sample_rate,
        bits_per_sample: 0,
        duration_secs,
        error: None,
    })
}

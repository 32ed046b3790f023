/// Approximate list prices in USD. Only used for the advisory cost column.
const STANDARD_PRICE_PER_AUDIO_HOUR: f64 = 1.0;
const CUSTOM_MODEL_PRICE_PER_AUDIO_HOUR: f64 = 1.4;
const TEXT_ANALYTICS_PRICE_PER_1000_RECORDS: f64 = 1.0;

/// Estimates the cost of transcribing and enriching one audio file.
///
/// Speech is billed per audio hour and channel; every enabled enrichment kind
/// is billed per started block of 1000 text records.
pub fn estimate_cost(
    duration_secs: f64,
    channels: u16,
    uses_custom_model: bool,
    enrichment_kinds: usize,
    text_records: usize,
) -> f64 {
    let hours = duration_secs.max(0.0) / 3600.0;
    let rate = if uses_custom_model {
        CUSTOM_MODEL_PRICE_PER_AUDIO_HOUR
    } else {
        STANDARD_PRICE_PER_AUDIO_HOUR
    };
    let speech = hours * channels.max(1) as f64 * rate;

    let record_blocks = text_records.div_ceil(1000);
    let analytics = enrichment_kinds as f64 * record_blocks as f64 * TEXT_ANALYTICS_PRICE_PER_1000_RECORDS;

    speech + analytics
}

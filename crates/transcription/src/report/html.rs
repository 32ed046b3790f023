use std::fmt::Write;

use crate::model::{RecognizedPhrase, TranscriptionResult};

/// Renders a transcript as a standalone HTML document.
///
/// Phrases are emitted in reading order (sorted by offset); consecutive phrases
/// from the same speaker on the same channel are merged into one block.
pub fn build_html(result: &TranscriptionResult, title: &str) -> String {
    let mut html = String::with_capacity(1024 + result.recognized_phrases.len() * 128);
    html.push_str("<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(title));
    html.push_str(
        "<style>body{font-family:sans-serif;max-width:60em;margin:auto}\
         .turn{margin:0.6em 0}.who{font-weight:bold}.at{color:#777;font-size:0.85em}</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", escape(title));
    let _ = writeln!(
        html,
        "<p class=\"meta\">Source: {}<br>Duration: {}</p>",
        escape(&result.source),
        format_timestamp(result.duration_secs())
    );

    let mut current: Option<(u32, Option<u32>)> = None;
    for phrase in result.phrases_in_reading_order() {
        let Some(best) = phrase.best() else {
            continue;
        };
        if best.display.is_empty() {
            continue;
        }

        let key = (phrase.channel, phrase.speaker);
        if current != Some(key) {
            if current.is_some() {
                html.push_str("</p>\n");
            }
            let _ = write!(
                html,
                "<p class=\"turn\"><span class=\"who\">{}</span> <span class=\"at\">[{}]</span><br>",
                speaker_label(phrase),
                format_timestamp(phrase.offset_secs())
            );
            current = Some(key);
        } else {
            html.push(' ');
        }
        html.push_str(&escape(&best.display));
    }
    if current.is_some() {
        html.push_str("</p>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn speaker_label(phrase: &RecognizedPhrase) -> String {
    match phrase.speaker {
        Some(speaker) => format!("Speaker {speaker}"),
        None => format!("Channel {}", phrase.channel),
    }
}

fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

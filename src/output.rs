use crate::Transcript;

/// Render transcript as plain text (one segment per line, no timestamps)
pub fn render_text(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the whole transcript, metadata included, as pretty JSON
pub fn render_json(transcript: &Transcript) -> String {
    serde_json::to_string_pretty(transcript).unwrap_or_else(|_| "{}".to_string())
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (mins, rem) = (rem / 60_000, rem % 60_000);
    let (secs, ms) = (rem / 1000, rem % 1000);
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

/// Render transcript as SubRip subtitles
pub fn render_srt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(s.start),
                srt_timestamp(s.start + s.duration),
                s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// File name offered for a download, e.g. `My Video_transcript.txt`
pub fn download_filename(title: &str, kind: &str) -> String {
    let clean: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let clean = clean.trim().trim_matches('.');
    let stem = if clean.is_empty() { "video" } else { clean };
    format!("{stem}_{kind}.txt")
}

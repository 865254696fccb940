// src/transcribe/subtitles.rs
// Subtitle-marker stripping for providers that return cue text

use std::sync::OnceLock;

use regex::Regex;

/// Reduce a subtitle document (WebVTT or SRT) to plain transcript text:
/// the header line, timestamp-range lines, blank lines, and pure
/// sequence-number lines are dropped, the remaining cue text is joined with
/// single spaces.
pub fn strip_subtitle_markers(raw: &str) -> String {
    static TS_RE: OnceLock<Regex> = OnceLock::new();
    let timestamp = TS_RE.get_or_init(|| {
        Regex::new(r"^\s*\d{1,2}:\d{2}(:\d{2})?[.,]\d{3}\s*-->\s*\d{1,2}:\d{2}(:\d{2})?[.,]\d{3}")
            .expect("valid timestamp regex")
    });

    let mut pieces: Vec<&str> = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if idx == 0 && trimmed.starts_with("WEBVTT") {
            continue;
        }
        if timestamp.is_match(trimmed) {
            continue;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        pieces.push(trimmed);
    }

    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! # SubRip (.srt) 格式
//!
//! ## 格式说明
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:02,500
//! First line
//! Second line
//!
//! 2
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册
//! - 使用 `models/document.rs`

use super::{parse_millis, CodecOptions, SubtitleFormat};
use crate::error::Result;
use crate::models::{Document, Entry, FormatDescriptor, TimeCode};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::text("SubRip", ".srt");

static CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{0,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{0,3})",
    )
    .unwrap()
});

pub struct SubRip;

impl SubRip {
    pub fn new() -> Self {
        SubRip
    }
}

impl SubtitleFormat for SubRip {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, lines: &[&str], _file_name: &str) -> bool {
        let first = lines.iter().find(|l| !l.trim().is_empty());
        if first.map_or(false, |l| l.trim_start().starts_with("WEBVTT")) {
            return false;
        }
        lines.iter().any(|l| CUE_RE.is_match(l))
    }

    fn load(&self, lines: &[&str], _options: &CodecOptions) -> Result<Document> {
        let cues: Vec<(usize, Captures)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| CUE_RE.captures(l).map(|c| (i, c)))
            .collect();

        let mut entries = Vec::with_capacity(cues.len());
        for (k, (i, caps)) in cues.iter().enumerate() {
            let is_last = k + 1 == cues.len();
            let end = cues.get(k + 1).map(|(j, _)| *j).unwrap_or(lines.len());
            let mut body: Vec<&str> = lines[i + 1..end].to_vec();

            trim_trailing_blank(&mut body);
            if !is_last && body.last().map_or(false, |l| is_sequence_number(l)) {
                body.pop();
                trim_trailing_blank(&mut body);
            }
            while body.first().map_or(false, |l| l.trim().is_empty()) {
                body.remove(0);
            }

            let start = timecode(caps, 1);
            let end = timecode(caps, 5);
            entries.push(Entry::timed(start.millis(), end.millis(), body.join("\n")));
        }

        Ok(Document::new(entries))
    }

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String {
        let mut result = String::new();
        for (i, entry) in document.entries.iter().enumerate() {
            result.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_timecode(entry.start_ms(options.frame_rate)),
                format_timecode(entry.end_ms(options.frame_rate)),
                entry.text
            ));
        }
        result
    }
}

fn timecode(caps: &Captures, first_group: usize) -> TimeCode {
    let num = |i: usize| -> u64 {
        caps.get(first_group + i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let millis = caps
        .get(first_group + 3)
        .map(|m| parse_millis(m.as_str()))
        .unwrap_or(0);
    TimeCode::from_parts(num(0), num(1), num(2), millis)
}

fn is_sequence_number(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit())
}

fn trim_trailing_blank(body: &mut Vec<&str>) {
    while body.last().map_or(false, |l| l.trim().is_empty()) {
        body.pop();
    }
}

/// `HH:MM:SS,mmm`
pub fn format_timecode(ms: f64) -> String {
    let (h, m, s, ms) = TimeCode(ms).parts();
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

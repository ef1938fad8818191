//! # WebVTT (.vtt) 格式
//!
//! ## 格式说明
//! ```text
//! WEBVTT
//!
//! 00:00:01.000 --> 00:00:02.500 line:90%
//! Text
//! ```
//!
//! 输出强制使用 UTF-8。
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册

use super::{parse_millis, CodecOptions, SubtitleFormat};
use crate::error::Result;
use crate::models::{Document, EncodingPolicy, Entry, FormatDescriptor, TimeCode};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const DESCRIPTOR: FormatDescriptor =
    FormatDescriptor::text("WebVTT", ".vtt").with_encoding(EncodingPolicy::Utf8);

static CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(\d+):)?(\d{1,2}):(\d{1,2})\.(\d{1,3})\s*-->\s*(?:(\d+):)?(\d{1,2}):(\d{1,2})\.(\d{1,3})")
        .unwrap()
});

pub struct WebVtt;

impl WebVtt {
    pub fn new() -> Self {
        WebVtt
    }
}

impl SubtitleFormat for WebVtt {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, lines: &[&str], _file_name: &str) -> bool {
        let header = lines
            .iter()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim_start_matches('\u{feff}').trim_start().starts_with("WEBVTT"))
            .unwrap_or(false);
        header && lines.iter().any(|l| CUE_RE.is_match(l))
    }

    fn load(&self, lines: &[&str], _options: &CodecOptions) -> Result<Document> {
        let mut entries = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(caps) = CUE_RE.captures(lines[i]) else {
                i += 1;
                continue;
            };
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                body.push(lines[i]);
                i += 1;
            }
            let start = timecode(&caps, 1);
            let end = timecode(&caps, 5);
            entries.push(Entry::timed(start.millis(), end.millis(), body.join("\n")));
        }
        Ok(Document::new(entries))
    }

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String {
        let mut result = String::from("WEBVTT\n\n");
        for entry in &document.entries {
            result.push_str(&format!(
                "{} --> {}\n{}\n\n",
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

/// `HH:MM:SS.mmm`
pub fn format_timecode(ms: f64) -> String {
    let (h, m, s, ms) = TimeCode(ms).parts();
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

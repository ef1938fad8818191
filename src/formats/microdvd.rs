//! # MicroDVD (.sub) 格式
//!
//! 基于帧号的格式：`{起始帧}{结束帧}第一行|第二行`。
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册

use super::{CodecOptions, SubtitleFormat};
use crate::error::Result;
use crate::models::document::ms_to_frames;
use crate::models::{Document, Entry, FormatDescriptor, Span};

use once_cell::sync::Lazy;
use regex::Regex;

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::text("MicroDVD", ".sub").frame_based();

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\{(-?\d+)\}\{(-?\d*)\}(.*)$").unwrap());

pub struct MicroDvd;

impl MicroDvd {
    pub fn new() -> Self {
        MicroDvd
    }
}

impl SubtitleFormat for MicroDvd {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, lines: &[&str], _file_name: &str) -> bool {
        let non_empty: Vec<&&str> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
        if non_empty.is_empty() {
            return false;
        }
        let matching = non_empty.iter().filter(|l| LINE_RE.is_match(l)).count();
        matching * 2 > non_empty.len()
    }

    fn load(&self, lines: &[&str], _options: &CodecOptions) -> Result<Document> {
        let mut entries = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = LINE_RE.captures(line) else {
                continue;
            };
            let start: i64 = caps[1].parse().unwrap_or(0);
            let end: i64 = caps[2].parse().unwrap_or(start);
            let text = caps[3].trim();

            // 首行 `{1}{1}25.000` 声明帧率而不是字幕
            if i == 0 && text.parse::<f64>().is_ok() {
                continue;
            }
            entries.push(Entry::framed(start, end, text.replace('|', "\n")));
        }
        Ok(Document::new(entries))
    }

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String {
        let mut result = String::new();
        for entry in &document.entries {
            let (start, end) = match entry.span {
                Span::Frames { start, end } => (start, end),
                Span::Time { start, end } => (
                    ms_to_frames(start.millis(), options.frame_rate),
                    ms_to_frames(end.millis(), options.frame_rate),
                ),
            };
            result.push_str(&format!(
                "{{{}}}{{{}}}{}\n",
                start,
                end,
                entry.text.replace('\n', "|")
            ));
        }
        result
    }
}

//! # 常见错误修复
//!
//! 每一轮修复：
//! - 行首尾空白、连续空格、标点前多余空格（法语除外）
//! - 空行与空条目
//! - 英语中单独的小写 `i`
//! - 相邻条目的时间重叠
//!
//! 流水线会连续执行多轮，因为一轮修复可能暴露新的问题。
//!
//! ## 依赖关系
//! - 实现 `fixers::CommonErrorFixer`

use super::CommonErrorFixer;
use crate::models::{Document, Span, TimeCode};

use once_cell::sync::Lazy;
use regex::Regex;

/// 修复重叠时保留的最小间隔（毫秒）
const MIN_GAP_MS: f64 = 1.0;

static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S) +([,.!?:;])").unwrap());

static LOWERCASE_I_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bi\b").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct CommonErrors;

impl CommonErrors {
    pub fn new() -> Self {
        CommonErrors
    }

    fn fix_text(&self, text: &str, language: Option<&str>) -> String {
        let french = language == Some("fr");
        let english = language == Some("en");

        let mut lines = Vec::new();
        for line in text.lines() {
            let mut line = SPACES_RE.replace_all(line.trim(), " ").into_owned();
            if !french {
                line = SPACE_BEFORE_PUNCT_RE.replace_all(&line, "$1$2").into_owned();
            }
            if english {
                line = LOWERCASE_I_RE.replace_all(&line, "I").into_owned();
            }
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines.join("\n")
    }
}

impl CommonErrorFixer for CommonErrors {
    fn fix(&self, document: Document, language: Option<&str>) -> Document {
        let mut fixed = document;
        for entry in &mut fixed.entries {
            entry.text = self.fix_text(&entry.text, language);
        }
        fixed.entries.retain(|e| !e.text.is_empty());
        fix_overlaps(&mut fixed);
        fixed
    }
}

/// 将结束时间截到下一条的起始之前
fn fix_overlaps(document: &mut Document) {
    for i in 1..document.entries.len() {
        let next = document.entries[i].span;
        let current = &mut document.entries[i - 1].span;
        *current = match (*current, next) {
            (Span::Time { start, end }, Span::Time { start: next_start, .. })
                if end.0 > next_start.0 && next_start.0 - MIN_GAP_MS > start.0 =>
            {
                Span::Time {
                    start,
                    end: TimeCode(next_start.0 - MIN_GAP_MS),
                }
            }
            (Span::Frames { start, end }, Span::Frames { start: next_start, .. })
                if end > next_start && next_start - 1 > start =>
            {
                Span::Frames {
                    start,
                    end: next_start - 1,
                }
            }
            (span, _) => span,
        };
    }
}

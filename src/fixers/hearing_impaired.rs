//! # 听障文本去除
//!
//! 去除 `[声音]`、`(声音)`、`{声音}` 提示（`{\an8}` 这类样式标签保留）、
//! 全大写的说话人标签（`JOHN:`）以及只剩音乐符号的行；整理对话破折号。
//!
//! ## 依赖关系
//! - 实现 `fixers::HearingImpairedFilter`

use super::HearingImpairedFilter;

use once_cell::sync::Lazy;
use regex::Regex;

static CUES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^\\}][^}]*\}").unwrap()
});

static SPEAKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-\s*)?[A-Z][A-Z0-9 .'\-]*[A-Z]:\s*").unwrap()
});

static MUSIC_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-♪♫#\s]*$").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct HiRemover;

impl HiRemover {
    pub fn new() -> Self {
        HiRemover
    }
}

impl HearingImpairedFilter for HiRemover {
    fn remove_text_for_hi(&self, text: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        for line in text.lines() {
            let line = CUES_RE.replace_all(line, "");
            let line = SPEAKER_RE.replace(&line, "$1");
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if MUSIC_ONLY_RE.is_match(&line) {
                continue;
            }
            lines.push(line);
        }

        // 只剩一行时，对话破折号不再需要
        if lines.len() == 1 {
            if let Some(rest) = lines[0].strip_prefix('-') {
                lines[0] = rest.trim_start().to_string();
            }
        }
        lines.join("\n")
    }
}

//! # 大小写修复
//!
//! - `SentenceCasing`：全大写的行转为句子格式，句首字母大写
//! - `NameCasing`：在文档中曾以大写出现于句中的单词视为人名，
//!   其小写出现处恢复为人名写法
//!
//! ## 依赖关系
//! - 实现 `fixers::CasingFixer` 和 `fixers::NameCasingFixer`

use super::{CasingFixer, NameCasingFixer};
use crate::models::Document;

use regex::Regex;
use std::collections::HashMap;
use once_cell::sync::Lazy;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}[\p{L}']*").unwrap());

/// 标签整体匹配，替换时原样保留
static TAG_OR_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>|\p{L}[\p{L}']*").unwrap());

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

fn ends_sentence(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// 至少两个字母且没有小写字母
fn is_all_caps(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| !c.is_lowercase())
}

/// 句首字母大写；`<...>` 标签内的字符不计入
fn capitalize_sentences(text: &str, mut capitalize_next: bool) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        if in_tag {
            in_tag = c != '>';
            result.push(c);
            continue;
        }
        if c == '<' {
            in_tag = true;
            result.push(c);
            continue;
        }
        if c.is_alphabetic() {
            if capitalize_next {
                result.extend(c.to_uppercase());
            } else {
                result.push(c);
            }
            capitalize_next = false;
        } else {
            if ends_sentence(c) {
                capitalize_next = true;
            }
            result.push(c);
        }
    }
    result
}

fn last_visible_char(text: &str) -> Option<char> {
    let mut in_tag = false;
    let mut last = None;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag && !c.is_whitespace() => last = Some(c),
            _ => {}
        }
    }
    last
}

pub struct SentenceCasing;

impl CasingFixer for SentenceCasing {
    fn fix_casing(&self, document: &mut Document, language: Option<&str>) {
        let english = language.map_or(true, |l| l == "en");
        let mut previous_ended = true;
        for entry in &mut document.entries {
            let lowered: Vec<String> = entry
                .text
                .lines()
                .map(|line| {
                    if is_all_caps(line) {
                        line.to_lowercase()
                    } else {
                        line.to_string()
                    }
                })
                .collect();
            let mut text = capitalize_sentences(&lowered.join("\n"), previous_ended);
            if english {
                text = TAG_OR_WORD_RE
                    .replace_all(&text, |caps: &regex::Captures| match &caps[0] {
                        "i" => "I".to_string(),
                        "i'm" => "I'm".to_string(),
                        "i'll" => "I'll".to_string(),
                        "i've" => "I've".to_string(),
                        "i'd" => "I'd".to_string(),
                        other => other.to_string(),
                    })
                    .into_owned();
            }
            previous_ended = last_visible_char(&text).map_or(true, ends_sentence);
            entry.text = text;
        }
    }
}

pub struct NameCasing;

impl NameCasing {
    /// 句中出现、首字母大写但非全大写的单词
    fn collect_names(document: &Document) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for entry in &document.entries {
            for line in entry.lines() {
                let line = TAG_RE.replace_all(line, "");
                let line: &str = &line;
                for m in WORD_RE.find_iter(line) {
                    let word = m.as_str();
                    let before = line[..m.start()].trim_end();
                    let sentence_start = before
                        .chars()
                        .rev()
                        .find(|c| !matches!(c, '-' | '"' | '\'' | '>'))
                        .map_or(true, ends_sentence);
                    if sentence_start || word == "I" || word.starts_with("I'") {
                        continue;
                    }
                    let mut chars = word.chars();
                    let first_upper = chars.next().is_some_and(|c| c.is_uppercase());
                    let rest_has_lower = chars.any(|c| c.is_lowercase());
                    if first_upper && rest_has_lower {
                        names.entry(word.to_lowercase()).or_insert_with(|| word.to_string());
                    }
                }
            }
        }
        names
    }
}

impl NameCasingFixer for NameCasing {
    fn fix_names(&self, document: &mut Document) {
        let names = Self::collect_names(document);
        if names.is_empty() {
            return;
        }
        for entry in &mut document.entries {
            entry.text = TAG_OR_WORD_RE
                .replace_all(&entry.text, |caps: &regex::Captures| {
                    let word = &caps[0];
                    match names.get(word) {
                        Some(name) => name.clone(),
                        None => word.to_string(),
                    }
                })
                .into_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    #[test]
    fn test_all_caps_to_sentence_case() {
        let mut doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "WHERE ARE YOU GOING? HOME."),
            Entry::timed(1.0, 2.0, "and then"),
        ]);
        SentenceCasing.fix_casing(&mut doc, Some("en"));
        assert_eq!(doc.entries[0].text, "Where are you going? Home.");
        assert_eq!(doc.entries[1].text, "And then");
    }

    #[test]
    fn test_continuation_keeps_lowercase() {
        let mut doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "<i>I went to the</i>"),
            Entry::timed(1.0, 2.0, "store, i think."),
        ]);
        SentenceCasing.fix_casing(&mut doc, Some("en"));
        assert_eq!(doc.entries[0].text, "<i>I went to the</i>");
        assert_eq!(doc.entries[1].text, "store, I think.");
    }

    #[test]
    fn test_name_casing_restores_names() {
        let mut doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "I saw John yesterday."),
            Entry::timed(1.0, 2.0, "Where is john?"),
        ]);
        NameCasing.fix_names(&mut doc);
        assert_eq!(doc.entries[1].text, "Where is John?");
        assert_eq!(doc.entries[0].text, "I saw John yesterday.");
    }

    #[test]
    fn test_name_casing_ignores_sentence_starts() {
        let mut doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "Where is it? The box."),
            Entry::timed(1.0, 2.0, "where the box is"),
        ]);
        NameCasing.fix_names(&mut doc);
        assert_eq!(doc.entries[1].text, "where the box is");
    }
}

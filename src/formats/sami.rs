//! # SAMI (.smi) 格式
//!
//! ## 格式说明
//! ```text
//! <SAMI><HEAD><STYLE TYPE="text/css"><!--
//! .ENUSCC { Name: English; lang: en-US; }
//! --></STYLE></HEAD><BODY>
//! <SYNC Start=1000><P Class=ENUSCC>Hello<br>World
//! <SYNC Start=2500><P Class=ENUSCC>&nbsp;
//! </BODY></SAMI>
//! ```
//!
//! 每个 `<P Class=..>` 的类名保存在条目的 `extra` 中，头部样式表中声明的
//! 类用于按样式拆分输出。
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册

use super::{CodecOptions, SubtitleFormat};
use crate::error::Result;
use crate::models::{Document, Entry, FormatDescriptor};

use once_cell::sync::Lazy;
use regex::Regex;

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::text("SAMI", ".smi").with_style_split();

/// 未声明结束时间的最后一个条目的显示时长
const LAST_ENTRY_DURATION_MS: f64 = 3000.0;

const DEFAULT_CLASS: &str = "ENUSCC";

static BODY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body").unwrap());

static SYNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<sync\s+start\s*=\s*"?(\d+)"?[^>]*>"#).unwrap()
});

static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<p(?:\s+class\s*=\s*"?([\w-]+)"?)?[^>]*>"#).unwrap()
});

static CLASS_DECL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z0-9_-]+)\s*\{").unwrap());

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?([a-z]+)[^>]*>").unwrap());

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

pub struct Sami;

impl Sami {
    pub fn new() -> Self {
        Sami
    }
}

impl SubtitleFormat for Sami {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, lines: &[&str], _file_name: &str) -> bool {
        let mut has_sami = false;
        let mut has_sync = false;
        for line in lines {
            let lower = line.to_lowercase();
            has_sami |= lower.contains("<sami");
            has_sync |= SYNC_RE.is_match(line);
            if has_sami && has_sync {
                return true;
            }
        }
        false
    }

    fn load(&self, lines: &[&str], _options: &CodecOptions) -> Result<Document> {
        let content = lines.join("\n");
        let body_start = BODY_RE.find(&content).map(|m| m.start()).unwrap_or(0);
        let header = content[..body_start].to_string();

        let syncs: Vec<(usize, usize, f64)> = SYNC_RE
            .captures_iter(&content)
            .filter_map(|c| {
                let m = c.get(0)?;
                let start = c.get(1)?.as_str().parse::<f64>().ok()?;
                Some((m.start(), m.end(), start))
            })
            .collect();

        let mut entries = Vec::new();
        for (k, &(_, block_start, start)) in syncs.iter().enumerate() {
            let next = syncs.get(k + 1);
            let block_end = next.map(|s| s.0).unwrap_or(content.len());
            let block = &content[block_start..block_end];
            let end = next
                .map(|s| s.2)
                .unwrap_or(start + LAST_ENTRY_DURATION_MS);

            for (class, raw) in split_paragraphs(block) {
                let text = clean_text(raw);
                if text.is_empty() {
                    continue;
                }
                let entry = Entry::timed(start, end, text);
                entries.push(match class {
                    Some(class) => entry.with_extra(class),
                    None => entry,
                });
            }
        }

        let document = Document::new(entries);
        if header.trim().is_empty() {
            Ok(document)
        } else {
            Ok(document.with_header(header))
        }
    }

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String {
        let header = document
            .header
            .as_deref()
            .filter(|h| h.to_lowercase().contains("<style"))
            .map(|h| h.trim_end().to_string())
            .unwrap_or_else(default_header);
        let fallback_class = declared_classes(&header)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_CLASS.to_string());

        let mut result = header;
        result.push_str("\n<BODY>\n");
        for entry in &document.entries {
            let class = entry.extra.as_deref().unwrap_or(&fallback_class);
            result.push_str(&format!(
                "<SYNC Start={}><P Class={}>{}\n",
                entry.start_ms(options.frame_rate).round() as i64,
                class,
                entry.text.replace('\n', "<br>")
            ));
            result.push_str(&format!(
                "<SYNC Start={}><P Class={}>&nbsp;\n",
                entry.end_ms(options.frame_rate).round() as i64,
                class
            ));
        }
        result.push_str("</BODY>\n</SAMI>\n");
        result
    }

    fn style_classes(&self, document: &Document) -> Vec<String> {
        document
            .header
            .as_deref()
            .map(declared_classes)
            .unwrap_or_default()
    }
}

/// 头部样式表中声明的类名（按出现顺序，去重）
fn declared_classes(header: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for caps in CLASS_DECL_RE.captures_iter(header) {
        let name = caps[1].to_string();
        if !classes.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
            classes.push(name);
        }
    }
    classes
}

/// 将 SYNC 块拆分为 (类名, 原始文本) 列表
fn split_paragraphs(block: &str) -> Vec<(Option<String>, &str)> {
    let marks: Vec<(usize, usize, Option<String>)> = PARAGRAPH_RE
        .captures_iter(block)
        .filter_map(|c| {
            let m = c.get(0)?;
            Some((m.start(), m.end(), c.get(1).map(|x| x.as_str().to_string())))
        })
        .collect();

    if marks.is_empty() {
        return vec![(None, block)];
    }

    marks
        .iter()
        .enumerate()
        .map(|(i, (_, end, class))| {
            let stop = marks.get(i + 1).map(|m| m.0).unwrap_or(block.len());
            (class.clone(), &block[*end..stop])
        })
        .collect()
}

fn clean_text(raw: &str) -> String {
    let text = raw.replace(['\r', '\n'], "");
    let text = BR_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, |caps: &regex::Captures| {
        match caps[1].to_lowercase().as_str() {
            "i" | "b" | "u" => caps[0].to_lowercase(),
            _ => String::new(),
        }
    });
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn default_header() -> String {
    format!(
        "<SAMI>\n<HEAD>\n<TITLE></TITLE>\n<STYLE TYPE=\"text/css\">\n<!--\n\
         P {{ margin-left: 8pt; margin-right: 8pt; margin-bottom: 2pt; margin-top: 2pt;\n    \
         text-align: center; font-size: 20pt; font-family: Arial, Sans-serif;\n    \
         font-weight: bold; color: white; }}\n\
         .{} {{ Name: English; lang: en-US; SAMIType: CC; }}\n-->\n</STYLE>\n</HEAD>",
        DEFAULT_CLASS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<SAMI>
<HEAD>
<STYLE TYPE="text/css">
<!--
P { font-size: 20pt; }
.ENUSCC { Name: English; lang: en-US; }
.FRFRCC { Name: French; lang: fr-FR; }
-->
</STYLE>
</HEAD>
<BODY>
<SYNC Start=1000><P Class=ENUSCC>Hello<br>World<P Class=FRFRCC>Bonjour
<SYNC Start=2500><P Class=ENUSCC>&nbsp;
<SYNC Start=3000><P Class=ENUSCC><i>Tom &amp; Jerry</i>
<SYNC Start=4000><P Class=ENUSCC>&nbsp;
</BODY>
</SAMI>"#;

    fn load(s: &str) -> Document {
        let lines: Vec<&str> = s.lines().collect();
        Sami::new().load(&lines, &CodecOptions::default()).unwrap()
    }

    #[test]
    fn test_is_mine() {
        let lines: Vec<&str> = SAMPLE.lines().collect();
        assert!(Sami::new().is_mine(&lines, "a.smi"));
        assert!(!Sami::new().is_mine(&["<html>", "<body>"], "a.html"));
    }

    #[test]
    fn test_load_classes_and_times() {
        let doc = load(SAMPLE);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.entries[0].text, "Hello\nWorld");
        assert_eq!(doc.entries[0].extra.as_deref(), Some("ENUSCC"));
        assert_eq!(doc.entries[1].text, "Bonjour");
        assert_eq!(doc.entries[1].extra.as_deref(), Some("FRFRCC"));
        assert_eq!(doc.entries[1].end_ms(25.0), 2500.0);
        assert_eq!(doc.entries[2].text, "<i>Tom & Jerry</i>");
        assert_eq!(doc.entries[2].end_ms(25.0), 4000.0);
    }

    #[test]
    fn test_style_classes_from_header() {
        let doc = load(SAMPLE);
        assert_eq!(Sami::new().style_classes(&doc), vec!["ENUSCC", "FRFRCC"]);
    }

    #[test]
    fn test_round_trip() {
        let sami = Sami::new();
        let doc = load(SAMPLE);
        let text = sami.to_text(&doc, &CodecOptions::default());
        let again = load(&text);
        assert_eq!(doc.entries, again.entries);
    }

    #[test]
    fn test_body_found_after_non_ascii_header() {
        let header = "<SAMI>\n<HEAD>\n<TITLE>İSTANBUL İZMİR</TITLE>\n</HEAD>\n";
        let text = format!("{}<BODY>\n<SYNC Start=1000><P>Merhaba\n</BODY>\n</SAMI>", header);
        let doc = load(&text);
        assert_eq!(doc.header.as_deref(), Some(header));
        assert_eq!(doc.entries[0].text, "Merhaba");
    }

    #[test]
    fn test_default_header_when_missing() {
        let doc = Document::new(vec![Entry::timed(0.0, 1000.0, "x")]);
        let text = Sami::new().to_text(&doc, &CodecOptions::default());
        assert!(text.contains(".ENUSCC"));
        assert!(text.contains("<SYNC Start=0><P Class=ENUSCC>x"));
    }
}

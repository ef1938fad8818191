//! # iTunes Timed Text (.itt) 格式
//!
//! TTML 子集，时间码为 `HH:MM:SS:FF`，帧率由 `ttp:frameRate`
//! （及可选的 `ttp:frameRateMultiplier`）给出。输出强制 UTF-8 无 BOM，
//! 下游交付工具不接受 BOM。
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册

use super::{CodecOptions, SubtitleFormat};
use crate::error::Result;
use crate::models::{Document, EncodingPolicy, Entry, FormatDescriptor};

use once_cell::sync::Lazy;
use regex::Regex;

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::text("iTunes Timed Text", ".itt")
    .with_encoding(EncodingPolicy::Utf8NoBom);

const TTML_NAMESPACE: &str = "http://www.w3.org/ns/ttml";

static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<p\b([^>]*)>(.*?)</p>").unwrap());

static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w:]+)\s*=\s*"([^"]*)""#).unwrap());

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

pub struct ItunesTimedText;

impl ItunesTimedText {
    pub fn new() -> Self {
        ItunesTimedText
    }
}

impl SubtitleFormat for ItunesTimedText {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, lines: &[&str], file_name: &str) -> bool {
        let content = lines.join("\n");
        if !content.contains("<tt") || !content.contains(TTML_NAMESPACE) {
            return false;
        }
        file_name.to_lowercase().ends_with(".itt") || content.contains("ttp:frameRate")
    }

    fn load(&self, lines: &[&str], options: &CodecOptions) -> Result<Document> {
        let content = lines.join("\n");
        let fps = declared_frame_rate(&content).unwrap_or(options.frame_rate);

        let mut entries = Vec::new();
        for caps in PARAGRAPH_RE.captures_iter(&content) {
            let attrs = attributes(&caps[1]);
            let begin = attrs.iter().find(|(k, _)| k == "begin").map(|(_, v)| v.as_str());
            let end = attrs.iter().find(|(k, _)| k == "end").map(|(_, v)| v.as_str());
            let (Some(begin), Some(end)) = (begin, end) else {
                continue;
            };
            let (Some(start_ms), Some(end_ms)) = (parse_clock(begin, fps), parse_clock(end, fps))
            else {
                continue;
            };
            entries.push(Entry::timed(start_ms, end_ms, clean_text(&caps[2])));
        }
        Ok(Document::new(entries))
    }

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String {
        let fps = options.frame_rate;
        let (nominal, multiplier) = frame_rate_attributes(fps);

        let mut result = String::new();
        result.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        result.push_str(&format!(
            "<tt xmlns=\"{}\" xmlns:tts=\"{}#styling\" xmlns:ttp=\"{}#parameter\" \
             ttp:timeBase=\"smpte\" ttp:frameRate=\"{}\"{} ttp:dropMode=\"nonDrop\" xml:lang=\"en\">\n",
            TTML_NAMESPACE, TTML_NAMESPACE, TTML_NAMESPACE, nominal, multiplier
        ));
        result.push_str("  <head>\n    <styling>\n");
        result.push_str(
            "      <style xml:id=\"normal\" tts:fontFamily=\"sansSerif\" tts:fontSize=\"100%\" tts:textAlign=\"center\" tts:color=\"white\"/>\n",
        );
        result.push_str("    </styling>\n    <layout>\n");
        result.push_str(
            "      <region xml:id=\"bottom\" tts:origin=\"0% 85%\" tts:extent=\"100% 15%\" tts:displayAlign=\"after\"/>\n",
        );
        result.push_str("    </layout>\n  </head>\n");
        result.push_str("  <body style=\"normal\" region=\"bottom\">\n    <div>\n");
        for entry in &document.entries {
            result.push_str(&format!(
                "      <p begin=\"{}\" end=\"{}\">{}</p>\n",
                format_clock(entry.start_ms(fps), fps),
                format_clock(entry.end_ms(fps), fps),
                encode_text(&entry.text)
            ));
        }
        result.push_str("    </div>\n  </body>\n</tt>\n");
        result
    }
}

fn attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// 文档声明的有效帧率（frameRate × frameRateMultiplier）
fn declared_frame_rate(content: &str) -> Option<f64> {
    let start = content.find("<tt")?;
    let end = content[start..].find('>')? + start;
    let attrs = attributes(&content[start..end]);
    let rate: f64 = attrs
        .iter()
        .find(|(k, _)| k == "ttp:frameRate")?
        .1
        .trim()
        .parse()
        .ok()?;
    let multiplier = attrs
        .iter()
        .find(|(k, _)| k == "ttp:frameRateMultiplier")
        .and_then(|(_, v)| {
            let mut parts = v.split_whitespace().map(|p| p.parse::<f64>().ok());
            match (parts.next()??, parts.next()??) {
                (n, d) if d > 0.0 => Some(n / d),
                _ => None,
            }
        })
        .unwrap_or(1.0);
    Some(rate * multiplier)
}

/// 名义帧率与倍率属性（23.976 → 24 + "1000 1001"）
fn frame_rate_attributes(fps: f64) -> (u32, String) {
    let nominal = fps.round().max(1.0) as u32;
    if (fps - nominal as f64).abs() > 0.001 {
        (nominal, " ttp:frameRateMultiplier=\"1000 1001\"".to_string())
    } else {
        (nominal, String::new())
    }
}

/// 解析 `HH:MM:SS:FF` 或 `HH:MM:SS.mmm`
fn parse_clock(value: &str, fps: f64) -> Option<f64> {
    let value = value.trim();
    if let Some((hms, frac)) = value.split_once('.') {
        let secs = parse_hms(hms)?;
        return Some(secs * 1000.0 + super::parse_millis(frac) as f64);
    }
    let parts: Vec<&str> = value.split(':').collect();
    match parts.as_slice() {
        [h, m, s, f] => {
            let secs = parse_hms(&format!("{}:{}:{}", h, m, s))?;
            let frames: f64 = f.parse().ok()?;
            Some(secs * 1000.0 + frames * 1000.0 / fps)
        }
        [_, _, _] => parse_hms(value).map(|s| s * 1000.0),
        _ => None,
    }
}

fn parse_hms(value: &str) -> Option<f64> {
    let parts: Vec<u64> = value
        .split(':')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h, m, s] => Some(((h * 60 + m) * 60 + s) as f64),
        _ => None,
    }
}

fn format_clock(ms: f64, fps: f64) -> String {
    let ms = ms.max(0.0);
    let mut secs = (ms / 1000.0).floor() as u64;
    let mut frames = ((ms - secs as f64 * 1000.0) * fps / 1000.0).round() as u64;
    if frames as f64 >= fps.ceil() {
        secs += 1;
        frames = 0;
    }
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        frames
    )
}

fn encode_text(text: &str) -> String {
    let plain = TAG_RE.replace_all(text, "");
    plain
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br/>")
}

fn clean_text(raw: &str) -> String {
    let text = raw.replace(['\r', '\n'], "");
    let text = BR_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(fps: f64) -> CodecOptions {
        CodecOptions {
            frame_rate: fps,
            ..CodecOptions::default()
        }
    }

    #[test]
    fn test_format_and_parse_clock() {
        assert_eq!(format_clock(1040.0, 25.0), "00:00:01:01");
        assert_eq!(format_clock(3_661_000.0, 25.0), "01:01:01:00");
        assert_eq!(parse_clock("00:00:01:01", 25.0), Some(1040.0));
        assert_eq!(parse_clock("00:00:01.500", 25.0), Some(1500.0));
        assert_eq!(parse_clock("garbage", 25.0), None);
    }

    #[test]
    fn test_round_trip_quantized_to_frames() {
        let itt = ItunesTimedText::new();
        let doc = Document::new(vec![
            Entry::timed(1000.0, 2480.0, "Tom & Jerry\nsecond line"),
            Entry::timed(5000.0, 6000.0, "<i>styled</i>"),
        ]);
        let text = itt.to_text(&doc, &options(25.0));
        assert!(text.contains("ttp:frameRate=\"25\""));
        assert!(text.contains("Tom &amp; Jerry<br/>second line"));

        let lines: Vec<&str> = text.lines().collect();
        assert!(itt.is_mine(&lines, "out.itt"));
        let again = itt.load(&lines, &options(30.0)).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.entries[0].text, "Tom & Jerry\nsecond line");
        assert_eq!(again.entries[0].end_ms(25.0), 2480.0);
        assert_eq!(again.entries[1].text, "styled");
    }

    #[test]
    fn test_ntsc_multiplier() {
        let (nominal, attr) = frame_rate_attributes(23.976);
        assert_eq!(nominal, 24);
        assert!(attr.contains("1000 1001"));
        let content = "<tt xmlns=\"http://www.w3.org/ns/ttml\" ttp:frameRate=\"24\" ttp:frameRateMultiplier=\"1000 1001\">";
        let fps = declared_frame_rate(content).unwrap();
        assert!((fps - 23.976).abs() < 0.001);
    }
}

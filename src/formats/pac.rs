//! # PAC (.pac) 格式
//!
//! Screen Electronics 的专有字幕格式。文件本身不记录字符集，
//! 需要通过 `pac-codepage` 指定代码页，默认拉丁。
//!
//! ## 结构
//! ```text
//! 头部   [0]     0x01，其后 19 个 0x00
//! 记录   [0..4]  00 序号(LE) 60
//!        [4..8]  入点  HHMM(LE) SSFF(LE)，以十进制数字存储
//!        [8..12] 出点
//!        [12..14] 文本长度 + 4 (LE)
//!        [14..18] 0A FE 对齐 字体
//!        [18..]  文本 (FE 对齐 字体 = 换行，`<`/`>` = 斜体开/关)
//! 结尾   FF，11 个 0x00，11 00 "dummy end of file"
//! ```
//!
//! 支持的代码页：拉丁（ISO 8859-1 单字节布局）、希腊（ISO 8859-7）、
//! 西里尔（ISO 8859-5）。0xFE 保留为换行标记。
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册在 EBU STL 之后

use super::{BinaryFormat, CodecOptions};
use crate::error::{Result, SubconvError};
use crate::models::{Document, Entry, FormatDescriptor, PacCodePage};

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::binary("PAC", ".pac").time_based();

const HEADER_SIZE: usize = 20;
const RECORD_MARK: u8 = 0x60;
const LINE_MARK: u8 = 0xFE;
const END_MARK: u8 = 0xFF;
const ALIGN_CENTER: u8 = 0x02;
const FONT_NORMAL: u8 = 0x03;
const VERTICAL_BOTTOM: u8 = 0x0A;
const FOOTER_TEXT: &[u8] = b"dummy end of file";

pub struct Pac;

impl Pac {
    pub fn new() -> Self {
        Pac
    }
}

impl BinaryFormat for Pac {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn aliases(&self) -> &[&'static str] {
        &[".pac"]
    }

    fn is_mine(&self, bytes: &[u8], file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".pac")
            && bytes.len() > HEADER_SIZE + 4
            && bytes[0] == 0x01
            && bytes[1..HEADER_SIZE].iter().all(|&b| b == 0)
            && bytes[HEADER_SIZE + 3] == RECORD_MARK
    }

    fn load(&self, bytes: &[u8], options: &CodecOptions) -> Result<Document> {
        let page = supported_page(options)?;
        let fps = options.frame_rate;
        let malformed = |at: usize, what: &str| SubconvError::ParseError {
            format: DESCRIPTOR.name.to_string(),
            path: String::new(),
            reason: format!("{} at byte {}", what, at),
        };

        let mut entries = Vec::new();
        let mut pos = HEADER_SIZE;
        while pos < bytes.len() && bytes[pos] != END_MARK {
            let record = bytes
                .get(pos..pos + 14)
                .ok_or_else(|| malformed(pos, "truncated record"))?;
            if record[3] != RECORD_MARK {
                return Err(malformed(pos, "missing record marker"));
            }
            let start = timecode_ms(&record[4..8], fps);
            let end = timecode_ms(&record[8..12], fps);
            let length = u16::from_le_bytes([record[12], record[13]]) as usize;

            let body_start = pos + 14;
            let body = bytes
                .get(body_start..body_start + length)
                .filter(|b| b.len() >= 4)
                .ok_or_else(|| malformed(body_start, "truncated text"))?;
            entries.push(Entry::timed(start, end, decode_text(&body[4..], page)));
            pos = body_start + length;
        }
        Ok(Document::new(entries))
    }

    fn save(&self, document: &Document, options: &CodecOptions) -> Result<Vec<u8>> {
        let page = supported_page(options)?;
        let fps = options.frame_rate;

        let mut out = vec![0u8; HEADER_SIZE];
        out[0] = 0x01;
        for (i, entry) in document.entries.iter().enumerate() {
            let number = u16::try_from(i).map_err(|_| SubconvError::ConversionError {
                from: "document".to_string(),
                to: DESCRIPTOR.name.to_string(),
                reason: format!(
                    "{} subtitles exceed the record number range",
                    document.entries.len()
                ),
            })?;
            let text = encode_text(&entry.text, page);
            let length =
                u16::try_from(text.len() + 4).map_err(|_| SubconvError::ConversionError {
                    from: "document".to_string(),
                    to: DESCRIPTOR.name.to_string(),
                    reason: format!("subtitle {} is too long", i + 1),
                })?;

            out.push(0);
            out.extend_from_slice(&number.to_le_bytes());
            out.push(RECORD_MARK);
            out.extend_from_slice(&timecode_bytes(entry.start_ms(fps), fps));
            out.extend_from_slice(&timecode_bytes(entry.end_ms(fps), fps));
            out.extend_from_slice(&length.to_le_bytes());
            out.extend_from_slice(&[VERTICAL_BOTTOM, LINE_MARK, ALIGN_CENTER, FONT_NORMAL]);
            out.extend_from_slice(&text);
        }

        out.push(END_MARK);
        out.extend_from_slice(&[0u8; 11]);
        out.extend_from_slice(&[0x11, 0x00]);
        out.extend_from_slice(FOOTER_TEXT);
        Ok(out)
    }
}

/// 请求的代码页，未指定时为拉丁
fn supported_page(options: &CodecOptions) -> Result<PacCodePage> {
    let page = options.pac_code_page.unwrap_or(PacCodePage::Latin);
    match page {
        PacCodePage::Latin | PacCodePage::Greek | PacCodePage::Cyrillic => Ok(page),
        other => Err(SubconvError::ConversionError {
            from: "document".to_string(),
            to: DESCRIPTOR.name.to_string(),
            reason: format!("PAC code page {} is not supported", other),
        }),
    }
}

/// `HHMM` 和 `SSFF` 各自作为十进制数字存为 16 位小端
fn timecode_bytes(ms: f64, fps: f64) -> [u8; 4] {
    let fps = fps.round().max(1.0) as u64;
    let total_ms = ms.max(0.0).round() as u64;
    let secs = total_ms / 1000;
    let frames = ((total_ms % 1000) * fps / 1000).min(fps - 1);
    let high = ((secs / 3600).min(99) * 100 + (secs % 3600) / 60) as u16;
    let low = ((secs % 60) * 100 + frames) as u16;
    let [h0, h1] = high.to_le_bytes();
    let [l0, l1] = low.to_le_bytes();
    [h0, h1, l0, l1]
}

fn timecode_ms(tc: &[u8], fps: f64) -> f64 {
    let high = u16::from_le_bytes([tc[0], tc[1]]) as u64;
    let low = u16::from_le_bytes([tc[2], tc[3]]) as u64;
    let secs = (high / 100 * 60 + high % 100) * 60 + low / 100;
    secs as f64 * 1000.0 + (low % 100) as f64 * 1000.0 / fps.max(1.0)
}

fn encode_char(c: char, page: PacCodePage) -> u8 {
    let cp = c as u32;
    let byte = match page {
        _ if (0x20..0x7F).contains(&cp) && c != '<' && c != '>' => Some(cp),
        PacCodePage::Greek => match cp {
            0x0386..=0x03CD => Some(cp - 0x02D0),
            _ => None,
        },
        PacCodePage::Cyrillic => match cp {
            0x0401..=0x045F => Some(cp - 0x0360),
            _ => None,
        },
        _ => match cp {
            0xA0..=0xFD => Some(cp),
            _ => None,
        },
    };
    byte.and_then(|b| u8::try_from(b).ok())
        .filter(|b| *b != LINE_MARK)
        .unwrap_or(b'?')
}

fn decode_byte(b: u8, page: PacCodePage) -> Option<char> {
    let cp = b as u32;
    let cp = match (page, b) {
        (_, 0x20..=0x7E) => cp,
        (PacCodePage::Greek, 0xB6..=0xFD) => cp + 0x02D0,
        (PacCodePage::Cyrillic, 0xA1..=0xFF) => cp + 0x0360,
        (PacCodePage::Latin, 0xA0..=0xFD) => cp,
        _ => return None,
    };
    char::from_u32(cp)
}

fn encode_text(text: &str, page: PacCodePage) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("<i>") {
            out.push(b'<');
            rest = &rest[3..];
            continue;
        }
        if rest.starts_with("</i>") {
            out.push(b'>');
            rest = &rest[4..];
            continue;
        }
        if c == '<' {
            if let Some(close) = rest.find('>') {
                rest = &rest[close + 1..];
                continue;
            }
        }
        rest = &rest[c.len_utf8()..];
        match c {
            '\n' => out.extend_from_slice(&[LINE_MARK, ALIGN_CENTER, FONT_NORMAL]),
            '\r' => {}
            c => out.push(encode_char(c, page)),
        }
    }
    out
}

fn decode_text(bytes: &[u8], page: PacCodePage) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        match b {
            LINE_MARK => {
                out.push('\n');
                i += 2;
            }
            b'<' => out.push_str("<i>"),
            b'>' => out.push_str("</i>"),
            b => {
                if let Some(c) = decode_byte(b, page) {
                    out.push(c);
                }
            }
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

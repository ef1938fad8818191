//! # EBU STL (.stl) 格式
//!
//! EBU Tech 3264 字幕交换格式：1024 字节 GSI 头 + 若干 128 字节 TTI 块。
//!
//! ## 结构
//! ```text
//! GSI  [0..3]   CPN  代码页 ("850")
//!      [3..11]  DFC  "STL25.01" / "STL30.01"
//!      [238..243] TNB  TTI 块数
//! TTI  [1..3]   SN   字幕序号 (LE)
//!      [3]      EBN  扩展块号 (0xFF = 最后一块)
//!      [5..9]   TCI  入点 时:分:秒:帧
//!      [9..13]  TCO  出点
//!      [16..128] TF  文本 (0x8A 换行, 0x8F 填充)
//! ```
//!
//! ## 依赖关系
//! - 被 `formats/mod.rs` 注册为二进制探测链的第一个格式

use super::{BinaryFormat, CodecOptions};
use crate::error::{Result, SubconvError};
use crate::models::{Document, Entry, FormatDescriptor};

use chrono::Utc;

const DESCRIPTOR: FormatDescriptor = FormatDescriptor::binary("EBU STL", ".stl").time_based();

const GSI_SIZE: usize = 1024;
const TTI_SIZE: usize = 128;
const TEXT_FIELD_SIZE: usize = 112;

const NEWLINE: u8 = 0x8A;
const UNUSED: u8 = 0x8F;
const ITALIC_ON: u8 = 0x80;
const ITALIC_OFF: u8 = 0x81;

/// ISO 6937 变音符前缀与对应的组合字符
const DIACRITICS: [(u8, &str, &str); 7] = [
    (0xC1, "aeiouAEIOU", "àèìòùÀÈÌÒÙ"),
    (0xC2, "aeiouyAEIOUY", "áéíóúýÁÉÍÓÚÝ"),
    (0xC3, "aeiouAEIOU", "âêîôûÂÊÎÔÛ"),
    (0xC4, "anoANO", "ãñõÃÑÕ"),
    (0xC8, "aeiouyAEIOU", "äëïöüÿÄËÏÖÜ"),
    (0xCA, "aA", "åÅ"),
    (0xCB, "cC", "çÇ"),
];

/// ISO 6937 单字节特殊字符
const SPECIALS: [(u8, char); 5] = [(0xE1, 'Æ'), (0xE9, 'Ø'), (0xF1, 'æ'), (0xF9, 'ø'), (0xFB, 'ß')];

pub struct EbuStl;

impl EbuStl {
    pub fn new() -> Self {
        EbuStl
    }
}

impl BinaryFormat for EbuStl {
    fn descriptor(&self) -> &FormatDescriptor {
        &DESCRIPTOR
    }

    fn is_mine(&self, bytes: &[u8], _file_name: &str) -> bool {
        bytes.len() >= GSI_SIZE && disk_format_fps(bytes).is_some()
    }

    fn load(&self, bytes: &[u8], _options: &CodecOptions) -> Result<Document> {
        let fps = disk_format_fps(bytes)
            .filter(|_| bytes.len() >= GSI_SIZE)
            .ok_or_else(|| SubconvError::ParseError {
                format: DESCRIPTOR.name.to_string(),
                path: String::new(),
                reason: "Missing GSI block or STLxx.01 disk format code".to_string(),
            })?;

        let mut entries = Vec::new();
        let mut pending: Vec<u8> = Vec::new();
        for block in bytes[GSI_SIZE..].chunks_exact(TTI_SIZE) {
            let extension_number = block[3];
            let comment = block[15] != 0;
            if comment {
                continue;
            }
            pending.extend(block[16..].iter().copied().take_while(|&b| b != UNUSED));
            if extension_number != 0xFF {
                continue;
            }
            let start = timecode_ms(&block[5..9], fps);
            let end = timecode_ms(&block[9..13], fps);
            entries.push(Entry::timed(start, end, decode_text(&pending)));
            pending.clear();
        }
        Ok(Document::new(entries))
    }

    fn save(&self, document: &Document, options: &CodecOptions) -> Result<Vec<u8>> {
        let stl_fps: u32 = if options.frame_rate > 26.0 { 30 } else { 25 };
        let too_many = |what: String| SubconvError::ConversionError {
            from: "document".to_string(),
            to: DESCRIPTOR.name.to_string(),
            reason: what,
        };

        let mut blocks = Vec::new();
        for (i, entry) in document.entries.iter().enumerate() {
            let number = u16::try_from(i + 1).map_err(|_| {
                too_many(format!(
                    "{} subtitles exceed the subtitle number range",
                    document.entries.len()
                ))
            })?;
            let start = timecode_bytes(entry.start_ms(options.frame_rate), stl_fps);
            let end = timecode_bytes(entry.end_ms(options.frame_rate), stl_fps);

            let encoded = encode_text(&entry.text);
            let chunks = split_text_field(&encoded);
            let last = chunks.len() - 1;
            for (extension, chunk) in chunks.into_iter().enumerate() {
                let extension_number = if extension == last {
                    0xFF
                } else {
                    u8::try_from(extension)
                        .ok()
                        .filter(|n| *n < 0xFF)
                        .ok_or_else(|| {
                            too_many(format!(
                                "subtitle {} needs too many extension blocks",
                                number
                            ))
                        })?
                };
                blocks.push(tti_block(number, extension_number, start, end, chunk));
            }
        }

        if blocks.len() > 99_999 {
            return Err(too_many(format!(
                "{} TTI blocks exceed the block limit",
                blocks.len()
            )));
        }

        let first_in = document
            .entries
            .first()
            .map(|e| e.start_ms(options.frame_rate))
            .unwrap_or(0.0);
        let mut out = gsi_block(stl_fps, blocks.len(), document.entries.len(), first_in);
        for block in &blocks {
            out.extend_from_slice(block);
        }
        Ok(out)
    }
}

fn tti_block(
    number: u16,
    extension_number: u8,
    start: [u8; 4],
    end: [u8; 4],
    text: &[u8],
) -> [u8; TTI_SIZE] {
    let mut block = [0u8; TTI_SIZE];
    block[1..3].copy_from_slice(&number.to_le_bytes());
    block[3] = extension_number;
    block[5..9].copy_from_slice(&start);
    block[9..13].copy_from_slice(&end);
    block[13] = 20;
    block[14] = 2;
    let field = &mut block[16..];
    field.fill(UNUSED);
    field[..text.len()].copy_from_slice(text);
    block
}

/// 按 112 字节切分文本字段，变音符前缀不与其基字符分开
fn split_text_field(text: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > TEXT_FIELD_SIZE {
        let mut n = TEXT_FIELD_SIZE;
        if (0xC1..=0xCF).contains(&rest[n - 1]) {
            n -= 1;
        }
        let (head, tail) = rest.split_at(n);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}

/// 从 DFC 字段读取帧率
fn disk_format_fps(bytes: &[u8]) -> Option<f64> {
    match bytes.get(3..11)? {
        b"STL25.01" => Some(25.0),
        b"STL30.01" => Some(30.0),
        b"STL24.01" => Some(24.0),
        b"STL50.01" => Some(50.0),
        _ => None,
    }
}

fn timecode_ms(tc: &[u8], fps: f64) -> f64 {
    let secs = (tc[0] as u64 * 60 + tc[1] as u64) * 60 + tc[2] as u64;
    secs as f64 * 1000.0 + tc[3] as f64 * 1000.0 / fps
}

fn timecode_bytes(ms: f64, fps: u32) -> [u8; 4] {
    let total_frames = (ms.max(0.0) * fps as f64 / 1000.0).round() as u64;
    let frames = total_frames % fps as u64;
    let secs = total_frames / fps as u64;
    [
        (secs / 3600).min(99) as u8,
        ((secs % 3600) / 60) as u8,
        (secs % 60) as u8,
        frames as u8,
    ]
}

fn gsi_block(fps: u32, blocks: usize, subtitles: usize, first_in_ms: f64) -> Vec<u8> {
    let mut gsi = vec![b' '; GSI_SIZE];
    let mut put = |offset: usize, value: &str| {
        let bytes = value.as_bytes();
        gsi[offset..offset + bytes.len()].copy_from_slice(bytes);
    };

    let date = today_yymmdd();
    let tcf = timecode_bytes(first_in_ms, fps);
    put(0, "850");
    put(3, &format!("STL{}.01", fps));
    put(11, "1");
    put(12, "00");
    put(14, "09");
    put(224, &date);
    put(230, &date);
    put(236, "00");
    put(238, &format!("{:05}", blocks));
    put(243, &format!("{:05}", subtitles));
    put(248, "001");
    put(251, "40");
    put(253, "23");
    put(255, "1");
    put(256, "00000000");
    put(
        264,
        &format!("{:02}{:02}{:02}{:02}", tcf[0], tcf[1], tcf[2], tcf[3]),
    );
    put(272, "1");
    put(273, "1");
    gsi
}

/// 当前日期 YYMMDD（UTC）
fn today_yymmdd() -> String {
    Utc::now().format("%y%m%d").to_string()
}

fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("<i>") {
            out.push(ITALIC_ON);
            rest = &rest[3..];
            continue;
        }
        if rest.starts_with("</i>") {
            out.push(ITALIC_OFF);
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
            '\n' => out.push(NEWLINE),
            '\r' => {}
            c if (' '..='~').contains(&c) => out.push(c as u8),
            c => out.extend(encode_special(c)),
        }
    }
    out
}

fn encode_special(c: char) -> Vec<u8> {
    if let Some((b, _)) = SPECIALS.iter().find(|(_, s)| *s == c) {
        return vec![*b];
    }
    for (prefix, bases, composed) in DIACRITICS {
        if let Some(i) = composed.chars().position(|x| x == c) {
            if let Some(base) = bases.chars().nth(i) {
                return vec![prefix, base as u8];
            }
        }
    }
    vec![b'?']
}

fn decode_text(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        match b {
            NEWLINE => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            ITALIC_ON => out.push_str("<i>"),
            ITALIC_OFF => out.push_str("</i>"),
            0x20..=0x7E => out.push(b as char),
            0xC1..=0xCF => {
                let base = bytes.get(i).copied().unwrap_or(b' ') as char;
                i += 1;
                out.push(compose(b, base));
            }
            _ => {
                if let Some((_, c)) = SPECIALS.iter().find(|(s, _)| *s == b) {
                    out.push(*c);
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

fn compose(prefix: u8, base: char) -> char {
    DIACRITICS
        .iter()
        .find(|(p, _, _)| *p == prefix)
        .and_then(|(_, bases, composed)| {
            let i = bases.chars().position(|x| x == base)?;
            composed.chars().nth(i)
        })
        .unwrap_or(base)
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
    fn test_save_layout() {
        let doc = Document::new(vec![
            Entry::timed(1000.0, 2000.0, "Hello"),
            Entry::timed(3000.0, 4000.0, "World"),
        ]);
        let bytes = EbuStl::new().save(&doc, &options(25.0)).unwrap();
        assert_eq!(bytes.len(), GSI_SIZE + 2 * TTI_SIZE);
        assert_eq!(&bytes[3..11], b"STL25.01");
        assert_eq!(&bytes[238..243], b"00002");
        // 第一个 TTI 的入点 00:00:01:00
        assert_eq!(&bytes[GSI_SIZE + 5..GSI_SIZE + 9], &[0, 0, 1, 0]);
        assert_eq!(bytes[GSI_SIZE + 3], 0xFF);
    }

    #[test]
    fn test_round_trip() {
        let ebu = EbuStl::new();
        let doc = Document::new(vec![
            Entry::timed(1000.0, 2480.0, "Café <i>olé</i>\nSecond"),
            Entry::timed(61_000.0, 62_000.0, "Straße"),
        ]);
        let bytes = ebu.save(&doc, &options(25.0)).unwrap();
        assert!(ebu.is_mine(&bytes, "x.stl"));
        let again = ebu.load(&bytes, &options(25.0)).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.entries[0].text, "Café <i>olé</i>\nSecond");
        assert_eq!(again.entries[0].end_ms(25.0), 2480.0);
        assert_eq!(again.entries[1].text, "Straße");
        assert_eq!(again.entries[1].start_ms(25.0), 61_000.0);
    }

    #[test]
    fn test_is_mine_rejects_text() {
        let ebu = EbuStl::new();
        assert!(!ebu.is_mine(b"1\n00:00:01,000 --> 00:00:02,000\n", "a.srt"));
        let mut fake = vec![b' '; GSI_SIZE];
        fake[3..11].copy_from_slice(b"STL99.99");
        assert!(!ebu.is_mine(&fake, "a.stl"));
    }

    #[test]
    fn test_gsi_dates_are_today() {
        let bytes = EbuStl::new().save(&Document::default(), &options(25.0)).unwrap();
        let today = Utc::now().format("%y%m%d").to_string();
        assert_eq!(&bytes[224..230], today.as_bytes());
        assert_eq!(&bytes[230..236], today.as_bytes());
    }

    #[test]
    fn test_long_text_uses_extension_blocks() {
        let ebu = EbuStl::new();
        let text = "This first line is long enough to need more than one text field block\n\
                    and a second line which also keeps going for a while now";
        assert!(text.len() > TEXT_FIELD_SIZE);
        let doc = Document::new(vec![
            Entry::timed(1000.0, 2000.0, text),
            Entry::timed(3000.0, 4000.0, "Short"),
        ]);
        let bytes = ebu.save(&doc, &options(25.0)).unwrap();
        assert_eq!(bytes.len(), GSI_SIZE + 3 * TTI_SIZE);
        assert_eq!(&bytes[238..243], b"00003");
        assert_eq!(&bytes[243..248], b"00002");

        let first = &bytes[GSI_SIZE..GSI_SIZE + TTI_SIZE];
        let second = &bytes[GSI_SIZE + TTI_SIZE..GSI_SIZE + 2 * TTI_SIZE];
        assert_eq!(&first[1..3], &1u16.to_le_bytes());
        assert_eq!(first[3], 0);
        assert_eq!(&second[1..3], &1u16.to_le_bytes());
        assert_eq!(second[3], 0xFF);

        let again = ebu.load(&bytes, &options(25.0)).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.entries[0].text, text);
        assert_eq!(again.entries[1].text, "Short");
    }

    #[test]
    fn test_split_keeps_diacritic_with_base() {
        let mut text = vec![b'a'; TEXT_FIELD_SIZE - 1];
        text.extend_from_slice(&[0xC2, b'e', b'x']);
        let chunks = split_text_field(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), TEXT_FIELD_SIZE - 1);
        assert_eq!(chunks[1], &[0xC2, b'e', b'x']);
        assert_eq!(split_text_field(b""), vec![&b""[..]]);
    }

    #[test]
    fn test_subtitle_number_overflow_is_an_error() {
        let entries = (0..=u16::MAX as usize)
            .map(|i| Entry::timed(i as f64 * 10.0, i as f64 * 10.0 + 5.0, "x"))
            .collect();
        let err = EbuStl::new()
            .save(&Document::new(entries), &options(25.0))
            .unwrap_err();
        assert!(err.to_string().contains("subtitle number"));
    }
}

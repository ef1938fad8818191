//! # 文本编码
//!
//! 输出编码的选择与编码实现，以及输入文件的解码。
//!
//! ## 支持的编码
//! - UTF-8（默认带 BOM）、UTF-8 无 BOM
//! - UTF-16 LE/BE（带 BOM）
//! - ISO-8859-1、Windows-1252、US-ASCII（无法表示的字符写为 `?`）
//!
//! ## 依赖关系
//! - 被 `models/request.rs`, `convert/dispatch.rs`, `convert/detect.rs` 使用

use std::fmt;

/// Windows-1252 中 0x80..=0x9F 区间对应的字符
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž',
    '\u{8F}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}',
    'ž', 'Ÿ',
];

/// 文本编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    Utf16Le,
    Utf16Be,
    Latin1,
    Windows1252,
    Ascii,
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8 { bom: true }
    }
}

impl TextEncoding {
    /// 按名称或代码页编号查找编码
    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase().replace('_', "-");
        let enc = match key.as_str() {
            "utf-8" | "utf8" | "65001" => TextEncoding::Utf8 { bom: true },
            "utf-8-no-bom" | "utf8-no-bom" | "utf-8-nobom" => TextEncoding::Utf8 { bom: false },
            "utf-16" | "utf16" | "utf-16le" | "unicode" | "1200" => TextEncoding::Utf16Le,
            "utf-16be" | "unicodefffe" | "1201" => TextEncoding::Utf16Be,
            "iso-8859-1" | "latin1" | "latin-1" | "28591" => TextEncoding::Latin1,
            "windows-1252" | "cp1252" | "1252" => TextEncoding::Windows1252,
            "us-ascii" | "ascii" | "20127" => TextEncoding::Ascii,
            _ => return None,
        };
        Some(enc)
    }

    /// 编码文本（包括 BOM）
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 { bom } => {
                let mut out = Vec::with_capacity(text.len() + 3);
                if *bom {
                    out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
                }
                out.extend_from_slice(text.as_bytes());
                out
            }
            TextEncoding::Utf16Le => {
                let mut out = vec![0xFF, 0xFE];
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
            TextEncoding::Utf16Be => {
                let mut out = vec![0xFE, 0xFF];
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
                out
            }
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
            TextEncoding::Windows1252 => text.chars().map(encode_cp1252).collect(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 { bom: true } => "utf-8",
            TextEncoding::Utf8 { bom: false } => "utf-8 (no BOM)",
            TextEncoding::Utf16Le => "utf-16",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Ascii => "us-ascii",
        };
        write!(f, "{}", name)
    }
}

fn encode_cp1252(c: char) -> u8 {
    let code = c as u32;
    if code < 0x80 || (0xA0..0x100).contains(&code) {
        return code as u8;
    }
    CP1252_HIGH
        .iter()
        .position(|&h| h == c)
        .map(|i| 0x80 + i as u8)
        .unwrap_or(b'?')
}

fn decode_cp1252(b: u8) -> char {
    match b {
        0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
        _ => b as char,
    }
}

/// 解码输入文件：优先识别 BOM，其次 UTF-8，最后 Windows-1252
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| decode_cp1252(b)).collect(),
    }
}

fn decode_utf16(bytes: &[u8], f: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| f([c[0], c[1]])).collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(TextEncoding::from_name("UTF-8"), Some(TextEncoding::Utf8 { bom: true }));
        assert_eq!(TextEncoding::from_name("1252"), Some(TextEncoding::Windows1252));
        assert_eq!(TextEncoding::from_name("unicode"), Some(TextEncoding::Utf16Le));
        assert_eq!(TextEncoding::from_name("klingon-8"), None);
    }

    #[test]
    fn test_utf8_bom() {
        assert_eq!(TextEncoding::Utf8 { bom: true }.encode("a"), vec![0xEF, 0xBB, 0xBF, b'a']);
        assert_eq!(TextEncoding::Utf8 { bom: false }.encode("a"), vec![b'a']);
    }

    #[test]
    fn test_single_byte_encodings() {
        assert_eq!(TextEncoding::Latin1.encode("é€"), vec![0xE9, b'?']);
        assert_eq!(TextEncoding::Windows1252.encode("é€"), vec![0xE9, 0x80]);
        assert_eq!(TextEncoding::Ascii.encode("aé"), vec![b'a', b'?']);
    }

    #[test]
    fn test_decode_round_trip() {
        for enc in [
            TextEncoding::Utf8 { bom: true },
            TextEncoding::Utf8 { bom: false },
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
        ] {
            assert_eq!(decode_text(&enc.encode("Hëllo ♪")), "Hëllo ♪");
        }
        assert_eq!(decode_text(&[0x48, 0xE9, 0x80]), "Hé€");
    }
}

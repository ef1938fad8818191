//! # 字幕格式描述
//!
//! 描述一种具体字幕格式：名称、文本/二进制、时间/帧基准、默认扩展名，
//! 以及输出策略的小型配置（强制编码、样式拆分）。
//!
//! ## 依赖关系
//! - 被 `formats/` 和 `convert/` 使用
//! - 无外部模块依赖

use std::fmt;

/// 时间基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingBasis {
    /// 连续时间（毫秒）
    Time,
    /// 离散帧号
    Frames,
}

/// 格式类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Text,
    Binary,
}

/// 文本输出编码策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPolicy {
    /// 使用用户请求的编码
    Requested,
    /// 强制 UTF-8（带 BOM）
    Utf8,
    /// 强制 UTF-8（不带 BOM），下游工具不接受 BOM
    Utf8NoBom,
}

/// 格式描述符
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    /// 规范名称（匹配时忽略空白和大小写）
    pub name: &'static str,
    /// 默认扩展名，含前导点
    pub extension: &'static str,
    pub kind: FormatKind,
    pub basis: TimingBasis,
    pub encoding: EncodingPolicy,
    /// 源格式带样式类时，额外按类拆分输出
    pub supports_style_split: bool,
}

impl FormatDescriptor {
    /// 文本格式描述符（时间基准、可写、请求编码）
    pub const fn text(name: &'static str, extension: &'static str) -> Self {
        FormatDescriptor {
            name,
            extension,
            kind: FormatKind::Text,
            basis: TimingBasis::Time,
            encoding: EncodingPolicy::Requested,
            supports_style_split: false,
        }
    }

    /// 二进制格式描述符
    pub const fn binary(name: &'static str, extension: &'static str) -> Self {
        FormatDescriptor {
            name,
            extension,
            kind: FormatKind::Binary,
            basis: TimingBasis::Frames,
            encoding: EncodingPolicy::Requested,
            supports_style_split: false,
        }
    }

    pub const fn frame_based(mut self) -> Self {
        self.basis = TimingBasis::Frames;
        self
    }

    pub const fn time_based(mut self) -> Self {
        self.basis = TimingBasis::Time;
        self
    }

    pub const fn with_encoding(mut self, encoding: EncodingPolicy) -> Self {
        self.encoding = encoding;
        self
    }

    pub const fn with_style_split(mut self) -> Self {
        self.supports_style_split = true;
        self
    }

    pub fn is_text_based(&self) -> bool {
        self.kind == FormatKind::Text
    }

    /// 命令行使用的格式标记（去空白、小写）
    pub fn token(&self) -> String {
        normalize_token(self.name)
    }

    /// 判断用户标记是否指向本格式
    pub fn matches(&self, token: &str) -> bool {
        self.token() == normalize_token(token)
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 规范化格式标记：去掉所有空白并转小写
pub fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Sub Rip"), "subrip");
        assert_eq!(normalize_token("  EBU STL "), "ebustl");
        assert_eq!(normalize_token("WebVTT"), "webvtt");
    }

    #[test]
    fn test_descriptor_matches_ignores_case_and_spaces() {
        let d = FormatDescriptor::text("iTunes Timed Text", ".itt");
        assert!(d.matches("itunestimedtext"));
        assert!(d.matches("ITunes TimedText"));
        assert!(!d.matches("itunes"));
        assert_eq!(d.token(), "itunestimedtext");
    }

    #[test]
    fn test_builder_flags() {
        let d = FormatDescriptor::text("MicroDVD", ".sub")
            .frame_based()
            .with_encoding(EncodingPolicy::Utf8NoBom);
        assert_eq!(d.basis, TimingBasis::Frames);
        assert_eq!(d.encoding, EncodingPolicy::Utf8NoBom);
        assert!(d.is_text_based());
        assert!(!d.supports_style_split);
    }
}

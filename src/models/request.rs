//! # 转换请求
//!
//! 解析完成的批量转换参数：目标格式、时间偏移、帧率、编码、
//! PAC 代码页、输入/输出目录、覆盖策略以及四个独立的变换开关。
//!
//! ## 依赖关系
//! - 由 `commands/convert.rs` 从命令行参数构建
//! - 被 `convert/` 使用
//! - 使用 `utils/encoding.rs`

use crate::utils::encoding::TextEncoding;
use std::fmt;
use std::path::PathBuf;

/// 默认的当前帧率
pub const DEFAULT_FRAME_RATE: f64 = 23.976;

/// 四个独立的文本变换开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transforms {
    pub remove_text_for_hi: bool,
    pub fix_common_errors: bool,
    pub redo_casing: bool,
    pub multiple_replace: bool,
}

/// 批量转换请求
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// 目标格式标记（已去空白）
    pub target_format: String,
    /// 原始偏移字符串，在流水线中解析
    pub offset: Option<String>,
    /// 当前帧率
    pub frame_rate: f64,
    /// 目标帧率（触发重算）
    pub target_frame_rate: Option<f64>,
    pub encoding: TextEncoding,
    pub pac_code_page: Option<PacCodePage>,
    pub input_folder: PathBuf,
    pub output_folder: Option<PathBuf>,
    pub overwrite: bool,
    pub transforms: Transforms,
    /// 常见错误修复使用的语言提示
    pub language: Option<String>,
}

impl ConversionRequest {
    pub fn new(target_format: impl Into<String>, input_folder: PathBuf) -> Self {
        ConversionRequest {
            target_format: target_format.into().trim().replace(' ', ""),
            offset: None,
            frame_rate: DEFAULT_FRAME_RATE,
            target_frame_rate: None,
            encoding: TextEncoding::default(),
            pac_code_page: None,
            input_folder,
            output_folder: None,
            overwrite: false,
            transforms: Transforms::default(),
            language: None,
        }
    }
}

/// 解析帧率：接受逗号作为小数点，必须为正数
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim().replace(',', ".");
    match value.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Some(v),
        _ => None,
    }
}

/// PAC 代码页
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacCodePage {
    Latin,
    Greek,
    LatinCzech,
    Arabic,
    Hebrew,
    Thai,
    Cyrillic,
    ChineseTraditional,
    ChineseSimplified,
    Korean,
    Japanese,
}

impl PacCodePage {
    const ALL: [PacCodePage; 11] = [
        PacCodePage::Latin,
        PacCodePage::Greek,
        PacCodePage::LatinCzech,
        PacCodePage::Arabic,
        PacCodePage::Hebrew,
        PacCodePage::Thai,
        PacCodePage::Cyrillic,
        PacCodePage::ChineseTraditional,
        PacCodePage::ChineseSimplified,
        PacCodePage::Korean,
        PacCodePage::Japanese,
    ];

    pub fn from_number(n: i64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// 按名称或编号解析，未知时返回 None
    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value.split_whitespace().collect::<String>().to_lowercase();
        let page = match compact.as_str() {
            "latin" => PacCodePage::Latin,
            "greek" => PacCodePage::Greek,
            "czech" => PacCodePage::LatinCzech,
            "arabic" => PacCodePage::Arabic,
            "hebrew" => PacCodePage::Hebrew,
            "thai" => PacCodePage::Thai,
            "cyrillic" => PacCodePage::Cyrillic,
            "cht" | "traditionalchinese" => PacCodePage::ChineseTraditional,
            "chs" | "simplifiedchinese" => PacCodePage::ChineseSimplified,
            "korean" => PacCodePage::Korean,
            "japanese" => PacCodePage::Japanese,
            other => return other.parse::<i64>().ok().and_then(Self::from_number),
        };
        Some(page)
    }
}

impl fmt::Display for PacCodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacCodePage::Latin => "Latin",
            PacCodePage::Greek => "Greek",
            PacCodePage::LatinCzech => "Czech",
            PacCodePage::Arabic => "Arabic",
            PacCodePage::Hebrew => "Hebrew",
            PacCodePage::Thai => "Thai",
            PacCodePage::Cyrillic => "Cyrillic",
            PacCodePage::ChineseTraditional => "Traditional Chinese",
            PacCodePage::ChineseSimplified => "Simplified Chinese",
            PacCodePage::Korean => "Korean",
            PacCodePage::Japanese => "Japanese",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("23,976"), Some(23.976));
        assert_eq!(parse_frame_rate("0"), None);
        assert_eq!(parse_frame_rate("fast"), None);
    }

    #[test]
    fn test_pac_code_page_by_name() {
        assert_eq!(PacCodePage::parse("Latin"), Some(PacCodePage::Latin));
        assert_eq!(PacCodePage::parse("CHT"), Some(PacCodePage::ChineseTraditional));
        assert_eq!(
            PacCodePage::parse("Simplified Chinese"),
            Some(PacCodePage::ChineseSimplified)
        );
        assert_eq!(PacCodePage::parse("czech"), Some(PacCodePage::LatinCzech));
    }

    #[test]
    fn test_pac_code_page_by_number() {
        assert_eq!(PacCodePage::parse("4"), Some(PacCodePage::Hebrew));
        assert_eq!(PacCodePage::parse("10"), Some(PacCodePage::Japanese));
        assert_eq!(PacCodePage::parse("11"), None);
        assert_eq!(PacCodePage::parse("-1"), None);
        assert_eq!(PacCodePage::parse("Klingon"), None);
        assert_eq!(PacCodePage::parse("5"), Some(PacCodePage::Thai));
    }

    #[test]
    fn test_request_strips_spaces_from_target() {
        let req = ConversionRequest::new(" Sub Rip ", PathBuf::from("."));
        assert_eq!(req.target_format, "SubRip");
        assert_eq!(req.frame_rate, DEFAULT_FRAME_RATE);
    }
}

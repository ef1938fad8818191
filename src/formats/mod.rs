//! # 字幕格式模块
//!
//! 定义文本/二进制格式编解码器的统一接口，以及按优先级排序的格式注册表。
//!
//! ## 内置格式
//! - 文本（探测顺序）: SubRip, WebVTT, SAMI, iTunes Timed Text, MicroDVD
//! - 二进制（探测顺序）: EBU STL, PAC
//! - 纯文本导出（仅输出）
//!
//! ## 依赖关系
//! - 被 `convert/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: subrip, webvtt, sami, itunes, microdvd, ebu, pac, plain_text

pub mod ebu;
pub mod itunes;
pub mod microdvd;
pub mod pac;
pub mod plain_text;
pub mod sami;
pub mod subrip;
pub mod webvtt;

use crate::error::Result;
use crate::models::{normalize_token, Document, FormatDescriptor, PacCodePage};

/// 编解码器选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecOptions {
    /// 当前帧率（帧/时间换算使用）
    pub frame_rate: f64,
    pub pac_code_page: Option<PacCodePage>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            frame_rate: crate::models::request::DEFAULT_FRAME_RATE,
            pac_code_page: None,
        }
    }
}

/// 文本字幕格式
pub trait SubtitleFormat: Send + Sync {
    fn descriptor(&self) -> &FormatDescriptor;

    /// 低成本的结构嗅探，不做完整解析
    fn is_mine(&self, lines: &[&str], file_name: &str) -> bool;

    fn load(&self, lines: &[&str], options: &CodecOptions) -> Result<Document>;

    fn to_text(&self, document: &Document, options: &CodecOptions) -> String;

    /// 文档中声明的样式类（仅支持样式拆分的格式返回非空）
    fn style_classes(&self, _document: &Document) -> Vec<String> {
        Vec::new()
    }
}

/// 二进制/专有字幕格式
pub trait BinaryFormat: Send + Sync {
    fn descriptor(&self) -> &FormatDescriptor;

    /// 除名称外额外接受的目标标记（如扩展名）
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    fn is_mine(&self, bytes: &[u8], file_name: &str) -> bool;

    fn load(&self, bytes: &[u8], options: &CodecOptions) -> Result<Document>;

    /// 序列化为待写入的字节
    fn save(&self, document: &Document, options: &CodecOptions) -> Result<Vec<u8>>;

    fn matches_token(&self, token: &str) -> bool {
        let token = normalize_token(token);
        self.descriptor().token() == token
            || self.aliases().iter().any(|a| normalize_token(a) == token)
    }
}

/// 格式注册表：文本格式与二进制格式各自按优先级排列
pub struct FormatRegistry {
    text: Vec<Box<dyn SubtitleFormat>>,
    binary: Vec<Box<dyn BinaryFormat>>,
}

impl FormatRegistry {
    pub fn empty() -> Self {
        FormatRegistry {
            text: Vec::new(),
            binary: Vec::new(),
        }
    }

    /// 内置格式，按探测优先级注册
    pub fn builtin() -> Self {
        FormatRegistry::empty()
            .with_text(subrip::SubRip::new())
            .with_text(webvtt::WebVtt::new())
            .with_text(sami::Sami::new())
            .with_text(itunes::ItunesTimedText::new())
            .with_text(microdvd::MicroDvd::new())
            .with_binary(ebu::EbuStl::new())
            .with_binary(pac::Pac::new())
    }

    /// 追加文本格式（优先级低于已注册的格式）
    pub fn with_text(mut self, format: impl SubtitleFormat + 'static) -> Self {
        self.text.push(Box::new(format));
        self
    }

    /// 追加二进制格式（优先级低于已注册的格式）
    pub fn with_binary(mut self, format: impl BinaryFormat + 'static) -> Self {
        self.binary.push(Box::new(format));
        self
    }

    pub fn text_formats(&self) -> impl Iterator<Item = &dyn SubtitleFormat> {
        self.text.iter().map(|f| f.as_ref() as &dyn SubtitleFormat)
    }

    pub fn binary_formats(&self) -> impl Iterator<Item = &dyn BinaryFormat> {
        self.binary.iter().map(|f| f.as_ref() as &dyn BinaryFormat)
    }

    /// 按名称查找文本格式
    pub fn find_text(&self, token: &str) -> Option<&dyn SubtitleFormat> {
        self.text_formats().find(|f| f.descriptor().matches(token))
    }

    /// 按名称或别名查找二进制格式
    pub fn find_binary(&self, token: &str) -> Option<&dyn BinaryFormat> {
        self.binary_formats().find(|f| f.matches_token(token))
    }
}

/// 解析 `H:MM:SS` 后的毫秒字段，不足三位时右补零（`,2` 视为 200ms）
pub(crate) fn parse_millis(s: &str) -> u64 {
    let digits: String = s.chars().take(3).collect();
    format!("{:0<3}", digits).parse().unwrap_or(0)
}

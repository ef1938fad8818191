//! # 数据模型模块
//!
//! 定义统一的字幕文档、格式描述和转换请求数据模型。
//!
//! ## 依赖关系
//! - 被 `formats/`, `convert/`, `fixers/`, `imaging/` 使用
//! - 子模块: document, format, request

pub mod document;
pub mod format;
pub mod request;

pub use document::{Document, Entry, Span, TimeCode};
pub use format::{normalize_token, EncodingPolicy, FormatDescriptor, TimingBasis};
pub use request::{ConversionRequest, PacCodePage, Transforms};

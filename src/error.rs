//! # 统一错误处理模块
//!
//! 定义 subconv 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 外部协作者（OCR、解复用、光栅化）的 `anyhow::Error` 在此包装

use thiserror::Error;

/// subconv 统一错误类型
#[derive(Error, Debug)]
pub enum SubconvError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 检测与解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Input file too large: {path} ({size} bytes)")]
    FileTooLarge { path: String, size: u64 },

    #[error("Input file format unknown: {path}")]
    UnknownSourceFormat { path: String },

    #[error("Cannot convert from image based format: {0}")]
    ImageBasedSource(String),

    // ─────────────────────────────────────────────────────────────
    // 转换错误
    // ─────────────────────────────────────────────────────────────
    #[error("Target format '{0}' not found")]
    UnknownTargetFormat(String),

    #[error("Conversion failed: {from} -> {to}\nReason: {reason}")]
    ConversionError {
        from: String,
        to: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 外部协作者错误
    // ─────────────────────────────────────────────────────────────
    #[error("No {0} configured")]
    MissingCollaborator(&'static str),

    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{context}: {source}")]
    Collaborator {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid regex: {0}")]
    RegexError(#[from] regex::Error),
}

impl SubconvError {
    /// 包装外部协作者返回的错误
    pub fn collaborator(context: impl Into<String>, source: anyhow::Error) -> Self {
        SubconvError::Collaborator {
            context: context.into(),
            source,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, SubconvError>;

//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `convert`: 批量字幕格式转换
//! - `formats`: 列出支持的格式
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: convert

pub mod convert;

use clap::{Parser, Subcommand};

/// subconv - 批量字幕格式转换
#[derive(Parser, Debug)]
#[command(name = "subconv")]
#[command(version)]
#[command(about = "Batch subtitle format converter", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert subtitle files matching a pattern to a target format
    Convert(convert::ConvertArgs),

    /// List the supported subtitle formats
    Formats,
}

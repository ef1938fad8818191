//! # 批量处理模块
//!
//! 提供统一的文件批量处理能力。
//!
//! ## 功能
//! - 展开逗号分隔的 glob 模式并去重
//! - 顺序处理，逐文件报告
//! - 进度反馈与计数
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 使用
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchRunner, FileOutcome};

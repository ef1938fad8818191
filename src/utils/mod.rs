//! # 工具函数模块
//!
//! 提供美化输出、进度条和文本编码等工具。
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/` 与 `convert/` 模块使用
//! - 子模块: output, progress, encoding

pub mod encoding;
pub mod output;
pub mod progress;

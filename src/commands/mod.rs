//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `convert/`, `batch/`, `utils/`
//! - 子模块: convert, formats

pub mod convert;
pub mod formats;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令，返回是否全部成功
pub fn run(cmd: Commands) -> Result<bool> {
    match cmd {
        Commands::Convert(args) => convert::execute(args),
        Commands::Formats => formats::execute(),
    }
}

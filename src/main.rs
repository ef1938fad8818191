//! # subconv - 批量字幕格式转换
//!
//! 按模式批量读取字幕文件，识别源格式，执行可选的文本/时间修复，
//! 再写为目标格式。
//!
//! ## 子命令
//! - `convert` - 批量转换
//! - `formats` - 列出支持的格式
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/    (模式展开、顺序执行、计数)
//!   │     └── convert/  (检测、流水线、输出分派)
//!   │           ├── formats/  (格式编解码)
//!   │           ├── fixers/   (文本修复)
//!   │           ├── imaging/  (图像字幕)
//!   │           └── models/   (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```
//!
//! 退出码：全部文件转换成功为 0，否则为 1（参数错误同样为 1）。

mod batch;
mod cli;
mod commands;
mod convert;
mod error;
mod fixers;
mod formats;
mod imaging;
mod models;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = cli::convert::normalize_legacy_args(std::env::args_os());
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version 正常退出
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print().ok();
            std::process::exit(code);
        }
    };

    match commands::run(cli.command) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            utils::output::print_error(&format!("{}", e));
            std::process::exit(1);
        }
    }
}

//! # 美化输出工具
//!
//! 提供统一的终端输出样式，错误输出到 stderr。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/runner.rs` 使用
//! - 使用 `colored` crate

use colored::Colorize;

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印单个文件的转换结果：`N: 源 -> 目标... done.`
pub fn print_converted(number: usize, name: &str, outputs: &[String]) {
    println!(
        "{} {}: {} {} {}... {}",
        "[OK]".green().bold(),
        number,
        name.dimmed(),
        "->".cyan(),
        outputs.join(", "),
        "done.".green()
    );
}

/// 打印单个文件的失败原因
pub fn print_failed(number: usize, name: &str, reason: &str) {
    eprintln!(
        "{} {}: {} {} {}",
        "[ERR]".red().bold(),
        number,
        name,
        "->".cyan(),
        reason
    );
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

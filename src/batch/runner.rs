//! # 批量执行器
//!
//! 按顺序逐个处理文件，每个文件一次计数。
//!
//! ## 功能
//! - 处理前计入 `seen`，结束后计入 `converted` 或 `errored`
//! - 进度条显示，逐文件消息通过 `suspend` 打印
//! - 根据计数推导退出状态
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `utils/output.rs` 打印逐文件消息

use crate::utils::{output, progress};

use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

/// 单个文件处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// 转换成功，附带写出的文件
    Converted {
        outputs: Vec<PathBuf>,
        warnings: Vec<String>,
    },
    /// 转换失败
    Failed {
        reason: String,
        warnings: Vec<String>,
    },
}

impl FileOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, FileOutcome::Converted { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            FileOutcome::Converted { warnings, .. } | FileOutcome::Failed { warnings, .. } => {
                warnings
            }
        }
    }
}

/// 批量计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchCounters {
    /// 发现的文件数
    pub seen: usize,
    /// 成功转换数
    pub converted: usize,
    /// 失败数
    pub errored: usize,
}

impl BatchCounters {
    pub fn record(&mut self, outcome: &FileOutcome) {
        if outcome.is_converted() {
            self.converted += 1;
        } else {
            self.errored += 1;
        }
    }

    /// 所有文件都转换且没有错误时成功
    pub fn exit_success(&self) -> bool {
        self.seen == self.converted && self.errored == 0
    }
}

/// 批量执行器
#[derive(Debug, Default)]
pub struct BatchRunner {
    quiet: bool,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 隐藏进度条
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// 顺序处理文件列表
    pub fn run<F>(&self, files: &[PathBuf], mut processor: F) -> BatchCounters
    where
        F: FnMut(&Path) -> FileOutcome,
    {
        let pb = if self.quiet {
            ProgressBar::hidden()
        } else {
            progress::create_progress_bar(files.len() as u64, "Converting")
        };

        let mut counters = BatchCounters::default();
        for (index, file) in files.iter().enumerate() {
            counters.seen += 1;
            let outcome = processor(file);
            counters.record(&outcome);
            pb.suspend(|| report(index + 1, file, &outcome));
            pb.inc(1);
        }

        pb.finish_and_clear();
        counters
    }
}

fn report(number: usize, file: &Path, outcome: &FileOutcome) {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    for warning in outcome.warnings() {
        output::print_warning(&format!("{}: {}", name, warning));
    }

    match outcome {
        FileOutcome::Converted { outputs, .. } => {
            let targets: Vec<String> = outputs.iter().map(|p| p.display().to_string()).collect();
            output::print_converted(number, &name, &targets);
        }
        FileOutcome::Failed { reason, .. } => output::print_failed(number, &name, reason),
    }
}

//! # formats 命令实现
//!
//! 以表格列出内置格式和图像目标。
//!
//! ## 依赖关系
//! - 使用 `formats/` 注册表
//! - 使用 `tabled` 输出表格

use crate::convert::dispatch::{
    BLURAY_SUP_EXTENSION, BLURAY_SUP_TOKEN, VOBSUB_EXTENSION, VOBSUB_TOKEN,
};
use crate::error::Result;
use crate::formats::plain_text::{PLAIN_TEXT_EXTENSION, PLAIN_TEXT_LABEL};
use crate::formats::FormatRegistry;
use crate::models::{normalize_token, FormatDescriptor, TimingBasis};
use crate::utils::output;

use tabled::{Table, Tabled};

/// 格式列表行
#[derive(Debug, Clone, Tabled)]
struct FormatRow {
    #[tabled(rename = "Format")]
    name: String,
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Extension")]
    extension: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Timing")]
    timing: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

impl FormatRow {
    fn from_descriptor(descriptor: &FormatDescriptor, aliases: &[&str]) -> Self {
        let mut token = descriptor.token();
        if !aliases.is_empty() {
            token = format!("{} ({})", token, aliases.join(", "));
        }
        FormatRow {
            name: descriptor.name.to_string(),
            token,
            extension: descriptor.extension.to_string(),
            kind: if descriptor.is_text_based() { "text" } else { "binary" }.to_string(),
            timing: match descriptor.basis {
                TimingBasis::Time => "time",
                TimingBasis::Frames => "frames",
            }
            .to_string(),
            direction: "in/out".to_string(),
        }
    }

    fn output_only(name: &str, token: &str, extension: &str, kind: &str) -> Self {
        FormatRow {
            name: name.to_string(),
            token: token.to_string(),
            extension: extension.to_string(),
            kind: kind.to_string(),
            timing: "time".to_string(),
            direction: "out".to_string(),
        }
    }
}

fn format_rows(registry: &FormatRegistry) -> Vec<FormatRow> {
    let mut rows: Vec<FormatRow> = registry
        .text_formats()
        .map(|f| FormatRow::from_descriptor(f.descriptor(), &[]))
        .collect();
    rows.extend(
        registry
            .binary_formats()
            .map(|f| FormatRow::from_descriptor(f.descriptor(), f.aliases())),
    );
    rows.push(FormatRow::output_only(
        PLAIN_TEXT_LABEL,
        &normalize_token(PLAIN_TEXT_LABEL),
        PLAIN_TEXT_EXTENSION,
        "text",
    ));
    rows.push(FormatRow::output_only(
        "Blu-ray sup",
        BLURAY_SUP_TOKEN,
        BLURAY_SUP_EXTENSION,
        "image",
    ));
    rows.push(FormatRow::output_only(
        "VobSub",
        VOBSUB_TOKEN,
        &format!("{} + .idx", VOBSUB_EXTENSION),
        "image",
    ));
    rows
}

/// 执行 formats 命令
pub fn execute() -> Result<bool> {
    output::print_header("Supported formats");
    let rows = format_rows(&FormatRegistry::builtin());
    println!("{}", Table::new(&rows));
    output::print_info("Format names are matched ignoring case and spaces");
    Ok(true)
}

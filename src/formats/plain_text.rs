//! # 纯文本导出
//!
//! 仅输出格式。去掉格式标签，不输出序号和时间码，不重新折行，
//! 每个条目后跟一个空行。
//!
//! ## 依赖关系
//! - 被 `convert/dispatch.rs` 使用

use crate::models::Document;

use once_cell::sync::Lazy;
use regex::Regex;

/// 目标格式名称（匹配时忽略空白和大小写）
pub const PLAIN_TEXT_LABEL: &str = "Plain text";

pub const PLAIN_TEXT_EXTENSION: &str = ".txt";

static FORMATTING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>|\{\\[^}]*\}").unwrap());

/// 生成纯文本
pub fn generate_plain_text(document: &Document) -> String {
    let mut result = String::new();
    for entry in &document.entries {
        let text = FORMATTING_RE.replace_all(&entry.text, "");
        result.push_str(text.trim());
        result.push_str("\n\n");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    #[test]
    fn test_plain_text_strips_formatting() {
        let doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "<i>Hello</i>\nthere"),
            Entry::timed(1.0, 2.0, "{\\an8}Top <font color=\"red\">red</font>"),
        ]);
        assert_eq!(generate_plain_text(&doc), "Hello\nthere\n\nTop red\n\n");
    }
}

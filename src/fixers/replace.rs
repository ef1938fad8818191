//! # 多重替换
//!
//! 规则来自 CSV 文件，列为 `find,replace,kind`：
//!
//! ```text
//! find,replace,kind
//! colour,color,normal
//! MR\.,Mr.,case-insensitive
//! ^\s*-\s*$,,regex
//! ```
//!
//! 替换后文本为空的条目被标记为待删除，由流水线统一删除。
//!
//! ## 依赖关系
//! - 实现 `fixers::MultipleReplacer`
//! - 使用 `csv` + `serde` 读取规则

use super::{MultipleReplacer, ReplaceOutcome};
use crate::error::{Result, SubconvError};
use crate::models::Document;

use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// 规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    #[default]
    Normal,
    CaseInsensitive,
    Regex,
}

/// CSV 中的一条规则
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRule {
    pub find: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default)]
    pub kind: RuleKind,
}

/// 从 CSV 文件读取规则
pub fn load_rules(path: &Path) -> Result<Vec<ReplaceRule>> {
    if !path.exists() {
        return Err(SubconvError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    let mut rules = Vec::new();
    for record in reader.deserialize() {
        let rule: ReplaceRule = record?;
        if !rule.find.is_empty() {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// 已编译的规则集
#[derive(Debug, Default)]
pub struct RuleReplacer {
    rules: Vec<(Regex, String)>,
}

impl RuleReplacer {
    pub fn new(rules: &[ReplaceRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let (pattern, replacement) = match rule.kind {
                RuleKind::Normal => (regex::escape(&rule.find), escape_replacement(&rule.replace)),
                RuleKind::CaseInsensitive => (
                    format!("(?i){}", regex::escape(&rule.find)),
                    escape_replacement(&rule.replace),
                ),
                RuleKind::Regex => (rule.find.clone(), rule.replace.clone()),
            };
            compiled.push((Regex::new(&pattern)?, replacement));
        }
        Ok(RuleReplacer { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 普通替换中的 `$` 不是捕获组引用
fn escape_replacement(s: &str) -> String {
    s.replace('$', "$$")
}

impl MultipleReplacer for RuleReplacer {
    fn replace(&self, document: Document) -> ReplaceOutcome {
        let mut document = document;
        let mut delete_indices = Vec::new();
        for (index, entry) in document.entries.iter_mut().enumerate() {
            let mut text = entry.text.clone();
            for (regex, replacement) in &self.rules {
                text = regex.replace_all(&text, replacement.as_str()).into_owned();
            }
            if text != entry.text && text.trim().is_empty() {
                delete_indices.push(index);
            }
            entry.text = text;
        }
        ReplaceOutcome {
            document,
            delete_indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use std::io::Write;

    fn rule(find: &str, replace: &str, kind: RuleKind) -> ReplaceRule {
        ReplaceRule {
            find: find.to_string(),
            replace: replace.to_string(),
            kind,
        }
    }

    #[test]
    fn test_rule_kinds() {
        let replacer = RuleReplacer::new(&[
            rule("colour", "color", RuleKind::Normal),
            rule("mr.", "Mr.", RuleKind::CaseInsensitive),
            rule(r"(\d+)\$", "$$$1", RuleKind::Regex),
        ])
        .unwrap();
        let doc = Document::new(vec![Entry::timed(0.0, 1.0, "MR. Smith's colour costs 5$")]);
        let outcome = replacer.replace(doc);
        assert_eq!(outcome.document.entries[0].text, "Mr. Smith's color costs $5");
        assert!(outcome.delete_indices.is_empty());
    }

    #[test]
    fn test_emptied_entries_are_marked() {
        let replacer = RuleReplacer::new(&[rule(r"^\[.*\]$", "", RuleKind::Regex)]).unwrap();
        let doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "[noise]"),
            Entry::timed(1.0, 2.0, "text"),
            Entry::timed(2.0, 3.0, "[music]"),
        ]);
        let outcome = replacer.replace(doc);
        assert_eq!(outcome.delete_indices, vec![0, 2]);
        assert_eq!(outcome.document.len(), 3);
    }

    #[test]
    fn test_load_rules_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "find,replace,kind").unwrap();
        writeln!(file, "colour,color,normal").unwrap();
        writeln!(file, "gonna,going to,case-insensitive").unwrap();
        writeln!(file, "\\s+$,,regex").unwrap();
        let rules = load_rules(file.path()).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1].kind, RuleKind::CaseInsensitive);
        assert!(RuleReplacer::new(&rules).is_ok());
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let result = RuleReplacer::new(&[rule("(", "", RuleKind::Regex)]);
        assert!(matches!(result, Err(SubconvError::RegexError(_))));
    }
}

//! # 文本修复模块
//!
//! 转换流水线调用的外部协作者接口，以及内置实现。
//!
//! ## 协作者
//! - `HearingImpairedFilter` - 去除听障辅助文本
//! - `CommonErrorFixer` - 常见错误修复（每次返回新文档）
//! - `CasingFixer` / `NameCasingFixer` - 大小写修复
//! - `MultipleReplacer` - 规则替换，并标记待删除条目
//! - `LanguageDetector` - 主语言检测
//!
//! ## 依赖关系
//! - 被 `convert/pipeline.rs` 和 `convert/dispatch.rs` 使用
//! - 子模块: hearing_impaired, common_errors, casing, replace, language

pub mod casing;
pub mod common_errors;
pub mod hearing_impaired;
pub mod language;
pub mod replace;

use crate::models::Document;

/// 听障文本过滤：只改写单条文本
pub trait HearingImpairedFilter {
    fn remove_text_for_hi(&self, text: &str) -> String;
}

/// 常见错误修复：消费文档并返回修复后的新文档
pub trait CommonErrorFixer {
    fn fix(&self, document: Document, language: Option<&str>) -> Document;
}

/// 通用大小写规则
pub trait CasingFixer {
    fn fix_casing(&self, document: &mut Document, language: Option<&str>);
}

/// 人名大小写规则
pub trait NameCasingFixer {
    fn fix_names(&self, document: &mut Document);
}

/// 规则替换的结果
#[derive(Debug, Clone, Default)]
pub struct ReplaceOutcome {
    pub document: Document,
    /// 替换后应删除的条目索引
    pub delete_indices: Vec<usize>,
}

/// 规则替换
pub trait MultipleReplacer {
    fn replace(&self, document: Document) -> ReplaceOutcome;
}

/// 主语言检测，返回 ISO 639-1 代码
pub trait LanguageDetector {
    fn detect(&self, document: &Document) -> Option<String>;
}

/// 流水线使用的全部文本协作者
pub struct Toolbox {
    pub hearing_impaired: Box<dyn HearingImpairedFilter>,
    pub common_errors: Box<dyn CommonErrorFixer>,
    pub casing: Box<dyn CasingFixer>,
    pub name_casing: Box<dyn NameCasingFixer>,
    pub replacer: Box<dyn MultipleReplacer>,
    pub language: Box<dyn LanguageDetector>,
}

impl Toolbox {
    /// 内置实现
    pub fn builtin(replacer: replace::RuleReplacer) -> Self {
        Toolbox {
            hearing_impaired: Box::new(hearing_impaired::HiRemover::new()),
            common_errors: Box::new(common_errors::CommonErrors::new()),
            casing: Box::new(casing::SentenceCasing),
            name_casing: Box::new(casing::NameCasing),
            replacer: Box::new(replacer),
            language: Box::new(language::StopWordDetector),
        }
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Toolbox::builtin(replace::RuleReplacer::default())
    }
}

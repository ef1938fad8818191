//! # 转换流水线
//!
//! 按固定顺序执行已启用的步骤，未启用的步骤不做任何事：
//! 1. 时间偏移 `sign:h:m:s:ms`
//! 2. 目标帧率重算，新帧率成为本文件后续换算的当前帧率
//! 3. 去除听障文本
//! 4. 常见错误修复，固定执行三轮
//! 5. 语言检测 → 大小写 → 人名大小写
//! 6. 多重替换，然后按索引从大到小删除条目
//!
//! 当前帧率作为值传入并随结果返回，不会带到下一个文件。
//!
//! ## 依赖关系
//! - 被 `convert/mod.rs` 调用
//! - 使用 `fixers::Toolbox` 中的协作者

use crate::fixers::Toolbox;
use crate::models::{ConversionRequest, Document};

/// 常见错误修复的轮数
pub const COMMON_ERROR_PASSES: usize = 3;

/// 解析偏移字符串，返回带符号的毫秒数
///
/// 忽略空字段后必须正好有 5 个字段；第一个字段是符号（`-`、`+` 或数字），
/// 第一或第二个字段以 `-` 开头时为负偏移。
pub fn parse_offset(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 5 {
        return None;
    }

    let sign = parts[0];
    let sign_ok = matches!(sign, "-" | "+") || sign.trim_start_matches(['-', '+']).parse::<u64>().is_ok();
    if !sign_ok {
        return None;
    }
    let negative = sign.starts_with('-') || parts[1].starts_with('-');

    // 每个字段限制在 u32 内，换算为 u64 毫秒不会溢出
    let field = |s: &str| s.parse::<u32>().ok().map(u64::from);
    let hours = field(parts[1].trim_start_matches('-'))?;
    let minutes = field(parts[2])?;
    let seconds = field(parts[3])?;
    let millis = field(parts[4])?;
    let total = (((hours * 60 + minutes) * 60 + seconds) * 1000 + millis) as f64;
    Some(if negative { -total } else { total })
}

/// 流水线结果
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub document: Document,
    /// 执行后的当前帧率
    pub frame_rate: f64,
    /// 非致命问题
    pub warnings: Vec<String>,
}

pub struct ConversionPipeline<'a> {
    toolbox: &'a Toolbox,
}

impl<'a> ConversionPipeline<'a> {
    pub fn new(toolbox: &'a Toolbox) -> Self {
        Self { toolbox }
    }

    pub fn run(
        &self,
        document: Document,
        request: &ConversionRequest,
        frame_rate: f64,
    ) -> PipelineOutcome {
        let mut document = document;
        let mut frame_rate = frame_rate;
        let mut warnings = Vec::new();
        let transforms = request.transforms;

        if let Some(offset) = request.offset.as_deref().filter(|o| !o.trim().is_empty()) {
            match parse_offset(offset) {
                Some(ms) => document.shift(ms, frame_rate),
                None => warnings.push(format!("unable to read offset {}", offset)),
            }
        }

        if let Some(target) = request.target_frame_rate {
            document.change_frame_rate(frame_rate, target);
            frame_rate = target;
        }

        if transforms.remove_text_for_hi {
            let filter = &self.toolbox.hearing_impaired;
            for entry in &mut document.entries {
                entry.text = filter.remove_text_for_hi(&entry.text);
            }
        }

        if transforms.fix_common_errors {
            let language = request.language.as_deref();
            for _ in 0..COMMON_ERROR_PASSES {
                document = self.toolbox.common_errors.fix(document, language);
            }
        }

        if transforms.redo_casing {
            let language = self.toolbox.language.detect(&document);
            self.toolbox
                .casing
                .fix_casing(&mut document, language.as_deref());
            self.toolbox.name_casing.fix_names(&mut document);
        }

        if transforms.multiple_replace {
            let outcome = self.toolbox.replacer.replace(document);
            document = outcome.document;
            document.remove_by_indices(&outcome.delete_indices);
        }

        PipelineOutcome {
            document,
            frame_rate,
            warnings,
        }
    }
}

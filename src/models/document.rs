//! # 字幕文档数据模型
//!
//! 文档是条目的有序序列（插入顺序即显示顺序）。同一文档内的条目
//! 要么全部基于时间，要么全部基于帧号；两者之间的转换是显式步骤。
//!
//! ## 依赖关系
//! - 被 `formats/`, `convert/`, `fixers/`, `imaging/` 使用
//! - 使用 `models/format.rs` 的 `TimingBasis`

use super::format::TimingBasis;

/// 时间码（毫秒，可为负）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TimeCode(pub f64);

impl TimeCode {
    pub fn from_parts(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Self {
        TimeCode(((hours * 60 + minutes) * 60 + seconds) as f64 * 1000.0 + millis as f64)
    }

    pub fn millis(&self) -> f64 {
        self.0
    }

    /// 拆分为 (时, 分, 秒, 毫秒)，负值按 0 处理
    pub fn parts(&self) -> (u64, u64, u64, u64) {
        let total = self.0.max(0.0).round() as u64;
        let millis = total % 1000;
        let secs = total / 1000;
        (secs / 3600, (secs % 3600) / 60, secs % 60, millis)
    }
}

/// 条目的起止位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Span {
    Time { start: TimeCode, end: TimeCode },
    Frames { start: i64, end: i64 },
}

impl Span {
    pub fn basis(&self) -> TimingBasis {
        match self {
            Span::Time { .. } => TimingBasis::Time,
            Span::Frames { .. } => TimingBasis::Frames,
        }
    }
}

/// 单个字幕条目
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub span: Span,
    /// 显示文本，多行以 `\n` 分隔
    pub text: String,
    /// 样式类标记，仅用于按样式拆分输出
    pub extra: Option<String>,
}

impl Entry {
    pub fn timed(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Entry {
            span: Span::Time {
                start: TimeCode(start_ms),
                end: TimeCode(end_ms),
            },
            text: text.into(),
            extra: None,
        }
    }

    pub fn framed(start: i64, end: i64, text: impl Into<String>) -> Self {
        Entry {
            span: Span::Frames { start, end },
            text: text.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// 起始时间（毫秒），帧号按给定帧率换算
    pub fn start_ms(&self, fps: f64) -> f64 {
        match self.span {
            Span::Time { start, .. } => start.millis(),
            Span::Frames { start, .. } => frames_to_ms(start, fps),
        }
    }

    /// 结束时间（毫秒），帧号按给定帧率换算
    pub fn end_ms(&self, fps: f64) -> f64 {
        match self.span {
            Span::Time { end, .. } => end.millis(),
            Span::Frames { end, .. } => frames_to_ms(end, fps),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

/// 字幕文档
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub entries: Vec<Entry>,
    /// 格式相关的头部（如 SAMI 的样式表）
    pub header: Option<String>,
}

impl Document {
    pub fn new(entries: Vec<Entry>) -> Self {
        Document {
            entries,
            header: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 文档的时间基准；空文档视为时间基准
    pub fn basis(&self) -> TimingBasis {
        self.entries
            .first()
            .map(|e| e.span.basis())
            .unwrap_or(TimingBasis::Time)
    }

    /// 将所有条目平移一个带符号的时长
    pub fn shift(&mut self, offset_ms: f64, fps: f64) {
        let frames = ms_to_frames(offset_ms, fps);
        for entry in &mut self.entries {
            entry.span = match entry.span {
                Span::Time { start, end } => Span::Time {
                    start: TimeCode(start.0 + offset_ms),
                    end: TimeCode(end.0 + offset_ms),
                },
                Span::Frames { start, end } => Span::Frames {
                    start: start + frames,
                    end: end + frames,
                },
            };
        }
    }

    /// 帧率变更：保持帧位置不变，按新帧率重算时间
    pub fn change_frame_rate(&mut self, old_fps: f64, new_fps: f64) {
        if old_fps <= 0.0 || new_fps <= 0.0 {
            return;
        }
        let factor = old_fps / new_fps;
        for entry in &mut self.entries {
            if let Span::Time { start, end } = entry.span {
                entry.span = Span::Time {
                    start: TimeCode(start.0 * factor),
                    end: TimeCode(end.0 * factor),
                };
            }
        }
    }

    /// 由时间码计算帧号
    pub fn to_frames(&mut self, fps: f64) {
        for entry in &mut self.entries {
            if let Span::Time { start, end } = entry.span {
                entry.span = Span::Frames {
                    start: ms_to_frames(start.0, fps),
                    end: ms_to_frames(end.0, fps),
                };
            }
        }
    }

    /// 由帧号计算时间码
    pub fn to_times(&mut self, fps: f64) {
        for entry in &mut self.entries {
            if let Span::Frames { start, end } = entry.span {
                entry.span = Span::Time {
                    start: TimeCode(frames_to_ms(start, fps)),
                    end: TimeCode(frames_to_ms(end, fps)),
                };
            }
        }
    }

    /// 使文档符合目标基准（只做一个方向的换算）
    pub fn ensure_basis(&mut self, basis: TimingBasis, fps: f64) {
        match (basis, self.basis()) {
            (TimingBasis::Frames, TimingBasis::Time) => self.to_frames(fps),
            (TimingBasis::Time, TimingBasis::Frames) => self.to_times(fps),
            _ => {}
        }
    }

    /// 按索引删除条目，从大到小删除以保持索引有效
    pub fn remove_by_indices(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for index in sorted {
            if index < self.entries.len() {
                self.entries.remove(index);
            }
        }
    }

    /// 取出样式类匹配（忽略大小写和首尾空白）的条目
    pub fn filter_by_class(&self, class_name: &str) -> Document {
        let wanted = class_name.trim();
        let entries = self
            .entries
            .iter()
            .filter(|e| {
                e.extra
                    .as_deref()
                    .map(|x| x.trim().eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Document {
            entries,
            header: self.header.clone(),
        }
    }

    /// 全部文本拼接（供语言检测使用）
    pub fn all_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn ms_to_frames(ms: f64, fps: f64) -> i64 {
    (ms * fps / 1000.0).round() as i64
}

pub fn frames_to_ms(frames: i64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    frames as f64 * 1000.0 / fps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(vec![
            Entry::timed(1000.0, 2000.0, "one"),
            Entry::timed(3000.0, 4500.0, "two"),
            Entry::timed(5000.0, 6000.0, "three"),
        ])
    }

    #[test]
    fn test_timecode_parts() {
        let tc = TimeCode::from_parts(1, 2, 3, 45);
        assert_eq!(tc.millis(), 3_723_045.0);
        assert_eq!(tc.parts(), (1, 2, 3, 45));
        assert_eq!(TimeCode(-10.0).parts(), (0, 0, 0, 0));
    }

    #[test]
    fn test_shift_time_based() {
        let mut doc = sample();
        doc.shift(-500.0, 25.0);
        assert_eq!(doc.entries[0].start_ms(25.0), 500.0);
        assert_eq!(doc.entries[2].end_ms(25.0), 5500.0);
    }

    #[test]
    fn test_shift_frame_based() {
        let mut doc = Document::new(vec![Entry::framed(25, 50, "a")]);
        doc.shift(1000.0, 25.0);
        assert_eq!(doc.entries[0].span, Span::Frames { start: 50, end: 75 });
    }

    #[test]
    fn test_change_frame_rate() {
        let mut doc = Document::new(vec![Entry::timed(1000.0, 2000.0, "a")]);
        doc.change_frame_rate(25.0, 50.0);
        assert_eq!(doc.entries[0].start_ms(25.0), 500.0);
        assert_eq!(doc.entries[0].end_ms(25.0), 1000.0);
    }

    #[test]
    fn test_ensure_basis_round_trip() {
        let mut doc = sample();
        doc.ensure_basis(TimingBasis::Frames, 25.0);
        assert_eq!(doc.basis(), TimingBasis::Frames);
        assert_eq!(doc.entries[1].span, Span::Frames { start: 75, end: 113 });
        doc.ensure_basis(TimingBasis::Time, 25.0);
        assert_eq!(doc.basis(), TimingBasis::Time);
        assert_eq!(doc.entries[0].start_ms(25.0), 1000.0);
        assert!(doc.entries.iter().all(|e| e.span.basis() == TimingBasis::Time));
    }

    #[test]
    fn test_remove_by_indices_high_to_low() {
        let mut doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "a"),
            Entry::timed(1.0, 2.0, "b"),
            Entry::timed(2.0, 3.0, "c"),
            Entry::timed(3.0, 4.0, "d"),
        ]);
        // 乱序且重复的索引，越界索引被忽略
        doc.remove_by_indices(&[1, 3, 1, 9]);
        let texts: Vec<_> = doc.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_filter_by_class() {
        let doc = Document::new(vec![
            Entry::timed(0.0, 1.0, "a").with_extra("ENUSCC"),
            Entry::timed(1.0, 2.0, "b").with_extra(" enuscc "),
            Entry::timed(2.0, 3.0, "c").with_extra("FRFRCC"),
            Entry::timed(3.0, 4.0, "d"),
        ]);
        assert_eq!(doc.filter_by_class("EnUsCc").len(), 2);
        assert_eq!(doc.filter_by_class("frfrcc").len(), 1);
        assert!(doc.filter_by_class("none").is_empty());
    }
}

//! # 文件收集器
//!
//! 把用户给出的逗号分隔 glob 模式展开为去重的文件列表。
//!
//! ## 功能
//! - 整个字符串指向已存在的文件时按字面处理（文件名可以含逗号）
//! - 否则按逗号拆分，去掉空白和空段
//! - 每个模式拆成目录部分和文件名 glob，相对目录以输入目录为根
//! - 忽略大小写去重，保持发现顺序
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `glob` 匹配文件名，`walkdir` 列出目录

use crate::error::{Result, SubconvError};

use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 相对模式的根目录
    input_folder: PathBuf,
}

impl FileCollector {
    pub fn new(input_folder: PathBuf) -> Self {
        Self { input_folder }
    }

    /// 拆分原始模式字符串
    pub fn split_patterns(&self, raw: &str) -> Vec<String> {
        if self.resolve_dir(Path::new(raw.trim())).is_file() {
            return vec![raw.trim().to_string()];
        }
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 收集所有匹配的文件
    pub fn collect(&self, raw: &str) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in self.split_patterns(raw) {
            for path in self.expand(&pattern)? {
                if seen.insert(path.to_string_lossy().to_lowercase()) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    fn resolve_dir(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.input_folder.join(dir)
        }
    }

    /// 展开单个模式
    fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern_path = Path::new(pattern);
        let (dir, file_glob) = match pattern_path.file_name() {
            Some(name) => (
                pattern_path.parent().unwrap_or(Path::new("")),
                name.to_string_lossy().into_owned(),
            ),
            None => (pattern_path, "*".to_string()),
        };
        let dir = self.resolve_dir(dir);

        let matcher = Pattern::new(&file_glob).map_err(|e| SubconvError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| matcher.matches_with(name, options))
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "x").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_comma_separated_patterns_relative_to_input_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.srt");
        touch(dir.path(), "b.srt");
        touch(dir.path(), "c.smi");
        touch(dir.path(), "d.txt");

        let collector = FileCollector::new(dir.path().to_path_buf());
        let files = collector.collect("*.srt, ,*.smi").unwrap();
        assert_eq!(names(&files), vec!["a.srt", "b.srt", "c.smi"]);
        assert!(files.iter().all(|p| p.starts_with(dir.path())));
    }

    #[test]
    fn test_overlapping_patterns_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "movie.srt");
        let collector = FileCollector::new(dir.path().to_path_buf());
        let files = collector.collect("*.srt,movie.*,MOVIE.SRT").unwrap();
        assert_eq!(names(&files), vec!["movie.srt"]);
    }

    #[test]
    fn test_literal_name_with_comma_is_not_split() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "hello, world.srt");
        let collector = FileCollector::new(dir.path().to_path_buf());
        assert_eq!(
            collector.split_patterns("hello, world.srt"),
            vec!["hello, world.srt"]
        );
        let files = collector.collect("hello, world.srt").unwrap();
        assert_eq!(names(&files), vec!["hello, world.srt"]);
    }

    #[test]
    fn test_pattern_with_directory_part() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("subs")).unwrap();
        touch(&dir.path().join("subs"), "x.vtt");
        touch(dir.path(), "y.vtt");

        let collector = FileCollector::new(dir.path().to_path_buf());
        let files = collector.collect("subs/*.vtt").unwrap();
        assert_eq!(names(&files), vec!["x.vtt"]);

        let absolute = format!("{}/*.vtt", dir.path().join("subs").display());
        let files = FileCollector::new(PathBuf::from("/nonexistent"))
            .collect(&absolute)
            .unwrap();
        assert_eq!(names(&files), vec!["x.vtt"]);
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let collector = FileCollector::new(dir.path().to_path_buf());
        assert!(collector.collect("missing/*.srt").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_glob_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let collector = FileCollector::new(dir.path().to_path_buf());
        let result = collector.collect("[.srt");
        assert!(matches!(result, Err(SubconvError::InvalidPattern { .. })));
    }
}

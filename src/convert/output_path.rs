//! # 输出路径
//!
//! 替换扩展名；设置了输出目录时移入该目录；不允许覆盖且目标已存在时，
//! 用随机 UUID 代替扩展名（`name.<uuid>.srt`），原名不再复用。
//!
//! 每个实际写出的文件（包括样式拆分的附加文件）都单独调用一次；
//! VobSub 的 `.sub`/`.idx` 作为一对一起解析。
//!
//! ## 依赖关系
//! - 被 `convert/dispatch.rs` 使用
//! - 使用 `uuid` 生成唯一名称

use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct OutputPathResolver {
    output_folder: Option<PathBuf>,
    overwrite: bool,
}

impl OutputPathResolver {
    pub fn new(output_folder: Option<PathBuf>, overwrite: bool) -> Self {
        Self {
            output_folder,
            overwrite,
        }
    }

    /// 计算目标路径，`extension` 带前导点（`.srt`）
    pub fn resolve(&self, source: &Path, extension: &str) -> PathBuf {
        let bare = extension.trim_start_matches('.');
        let path = self.target(source, bare);
        if !self.overwrite && path.exists() {
            return path.with_extension(format!("{}.{}", Uuid::new_v4(), bare));
        }
        path
    }

    /// 计算一对同名文件（`.sub` + `.idx`）的目标路径
    ///
    /// 任一目标已存在且不允许覆盖时，两个文件共用同一个 UUID 名称。
    pub fn resolve_pair(
        &self,
        source: &Path,
        primary: &str,
        companion: &str,
    ) -> (PathBuf, PathBuf) {
        let primary = primary.trim_start_matches('.');
        let companion = companion.trim_start_matches('.');
        let path = self.target(source, primary);
        let pair = path.with_extension(companion);
        if self.overwrite || (!path.exists() && !pair.exists()) {
            return (path, pair);
        }
        let unique = Uuid::new_v4();
        (
            path.with_extension(format!("{}.{}", unique, primary)),
            path.with_extension(format!("{}.{}", unique, companion)),
        )
    }

    fn target(&self, source: &Path, bare: &str) -> PathBuf {
        let path = source.with_extension(bare);
        match (&self.output_folder, path.file_name()) {
            (Some(folder), Some(name)) => folder.join(name),
            _ => path,
        }
    }
}

/// 在文件名最后一个 `.` 之前插入后缀；没有扩展名时追加在末尾
pub fn insert_before_extension(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_name = match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{}{}", name, suffix),
    };
    path.with_file_name(new_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_extension() {
        let resolver = OutputPathResolver::new(None, false);
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.en.srt");
        assert_eq!(resolver.resolve(&source, ".vtt"), dir.path().join("movie.en.vtt"));
    }

    #[test]
    fn test_relocates_into_output_folder() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let resolver = OutputPathResolver::new(Some(output.path().to_path_buf()), false);
        let source = input.path().join("movie.srt");
        assert_eq!(resolver.resolve(&source, ".smi"), output.path().join("movie.smi"));
    }

    #[test]
    fn test_collision_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.srt");
        std::fs::write(dir.path().join("movie.vtt"), "x").unwrap();

        let resolver = OutputPathResolver::new(None, false);
        let first = resolver.resolve(&source, ".vtt");
        let second = resolver.resolve(&source, ".vtt");
        assert_ne!(first, dir.path().join("movie.vtt"));
        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("movie."));
        assert!(name.ends_with(".vtt"));
        // movie + . + 36 位 uuid + .vtt
        assert_eq!(name.len(), "movie.".len() + 36 + ".vtt".len());
    }

    #[test]
    fn test_collision_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.srt");
        std::fs::write(dir.path().join("movie.vtt"), "x").unwrap();
        let resolver = OutputPathResolver::new(None, true);
        assert_eq!(resolver.resolve(&source, ".vtt"), dir.path().join("movie.vtt"));
    }

    #[test]
    fn test_pair_shares_unique_name_when_companion_exists() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.srt");
        std::fs::write(dir.path().join("movie.idx"), "x").unwrap();

        let resolver = OutputPathResolver::new(None, false);
        let (sub, idx) = resolver.resolve_pair(&source, ".sub", ".idx");
        assert_ne!(idx, dir.path().join("movie.idx"));
        assert_eq!(sub.with_extension("idx"), idx);
        assert!(sub.file_name().unwrap().to_string_lossy().ends_with(".sub"));

        let (sub, idx) = OutputPathResolver::new(None, true).resolve_pair(&source, ".sub", ".idx");
        assert_eq!(sub, dir.path().join("movie.sub"));
        assert_eq!(idx, dir.path().join("movie.idx"));
    }

    #[test]
    fn test_insert_before_extension() {
        assert_eq!(
            insert_before_extension(Path::new("/a/movie.smi"), "_ENUSCC"),
            PathBuf::from("/a/movie_ENUSCC.smi")
        );
        assert_eq!(
            insert_before_extension(Path::new("movie.mkv"), "_3_eng"),
            PathBuf::from("movie_3_eng.mkv")
        );
        assert_eq!(
            insert_before_extension(Path::new("/a.b/noext"), "_A"),
            PathBuf::from("/a.b/noext_A")
        );
    }
}

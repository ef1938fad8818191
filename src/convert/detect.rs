//! # 源格式检测
//!
//! 固定优先级的识别级联：
//! 1. 大小超过上限（10 MiB）的文件直接报告“过大”
//! 2. 文本探测：按注册顺序询问每个文本格式
//! 3. 二进制级联：EBU 在前，其余识别器按追加顺序
//!
//! 第一个嗅探成功的格式负责完整加载；嗅探失败只表示“不是这个格式”。
//!
//! ## 依赖关系
//! - 被 `convert/mod.rs` 调用
//! - 使用 `formats/` 注册表和 `utils/encoding.rs` 解码文本

use crate::error::{Result, SubconvError};
use crate::formats::{BinaryFormat, CodecOptions, FormatRegistry, SubtitleFormat};
use crate::models::Document;
use crate::utils::encoding::decode_text;

use std::fs;
use std::path::Path;

/// 通用级联的文件大小上限
pub const SIZE_CEILING: u64 = 10 * 1024 * 1024;

/// 文档的来源格式
#[derive(Clone, Copy)]
pub enum SourceFormat<'a> {
    Text(&'a dyn SubtitleFormat),
    Binary(&'a dyn BinaryFormat),
    /// 注册表之外的来源（容器轨道、OCR）
    External(&'a str),
}

impl<'a> SourceFormat<'a> {
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Text(f) => f.descriptor().name,
            SourceFormat::Binary(f) => f.descriptor().name,
            SourceFormat::External(name) => name,
        }
    }

    /// 需要按样式类拆分时返回样式类列表
    pub fn style_classes(&self, document: &Document) -> Vec<String> {
        match self {
            SourceFormat::Text(f) if f.descriptor().supports_style_split => {
                f.style_classes(document)
            }
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for SourceFormat<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceFormat({})", self.name())
    }
}

/// 检测结果
#[derive(Debug)]
pub enum Detection<'a> {
    Found {
        format: SourceFormat<'a>,
        document: Document,
    },
    TooLarge {
        size: u64,
    },
    Unknown,
}

/// 源格式检测器
pub struct FormatDetector<'a> {
    registry: &'a FormatRegistry,
    ceiling: u64,
}

impl<'a> FormatDetector<'a> {
    pub fn new(registry: &'a FormatRegistry) -> Self {
        Self {
            registry,
            ceiling: SIZE_CEILING,
        }
    }

    /// 检测文件；读取失败或嗅探成功后加载失败返回错误
    pub fn detect(&self, path: &Path, options: &CodecOptions) -> Result<Detection<'a>> {
        let size = fs::metadata(path)
            .map_err(|e| SubconvError::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?
            .len();
        if size >= self.ceiling {
            return Ok(Detection::TooLarge { size });
        }

        let bytes = fs::read(path).map_err(|e| SubconvError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.detect_bytes(&bytes, &file_name, options)
            .map_err(|e| match e {
                SubconvError::ParseError { format, reason, .. } => SubconvError::ParseError {
                    format,
                    path: path.display().to_string(),
                    reason,
                },
                other => other,
            })
    }

    /// 对内存中的内容执行级联
    pub fn detect_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        options: &CodecOptions,
    ) -> Result<Detection<'a>> {
        if bytes.len() as u64 >= self.ceiling {
            return Ok(Detection::TooLarge {
                size: bytes.len() as u64,
            });
        }

        let text = decode_text(bytes);
        let lines: Vec<&str> = text.lines().collect();
        for format in self.registry.text_formats() {
            if format.is_mine(&lines, file_name) {
                let document = format.load(&lines, options)?;
                return Ok(Detection::Found {
                    format: SourceFormat::Text(format),
                    document,
                });
            }
        }

        for format in self.registry.binary_formats() {
            if format.is_mine(bytes, file_name) {
                let document = format.load(bytes, options)?;
                return Ok(Detection::Found {
                    format: SourceFormat::Binary(format),
                    document,
                });
            }
        }

        Ok(Detection::Unknown)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Entry, FormatDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 按前缀嗅探的二进制识别器，记录被询问的次数
    pub(crate) struct PrefixFormat {
        pub descriptor: FormatDescriptor,
        pub prefix: &'static [u8],
        pub asked: Arc<AtomicUsize>,
    }

    impl PrefixFormat {
        pub(crate) fn new(name: &'static str, prefix: &'static [u8]) -> Self {
            PrefixFormat {
                descriptor: FormatDescriptor::binary(name, ".bin"),
                prefix,
                asked: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl BinaryFormat for PrefixFormat {
        fn descriptor(&self) -> &FormatDescriptor {
            &self.descriptor
        }

        fn is_mine(&self, bytes: &[u8], _file_name: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            bytes.starts_with(self.prefix)
        }

        fn load(&self, _bytes: &[u8], _options: &CodecOptions) -> Result<Document> {
            Ok(Document::new(vec![Entry::framed(0, 25, self.descriptor.name)]))
        }

        fn save(&self, document: &Document, _options: &CodecOptions) -> Result<Vec<u8>> {
            let mut out = self.prefix.to_vec();
            out.extend_from_slice(document.all_text().as_bytes());
            Ok(out)
        }
    }

    fn found_name(detection: &Detection) -> Option<String> {
        match detection {
            Detection::Found { format, .. } => Some(format.name().to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_text_prober_wins() {
        let registry = FormatRegistry::builtin();
        let detector = FormatDetector::new(&registry);
        let srt = b"1\n00:00:01,000 --> 00:00:02,000\nHello\n";
        let detection = detector
            .detect_bytes(srt, "a.srt", &CodecOptions::default())
            .unwrap();
        assert_eq!(found_name(&detection).as_deref(), Some("SubRip"));
    }

    #[test]
    fn test_binary_order_first_match_wins() {
        let first = PrefixFormat::new("First", b"XY");
        let second = PrefixFormat::new("Second", b"X");
        let second_asked = Arc::clone(&second.asked);
        let registry = FormatRegistry::empty().with_binary(first).with_binary(second);
        let detector = FormatDetector::new(&registry);

        let detection = detector
            .detect_bytes(b"XYZ", "a.bin", &CodecOptions::default())
            .unwrap();
        assert_eq!(found_name(&detection).as_deref(), Some("First"));
        assert_eq!(second_asked.load(Ordering::SeqCst), 0);

        let detection = detector
            .detect_bytes(b"XQ", "a.bin", &CodecOptions::default())
            .unwrap();
        assert_eq!(found_name(&detection).as_deref(), Some("Second"));
    }

    #[test]
    fn test_unknown_is_not_an_error() {
        let registry = FormatRegistry::builtin();
        let detector = FormatDetector::new(&registry);
        let detection = detector
            .detect_bytes(b"just some words", "notes.txt", &CodecOptions::default())
            .unwrap();
        assert!(matches!(detection, Detection::Unknown));
    }

    #[test]
    fn test_size_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.srt");
        std::fs::write(&path, vec![b'a'; 64]).unwrap();
        let registry = FormatRegistry::builtin();

        let detector = FormatDetector {
            registry: &registry,
            ceiling: 64,
        };
        let detection = detector.detect(&path, &CodecOptions::default()).unwrap();
        assert!(matches!(detection, Detection::TooLarge { size: 64 }));

        let detector = FormatDetector {
            registry: &registry,
            ceiling: 65,
        };
        let detection = detector.detect(&path, &CodecOptions::default()).unwrap();
        assert!(matches!(detection, Detection::Unknown));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let registry = FormatRegistry::builtin();
        let detector = FormatDetector::new(&registry);
        let result = detector.detect(Path::new("/nonexistent/x.srt"), &CodecOptions::default());
        assert!(matches!(result, Err(SubconvError::FileReadError { .. })));
    }
}

//! # 输出分派
//!
//! 目标格式标记（忽略空白和大小写）按以下顺序选择唯一的写出策略：
//! 1. 可写的文本格式：对齐时间/帧基准，应用格式的编码策略，
//!    来源支持样式类时按类拆分出附加文件
//! 2. 二进制格式（名称或别名）
//! 3. 纯文本导出
//! 4. `bluraysup`：逐条渲染位图，写为一个 SUP 文件
//! 5. `vobsub`：逐条渲染位图，写 `.sub` 和 `.idx`
//! 6. 以上都不匹配：未知目标格式
//!
//! ## 依赖关系
//! - 被 `convert/mod.rs` 调用
//! - 使用 `formats/`、`imaging/`、`convert/output_path.rs`

use super::detect::SourceFormat;
use super::output_path::{insert_before_extension, OutputPathResolver};
use crate::error::{Result, SubconvError};
use crate::fixers::LanguageDetector;
use crate::formats::plain_text::{generate_plain_text, PLAIN_TEXT_EXTENSION, PLAIN_TEXT_LABEL};
use crate::formats::{CodecOptions, FormatRegistry, SubtitleFormat};
use crate::imaging::{self, sup, vobsub, LineJoin, Rasterizer, RenderParams, Resolution};
use crate::models::{normalize_token, Document, EncodingPolicy, PacCodePage};
use crate::utils::encoding::TextEncoding;

use std::fs;
use std::path::{Path, PathBuf};

/// Blu-ray 图像字幕目标
pub const BLURAY_SUP_TOKEN: &str = "bluraysup";
pub const BLURAY_SUP_EXTENSION: &str = ".sup";

/// DVD 图像字幕目标
pub const VOBSUB_TOKEN: &str = "vobsub";
pub const VOBSUB_EXTENSION: &str = ".sub";
pub const VOBSUB_INDEX_EXTENSION: &str = ".idx";

/// 图像导出设置
#[derive(Debug, Clone, PartialEq)]
pub struct ImageExportSettings {
    pub bluray_resolution: Resolution,
    pub vobsub_resolution: Resolution,
    pub line_join: LineJoin,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
}

impl Default for ImageExportSettings {
    fn default() -> Self {
        ImageExportSettings {
            bluray_resolution: Resolution::BLURAY,
            vobsub_resolution: Resolution::DVD_PAL,
            line_join: LineJoin::Round,
            font_family: None,
            font_size: None,
        }
    }
}

impl ImageExportSettings {
    fn render_params(&self, canvas: Resolution) -> RenderParams {
        let mut params = RenderParams::new(canvas);
        params.line_join = self.line_join;
        if let Some(family) = &self.font_family {
            params.font_family = family.clone();
        }
        if let Some(size) = self.font_size.filter(|s| *s > 0.0) {
            params.font_size = size;
        }
        params
    }
}

/// 单个文件的写出任务
pub struct OutputJob<'j> {
    /// 命名输出文件所用的源路径（容器轨道会带上轨道后缀）
    pub source_path: &'j Path,
    pub source: SourceFormat<'j>,
    pub frame_rate: f64,
    pub encoding: TextEncoding,
    pub pac_code_page: Option<PacCodePage>,
}

impl OutputJob<'_> {
    fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            frame_rate: self.frame_rate,
            pac_code_page: self.pac_code_page,
        }
    }
}

pub struct OutputDispatcher<'a> {
    registry: &'a FormatRegistry,
    paths: &'a OutputPathResolver,
    language: &'a dyn LanguageDetector,
    rasterizer: Option<&'a dyn Rasterizer>,
    images: &'a ImageExportSettings,
}

impl<'a> OutputDispatcher<'a> {
    pub fn new(
        registry: &'a FormatRegistry,
        paths: &'a OutputPathResolver,
        language: &'a dyn LanguageDetector,
        images: &'a ImageExportSettings,
    ) -> Self {
        Self {
            registry,
            paths,
            language,
            rasterizer: None,
            images,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Option<&'a dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// 写出文档，返回写出的文件（主文件在前）
    pub fn dispatch(
        &self,
        target: &str,
        document: &mut Document,
        job: &OutputJob,
    ) -> Result<Vec<PathBuf>> {
        let token = normalize_token(target);

        if let Some(format) = self.registry.find_text(&token) {
            return self.write_text(format, document, job);
        }

        if let Some(format) = self.registry.find_binary(&token) {
            let path = self.paths.resolve(job.source_path, format.descriptor().extension);
            document.ensure_basis(format.descriptor().basis, job.frame_rate);
            let bytes = format.save(document, &job.codec_options())?;
            write_file(&path, &bytes)?;
            return Ok(vec![path]);
        }

        if token == normalize_token(PLAIN_TEXT_LABEL) {
            let path = self.paths.resolve(job.source_path, PLAIN_TEXT_EXTENSION);
            write_file(&path, &job.encoding.encode(&generate_plain_text(document)))?;
            return Ok(vec![path]);
        }

        if token == BLURAY_SUP_TOKEN {
            return self.write_bluray(document, job);
        }

        if token == VOBSUB_TOKEN {
            return self.write_vobsub(document, job);
        }

        Err(SubconvError::UnknownTargetFormat(target.to_string()))
    }

    fn write_text(
        &self,
        format: &dyn SubtitleFormat,
        document: &mut Document,
        job: &OutputJob,
    ) -> Result<Vec<PathBuf>> {
        let descriptor = format.descriptor();
        let options = job.codec_options();
        document.ensure_basis(descriptor.basis, job.frame_rate);

        let encoding = match descriptor.encoding {
            EncodingPolicy::Requested => job.encoding,
            EncodingPolicy::Utf8 => TextEncoding::Utf8 { bom: true },
            EncodingPolicy::Utf8NoBom => TextEncoding::Utf8 { bom: false },
        };

        let path = self.paths.resolve(job.source_path, descriptor.extension);
        write_file(&path, &encoding.encode(&format.to_text(document, &options)))?;
        let mut written = vec![path];

        // 只保留真子集：非空且不等于全部条目
        for class in job.source.style_classes(document) {
            let subset = document.filter_by_class(&class);
            if subset.is_empty() || subset.len() >= document.len() {
                continue;
            }
            let named = insert_before_extension(job.source_path, &format!("_{}", class.trim()));
            let extra = self.paths.resolve(&named, descriptor.extension);
            write_file(&extra, &encoding.encode(&format.to_text(&subset, &options)))?;
            written.push(extra);
        }
        Ok(written)
    }

    fn rasterizer(&self) -> Result<&'a dyn Rasterizer> {
        self.rasterizer
            .ok_or(SubconvError::MissingCollaborator("text rasterizer"))
    }

    fn write_bluray(&self, document: &Document, job: &OutputJob) -> Result<Vec<PathBuf>> {
        let rasterizer = self.rasterizer()?;
        let resolution = self.images.bluray_resolution;
        let params = self.images.render_params(resolution);
        let subtitles = imaging::render_document(document, job.frame_rate, rasterizer, &params)?;

        let path = self.paths.resolve(job.source_path, BLURAY_SUP_EXTENSION);
        write_file(&path, &sup::encode(&subtitles, resolution))?;
        Ok(vec![path])
    }

    fn write_vobsub(&self, document: &Document, job: &OutputJob) -> Result<Vec<PathBuf>> {
        let rasterizer = self.rasterizer()?;
        let resolution = self.images.vobsub_resolution;
        let params = self.images.render_params(resolution);
        let subtitles = imaging::render_document(document, job.frame_rate, rasterizer, &params)?;
        let language = vobsub::language_id(self.language.detect(document).as_deref());
        let output = vobsub::write(&subtitles, resolution, &language)?;

        let (path, idx_path) =
            self.paths
                .resolve_pair(job.source_path, VOBSUB_EXTENSION, VOBSUB_INDEX_EXTENSION);
        write_file(&path, &output.sub)?;
        write_file(&idx_path, output.idx.as_bytes())?;
        Ok(vec![path, idx_path])
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| SubconvError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

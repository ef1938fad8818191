//! # 单文件转换
//!
//! 每个文件的完整流程：获取源文档 → 流水线 → 输出分派。
//!
//! ## 源文档获取顺序
//! 1. 容器：解复用器认领的文件（`.mkv`/`.mks`）逐轨道转换，
//!    图像轨道跳过
//! 2. 图像字幕：Blu-ray SUP（`PG`）或 VobSub（MPEG-PS 包头）交给 OCR
//! 3. 其余文件走格式检测级联
//!
//! 当前帧率按值在调用链中传递，每个文件都从请求中的帧率开始。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 子模块: detect, pipeline, dispatch, output_path, external

pub mod detect;
pub mod dispatch;
pub mod external;
pub mod output_path;
pub mod pipeline;

use crate::batch::FileOutcome;
use crate::error::{Result, SubconvError};
use crate::fixers::Toolbox;
use crate::formats::{CodecOptions, FormatRegistry};
use crate::imaging::Rasterizer;
use crate::models::{ConversionRequest, Document};

use detect::{Detection, FormatDetector, SourceFormat};
use dispatch::{ImageExportSettings, OutputDispatcher, OutputJob};
use output_path::{insert_before_extension, OutputPathResolver};
use pipeline::ConversionPipeline;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// 不能转换为文本的容器轨道编码
pub const IMAGE_TRACK_CODECS: [&str; 2] = ["S_VOBSUB", "S_HDMV/PGS"];

/// 从图像字幕中识别文本
pub trait OcrEngine {
    fn extract(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<Document>;
}

/// 容器中的一条字幕轨道
#[derive(Debug, Clone)]
pub struct ContainerTrack {
    pub number: u64,
    pub codec_id: String,
    pub language: String,
    /// 文本轨道的内容，图像轨道为空文档
    pub document: Document,
}

impl ContainerTrack {
    pub fn is_image_based(&self) -> bool {
        IMAGE_TRACK_CODECS
            .iter()
            .any(|c| self.codec_id.eq_ignore_ascii_case(c))
    }
}

/// 媒体容器解复用
pub trait ContainerDemuxer {
    fn claims(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mkv") || e.eq_ignore_ascii_case("mks"))
            .unwrap_or(false)
    }

    fn subtitle_tracks(&self, path: &Path) -> anyhow::Result<Vec<ContainerTrack>>;
}

pub fn is_bluray_sup(header: &[u8]) -> bool {
    header.starts_with(b"PG")
}

pub fn is_vobsub(header: &[u8]) -> bool {
    header.starts_with(&[0x00, 0x00, 0x01, 0xBA])
}

/// 单文件转换器
pub struct Converter<'a> {
    registry: &'a FormatRegistry,
    toolbox: &'a Toolbox,
    request: &'a ConversionRequest,
    paths: OutputPathResolver,
    images: ImageExportSettings,
    rasterizer: Option<&'a dyn Rasterizer>,
    ocr: Option<&'a dyn OcrEngine>,
    demuxer: Option<&'a dyn ContainerDemuxer>,
}

impl<'a> Converter<'a> {
    pub fn new(
        registry: &'a FormatRegistry,
        toolbox: &'a Toolbox,
        request: &'a ConversionRequest,
    ) -> Self {
        Self {
            registry,
            toolbox,
            request,
            paths: OutputPathResolver::new(request.output_folder.clone(), request.overwrite),
            images: ImageExportSettings::default(),
            rasterizer: None,
            ocr: None,
            demuxer: None,
        }
    }

    pub fn with_images(mut self, images: ImageExportSettings) -> Self {
        self.images = images;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: &'a dyn Rasterizer) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn with_ocr(mut self, ocr: &'a dyn OcrEngine) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_demuxer(mut self, demuxer: &'a dyn ContainerDemuxer) -> Self {
        self.demuxer = Some(demuxer);
        self
    }

    /// 转换一个文件，所有错误都落在本文件内
    pub fn convert_file(&self, path: &Path) -> FileOutcome {
        let mut warnings = Vec::new();
        match self.acquire_and_convert(path, &mut warnings) {
            Ok(outputs) => FileOutcome::Converted { outputs, warnings },
            Err(e) => FileOutcome::Failed {
                reason: e.to_string(),
                warnings,
            },
        }
    }

    fn acquire_and_convert(&self, path: &Path, warnings: &mut Vec<String>) -> Result<Vec<PathBuf>> {
        if !path.is_file() {
            return Err(SubconvError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        if let Some(demuxer) = self.demuxer.filter(|d| d.claims(path)) {
            return self.convert_container(demuxer, path, warnings);
        }

        let header = read_header(path)?;
        if is_bluray_sup(&header) || is_vobsub(&header) {
            let ocr = self
                .ocr
                .ok_or(SubconvError::MissingCollaborator("OCR engine"))?;
            let bytes = std::fs::read(path).map_err(|e| SubconvError::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?;
            let document = ocr
                .extract(path, &bytes)
                .map_err(|e| SubconvError::collaborator("OCR failed", e))?;
            let source = self
                .registry
                .find_text(&self.request.target_format)
                .or_else(|| self.registry.find_text("subrip"))
                .map(SourceFormat::Text)
                .unwrap_or(SourceFormat::External("SubRip"));
            return self.convert_document(document, source, path, warnings);
        }

        let options = CodecOptions {
            frame_rate: self.request.frame_rate,
            pac_code_page: self.request.pac_code_page,
        };
        match FormatDetector::new(self.registry).detect(path, &options)? {
            Detection::Found { format, document } => {
                self.convert_document(document, format, path, warnings)
            }
            Detection::TooLarge { size } => Err(SubconvError::FileTooLarge {
                path: path.display().to_string(),
                size,
            }),
            Detection::Unknown => Err(SubconvError::UnknownSourceFormat {
                path: path.display().to_string(),
            }),
        }
    }

    fn convert_container(
        &self,
        demuxer: &dyn ContainerDemuxer,
        path: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<PathBuf>> {
        let tracks = demuxer
            .subtitle_tracks(path)
            .map_err(|e| SubconvError::collaborator("Failed to read container", e))?;
        let multiple = tracks.len() > 1;

        let mut outputs = Vec::new();
        let mut first_error = None;
        for track in tracks {
            if track.is_image_based() {
                warnings.push(format!(
                    "track {}: {}",
                    track.number,
                    SubconvError::ImageBasedSource(track.codec_id.clone())
                ));
                continue;
            }

            let name_path = if multiple {
                let language: String = track
                    .language
                    .chars()
                    .filter(|c| !matches!(c, '?' | '!' | '*' | ',' | '/'))
                    .collect();
                insert_before_extension(path, &format!("_{}_{}", track.number, language))
            } else {
                path.to_path_buf()
            };

            let source = SourceFormat::External(&track.codec_id);
            match self.convert_document(track.document.clone(), source, &name_path, warnings) {
                Ok(written) => outputs.extend(written),
                Err(e) => {
                    warnings.push(format!("track {}: {}", track.number, e));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if outputs.is_empty() => Err(SubconvError::ImageBasedSource(
                path.display().to_string(),
            )),
            None => Ok(outputs),
        }
    }

    fn convert_document(
        &self,
        document: Document,
        source: SourceFormat,
        name_path: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<PathBuf>> {
        let outcome =
            ConversionPipeline::new(self.toolbox).run(document, self.request, self.request.frame_rate);
        warnings.extend(outcome.warnings);

        let mut document = outcome.document;
        let job = OutputJob {
            source_path: name_path,
            source,
            frame_rate: outcome.frame_rate,
            encoding: self.request.encoding,
            pac_code_page: self.request.pac_code_page,
        };
        OutputDispatcher::new(
            self.registry,
            &self.paths,
            self.toolbox.language.as_ref(),
            &self.images,
        )
        .with_rasterizer(self.rasterizer)
        .dispatch(&self.request.target_format, &mut document, &job)
    }
}

/// 读取文件开头的几个字节用于图像格式嗅探
fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| SubconvError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut header = Vec::with_capacity(4);
    file.take(4)
        .read_to_end(&mut header)
        .map_err(|e| SubconvError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    Ok(header)
}

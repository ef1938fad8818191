//! # convert 命令实现
//!
//! 批量转换字幕文件格式。
//!
//! ## 功能
//! - 合并长选项与传统标记，构建转换请求
//! - 参数问题（偏移、编码、代码页、目录）只警告，使用安全默认值
//! - 展开模式、顺序转换、汇总计数
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `batch/`, `convert/`, `fixers/`, `formats/`, `imaging/`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchRunner, FileCollector};
use crate::cli::convert::{ConvertArgs, ConvertOptions};
use crate::convert::dispatch::{ImageExportSettings, BLURAY_SUP_TOKEN, VOBSUB_TOKEN};
use crate::convert::external::{CommandOcr, ExternalCommand, FfmpegDemuxer};
use crate::convert::Converter;
use crate::error::Result;
use crate::fixers::replace::{load_rules, RuleReplacer};
use crate::fixers::Toolbox;
use crate::formats::FormatRegistry;
use crate::imaging::svg_text::SvgTextRasterizer;
use crate::imaging::Resolution;
use crate::models::request::parse_frame_rate;
use crate::models::{normalize_token, ConversionRequest, PacCodePage, Transforms};
use crate::utils::encoding::TextEncoding;
use crate::utils::output;

use std::path::PathBuf;

/// 执行 convert 命令，返回是否全部成功
pub fn execute(args: ConvertArgs) -> Result<bool> {
    output::print_header(&format!("Converting to {}", args.format));

    let options = args.options();
    for token in &options.unknown {
        output::print_warning(&format!("Unknown option '{}' ignored", token));
    }

    let (request, warnings) = build_request(&args, &options);
    for warning in &warnings {
        output::print_warning(warning);
    }

    let toolbox = build_toolbox(&args, &request)?;
    let registry = FormatRegistry::builtin();

    let files = FileCollector::new(request.input_folder.clone()).collect(&args.pattern)?;
    if files.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            request.input_folder.display()
        ));
    } else {
        output::print_info(&format!("Found {} file(s) to convert", files.len()));
    }

    let images = ImageExportSettings {
        bluray_resolution: Resolution::parse_or(
            args.bluray_resolution.as_deref(),
            Resolution::BLURAY,
        ),
        vobsub_resolution: Resolution::parse_or(
            args.vobsub_resolution.as_deref(),
            Resolution::DVD_PAL,
        ),
        line_join: args.line_join,
        font_family: args.font_family.clone(),
        font_size: args.font_size,
    };

    // 只有图像目标才加载系统字体
    let target = normalize_token(&request.target_format);
    let rasterizer = if target == BLURAY_SUP_TOKEN || target == VOBSUB_TOKEN {
        let rasterizer = SvgTextRasterizer::new();
        if rasterizer.font_count() == 0 {
            output::print_warning("No system fonts found; image subtitles will be empty");
        }
        Some(rasterizer)
    } else {
        None
    };

    let (demuxer, ocr) = external_tools(&args);

    let mut converter = Converter::new(&registry, &toolbox, &request).with_images(images);
    if let Some(rasterizer) = &rasterizer {
        converter = converter.with_rasterizer(rasterizer);
    }
    if let Some(demuxer) = &demuxer {
        converter = converter.with_demuxer(demuxer);
    }
    if let Some(ocr) = &ocr {
        converter = converter.with_ocr(ocr);
    }

    let counters = BatchRunner::new()
        .quiet(args.quiet)
        .run(&files, |path| converter.convert_file(path));

    output::print_done(&format!("{} file(s) converted", counters.converted));
    if counters.errored > 0 {
        output::print_error(&format!(
            "{} of {} file(s) failed",
            counters.errored, counters.seen
        ));
    }

    Ok(counters.exit_success())
}

/// 从合并后的选项构建请求，返回请求和参数警告
pub fn build_request(
    args: &ConvertArgs,
    options: &ConvertOptions,
) -> (ConversionRequest, Vec<String>) {
    let mut warnings = Vec::new();

    let input_folder = match &options.input_folder {
        Some(dir) if dir.is_dir() => dir.clone(),
        Some(dir) => {
            warnings.push(format!("Input folder '{}' does not exist", dir.display()));
            current_dir()
        }
        None => current_dir(),
    };

    let mut request = ConversionRequest::new(&args.format, input_folder);
    request.offset = options.offset.clone();

    request.output_folder = match &options.output_folder {
        Some(dir) if dir.is_dir() => Some(dir.clone()),
        Some(dir) => {
            warnings.push(format!(
                "Output folder '{}' does not exist; writing next to the source files",
                dir.display()
            ));
            None
        }
        None => None,
    };

    if let Some(fps) = &options.fps {
        match parse_frame_rate(fps) {
            Some(rate) => request.frame_rate = rate,
            None => warnings.push(format!("Unable to read frame rate '{}'", fps)),
        }
    }

    if let Some(fps) = &options.target_fps {
        match parse_frame_rate(fps) {
            Some(rate) => request.target_frame_rate = Some(rate),
            None => warnings.push(format!("Unable to read target frame rate '{}'", fps)),
        }
    }

    if let Some(name) = &options.encoding {
        match TextEncoding::from_name(name) {
            Some(encoding) => request.encoding = encoding,
            None => warnings.push(format!(
                "Unknown encoding '{}', using {}",
                name, request.encoding
            )),
        }
    }

    if let Some(page) = &options.pac_codepage {
        match PacCodePage::parse(page) {
            Some(code_page) => request.pac_code_page = Some(code_page),
            None => warnings.push(format!(
                "Unknown PAC code page '{}', using the format default",
                page
            )),
        }
    }

    request.overwrite = options.overwrite;
    request.transforms = Transforms {
        remove_text_for_hi: options.remove_text_for_hi,
        fix_common_errors: options.fix_common_errors,
        redo_casing: options.redo_casing,
        multiple_replace: options.multiple_replace,
    };
    request.language = args.language.clone();

    (request, warnings)
}

fn build_toolbox(args: &ConvertArgs, request: &ConversionRequest) -> Result<Toolbox> {
    if !request.transforms.multiple_replace {
        return Ok(Toolbox::default());
    }

    let replacer = match &args.replace_rules {
        Some(path) => {
            let replacer = RuleReplacer::new(&load_rules(path)?)?;
            if replacer.is_empty() {
                output::print_warning(&format!("{} contains no replace rules", path.display()));
            }
            output::print_info(&format!(
                "Loaded {} replace rule(s) from {}",
                replacer.len(),
                path.display()
            ));
            replacer
        }
        None => {
            output::print_warning("No replace rules configured (--replace-rules)");
            RuleReplacer::default()
        }
    };
    Ok(Toolbox::builtin(replacer))
}

/// 容器解复用和 OCR 使用的外部命令，命令为空时不启用
fn external_tools(args: &ConvertArgs) -> (Option<FfmpegDemuxer>, Option<CommandOcr>) {
    let demuxer = match (
        ExternalCommand::parse(&args.ffprobe),
        ExternalCommand::parse(&args.ffmpeg),
    ) {
        (Some(ffprobe), Some(ffmpeg)) => Some(FfmpegDemuxer::new(ffprobe, ffmpeg)),
        _ => None,
    };
    let ocr = args
        .ocr_command
        .as_deref()
        .and_then(ExternalCommand::parse)
        .map(CommandOcr::new);
    (demuxer, ocr)
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FileOutcome;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    fn args(extra: &[&str]) -> ConvertArgs {
        let mut argv = vec!["subconv", "convert", "*.srt", "Sub Rip"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    fn build(extra: &[&str]) -> (ConversionRequest, Vec<String>) {
        let args = args(extra);
        let options = args.options();
        build_request(&args, &options)
    }

    #[test]
    fn test_defaults() {
        let (request, warnings) = build(&[]);
        assert!(warnings.is_empty());
        assert_eq!(request.target_format, "SubRip");
        assert_eq!(request.frame_rate, 23.976);
        assert_eq!(request.encoding, TextEncoding::Utf8 { bom: true });
        assert_eq!(request.transforms, Transforms::default());
        assert!(request.output_folder.is_none());
    }

    #[test]
    fn test_bad_values_fall_back_with_warnings() {
        let (request, warnings) = build(&[
            "encoding:klingon",
            "pac-codepage:martian",
            "fps:fast",
            "outputfolder:/nonexistent/out",
        ]);
        assert_eq!(warnings.len(), 4);
        assert_eq!(request.encoding, TextEncoding::Utf8 { bom: true });
        assert_eq!(request.pac_code_page, None);
        assert_eq!(request.frame_rate, 23.976);
        assert!(request.output_folder.is_none());
    }

    #[test]
    fn test_values_are_applied() {
        let out = tempfile::tempdir().unwrap();
        let out_token = format!("outputfolder:{}", out.path().display());
        let (request, warnings) = build(&[
            "fps:25",
            "targetfps:23,976",
            "encoding:windows-1252",
            out_token.as_str(),
            "--redo-casing",
            "multiplereplace",
        ]);
        assert!(warnings.is_empty());
        assert_eq!(request.frame_rate, 25.0);
        assert_eq!(request.target_frame_rate, Some(23.976));
        assert_eq!(request.encoding, TextEncoding::Windows1252);
        assert_eq!(request.output_folder.as_deref(), Some(out.path()));
        assert!(request.transforms.redo_casing);
        assert!(request.transforms.multiple_replace);
        assert!(!request.transforms.fix_common_errors);
    }

    fn converter_failure(args: &ConvertArgs, source: &std::path::Path) -> String {
        let (request, _) = build_request(args, &args.options());
        let registry = FormatRegistry::builtin();
        let toolbox = Toolbox::default();
        let (demuxer, ocr) = external_tools(args);
        let mut converter = Converter::new(&registry, &toolbox, &request);
        if let Some(demuxer) = &demuxer {
            converter = converter.with_demuxer(demuxer);
        }
        if let Some(ocr) = &ocr {
            converter = converter.with_ocr(ocr);
        }
        match converter.convert_file(source) {
            FileOutcome::Failed { reason, .. } => reason,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_external_tools_from_args() {
        let (demuxer, ocr) = external_tools(&args(&[]));
        assert!(demuxer.is_some());
        assert!(ocr.is_none());

        let (demuxer, ocr) = external_tools(&args(&["--ffprobe", "", "--ocr-command", "pgsocr --lang eng"]));
        assert!(demuxer.is_none());
        assert!(ocr.is_some());
    }

    #[test]
    fn test_mkv_without_ffprobe_reports_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        fs::write(&source, b"\x1a\x45\xdf\xa3 not really matroska").unwrap();

        let args = args(&["--ffprobe", "subconv-no-such-ffprobe"]);
        let reason = converter_failure(&args, &source);
        assert!(reason.contains("Failed to read container"));
        assert!(reason.contains("subconv-no-such-ffprobe"));
    }

    #[test]
    fn test_sup_without_ocr_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.sup");
        fs::write(&source, b"PG\x00\x00").unwrap();

        let reason = converter_failure(&args(&[]), &source);
        assert!(reason.contains("No OCR engine configured"));
    }

    #[test]
    fn test_execute_counts_mkv_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("movie.mkv"), b"junk").unwrap();
        let folder = format!("inputfolder:{}", dir.path().display());

        let argv = vec![
            "subconv",
            "convert",
            "*.mkv",
            "subrip",
            folder.as_str(),
            "--ffprobe",
            "subconv-no-such-ffprobe",
            "--quiet",
        ];
        let args = match Cli::try_parse_from(argv).unwrap().command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        };
        assert!(!execute(args).unwrap());
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }
}

//! # convert 子命令 CLI 定义
//!
//! 批量转换字幕文件格式。
//!
//! 除长选项外，还接受传统的位置参数形式（`offset:-:0:0:1:0`、`/fps:25`、
//! `overwrite` 等，忽略大小写，可带 `/` 或 `-` 前缀）。同一设置同时给出时以长选项为准。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use crate::imaging::LineJoin;
use clap::Args;
use std::ffi::OsString;
use std::path::PathBuf;

/// 传统标记的键名
const LEGACY_KEYS: [&str; 12] = [
    "offset",
    "fps",
    "targetfps",
    "encoding",
    "pac-codepage",
    "inputfolder",
    "outputfolder",
    "overwrite",
    "removetextforhi",
    "fixcommonerrors",
    "redocasing",
    "multiplereplace",
];

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input file pattern(s), comma separated (e.g. "*.srt,*.smi")
    pub pattern: String,

    /// Target format name, e.g. SubRip, WebVTT, "EBU STL", PlainText, BluRaySup, VobSub
    pub format: String,

    /// Legacy options: offset:<sign:h:m:s:ms> fps:<rate> targetfps:<rate> encoding:<name>
    /// pac-codepage:<page> inputfolder:<dir> outputfolder:<dir> overwrite removetextforhi
    /// fixcommonerrors redocasing multiplereplace
    pub tokens: Vec<String>,

    /// Time offset as sign:hours:minutes:seconds:milliseconds (e.g. -:0:1:30:500)
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<String>,

    /// Current frame rate of the source files
    #[arg(long)]
    pub fps: Option<String>,

    /// Frame rate to rebase timings to
    #[arg(long)]
    pub target_fps: Option<String>,

    /// Output text encoding (utf-8, utf-8-no-bom, utf-16, windows-1252, ...)
    #[arg(long)]
    pub encoding: Option<String>,

    /// PAC code page (name or number)
    #[arg(long)]
    pub pac_codepage: Option<String>,

    /// Folder that relative patterns are resolved against
    #[arg(long)]
    pub input_folder: Option<PathBuf>,

    /// Folder to write converted files to
    #[arg(long)]
    pub output_folder: Option<PathBuf>,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Remove text for hearing impaired
    #[arg(long, default_value_t = false)]
    pub remove_text_for_hi: bool,

    /// Fix common errors (three passes)
    #[arg(long, default_value_t = false)]
    pub fix_common_errors: bool,

    /// Redo casing, including names
    #[arg(long, default_value_t = false)]
    pub redo_casing: bool,

    /// Apply the multiple replace rules
    #[arg(long, default_value_t = false)]
    pub multiple_replace: bool,

    /// Canvas size for Blu-ray sup output (WxH)
    #[arg(long, env = "SUBCONV_BLURAY_RESOLUTION")]
    pub bluray_resolution: Option<String>,

    /// Canvas size for VobSub output (WxH)
    #[arg(long, env = "SUBCONV_VOBSUB_RESOLUTION")]
    pub vobsub_resolution: Option<String>,

    /// Outline corner style for image output
    #[arg(long, value_enum, env = "SUBCONV_LINE_JOIN", default_value_t = LineJoin::Round)]
    pub line_join: LineJoin,

    /// Font family for image output
    #[arg(long)]
    pub font_family: Option<String>,

    /// Font size in pixels for image output
    #[arg(long)]
    pub font_size: Option<f32>,

    /// Language hint for the common error fixer (ISO 639-1)
    #[arg(long)]
    pub language: Option<String>,

    /// CSV file with find,replace,kind rules for --multiple-replace
    #[arg(long, env = "SUBCONV_REPLACE_RULES")]
    pub replace_rules: Option<PathBuf>,

    /// ffprobe command used to list subtitle tracks in .mkv/.mks files
    #[arg(long, env = "SUBCONV_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// ffmpeg command used to extract text tracks from .mkv/.mks files
    #[arg(long, env = "SUBCONV_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// OCR command for Blu-ray sup and VobSub input; receives the file path, prints SubRip
    #[arg(long, env = "SUBCONV_OCR_COMMAND")]
    pub ocr_command: Option<String>,

    /// Hide the progress bar
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

/// 合并长选项与传统标记后的设置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub offset: Option<String>,
    pub fps: Option<String>,
    pub target_fps: Option<String>,
    pub encoding: Option<String>,
    pub pac_codepage: Option<String>,
    pub input_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub overwrite: bool,
    pub remove_text_for_hi: bool,
    pub fix_common_errors: bool,
    pub redo_casing: bool,
    pub multiple_replace: bool,
    /// 无法识别的标记
    pub unknown: Vec<String>,
}

fn is_legacy_key(token: &str) -> bool {
    let key = token.split_once(':').map_or(token, |(k, _)| k);
    LEGACY_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// 把 `-offset:...` 这类单横线传统标记改写为 `/` 前缀，避免被 clap 当作短选项
pub fn normalize_legacy_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let rewritten = arg
                .to_str()
                .filter(|s| !s.starts_with("--"))
                .and_then(|s| s.strip_prefix('-'))
                .filter(|rest| is_legacy_key(rest))
                .map(|rest| OsString::from(format!("/{}", rest)));
            rewritten.unwrap_or(arg)
        })
        .collect()
}

/// 解析传统位置标记
pub fn parse_legacy_tokens(tokens: &[String]) -> ConvertOptions {
    let mut options = ConvertOptions::default();
    for raw in tokens {
        let token = raw.trim().trim_start_matches(['/', '-']);
        let (key, value) = match token.split_once(':') {
            Some((k, v)) => (k.to_ascii_lowercase(), Some(v.to_string())),
            None => (token.to_ascii_lowercase(), None),
        };

        match (key.as_str(), value) {
            ("offset", Some(v)) => options.offset = Some(v),
            ("fps", Some(v)) => options.fps = Some(v),
            ("targetfps", Some(v)) => options.target_fps = Some(v),
            ("encoding", Some(v)) => options.encoding = Some(v),
            ("pac-codepage", Some(v)) => options.pac_codepage = Some(v),
            ("inputfolder", Some(v)) => options.input_folder = Some(PathBuf::from(v)),
            ("outputfolder", Some(v)) => options.output_folder = Some(PathBuf::from(v)),
            ("overwrite", None) => options.overwrite = true,
            ("removetextforhi", None) => options.remove_text_for_hi = true,
            ("fixcommonerrors", None) => options.fix_common_errors = true,
            ("redocasing", None) => options.redo_casing = true,
            ("multiplereplace", None) => options.multiple_replace = true,
            _ => options.unknown.push(raw.clone()),
        }
    }
    options
}

impl ConvertArgs {
    /// 合并长选项和传统标记，长选项优先
    pub fn options(&self) -> ConvertOptions {
        let legacy = parse_legacy_tokens(&self.tokens);
        ConvertOptions {
            offset: self.offset.clone().or(legacy.offset),
            fps: self.fps.clone().or(legacy.fps),
            target_fps: self.target_fps.clone().or(legacy.target_fps),
            encoding: self.encoding.clone().or(legacy.encoding),
            pac_codepage: self.pac_codepage.clone().or(legacy.pac_codepage),
            input_folder: self.input_folder.clone().or(legacy.input_folder),
            output_folder: self.output_folder.clone().or(legacy.output_folder),
            overwrite: self.overwrite || legacy.overwrite,
            remove_text_for_hi: self.remove_text_for_hi || legacy.remove_text_for_hi,
            fix_common_errors: self.fix_common_errors || legacy.fix_common_errors,
            redo_casing: self.redo_casing || legacy.redo_casing,
            multiple_replace: self.multiple_replace || legacy.multiple_replace,
            unknown: legacy.unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> ConvertArgs {
        let mut argv = vec!["subconv", "convert"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_legacy_tokens() {
        let args = parse(&[
            "*.srt",
            "WebVTT",
            "offset:-:0:1:30:500",
            "/FPS:25",
            "TargetFps:23.976",
            "encoding:utf-16",
            "/outputfolder:/tmp/out",
            "overwrite",
            "/RemoveTextForHI",
            "fixcommonerrors",
        ]);
        let options = args.options();
        assert_eq!(args.pattern, "*.srt");
        assert_eq!(args.format, "WebVTT");
        assert_eq!(options.offset.as_deref(), Some("-:0:1:30:500"));
        assert_eq!(options.fps.as_deref(), Some("25"));
        assert_eq!(options.target_fps.as_deref(), Some("23.976"));
        assert_eq!(options.encoding.as_deref(), Some("utf-16"));
        assert_eq!(options.output_folder, Some(PathBuf::from("/tmp/out")));
        assert!(options.overwrite);
        assert!(options.remove_text_for_hi);
        assert!(options.fix_common_errors);
        assert!(!options.redo_casing);
        assert!(options.unknown.is_empty());
    }

    #[test]
    fn test_long_option_wins_over_token() {
        let args = parse(&["*.srt", "subrip", "fps:25", "--fps", "29.97", "--offset", "-:0:0:1:0"]);
        let options = args.options();
        assert_eq!(options.fps.as_deref(), Some("29.97"));
        assert_eq!(options.offset.as_deref(), Some("-:0:0:1:0"));
    }

    #[test]
    fn test_dash_prefixed_legacy_tokens() {
        let argv = normalize_legacy_args([
            "subconv",
            "convert",
            "*.srt",
            "subrip",
            "-offset:-:0:1:30:500",
            "-OVERWRITE",
            "-q",
            "--fps",
            "25",
        ]);
        let args = match Cli::try_parse_from(argv).unwrap().command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        };
        let options = args.options();
        assert_eq!(options.offset.as_deref(), Some("-:0:1:30:500"));
        assert_eq!(options.fps.as_deref(), Some("25"));
        assert!(options.overwrite);
        assert!(args.quiet);
        assert!(options.unknown.is_empty());

        let options = parse_legacy_tokens(&["-RedoCasing".to_string()]);
        assert!(options.redo_casing);
    }

    #[test]
    fn test_unknown_tokens_are_collected() {
        let options = parse_legacy_tokens(&["frobnicate".to_string(), "overwrite:yes".to_string()]);
        assert_eq!(options.unknown, vec!["frobnicate", "overwrite:yes"]);
        assert!(!options.overwrite);
    }

    #[test]
    fn test_missing_format_is_an_error() {
        assert!(Cli::try_parse_from(["subconv", "convert", "*.srt"]).is_err());
    }

    #[test]
    fn test_image_settings() {
        let args = parse(&[
            "*.srt",
            "bluraysup",
            "--bluray-resolution",
            "1280x720",
            "--line-join",
            "miter",
            "--font-size",
            "40",
        ]);
        assert_eq!(args.bluray_resolution.as_deref(), Some("1280x720"));
        assert_eq!(args.line_join, LineJoin::Miter);
        assert_eq!(args.font_size, Some(40.0));
    }
}

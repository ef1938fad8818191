//! # 外部命令协作者
//!
//! - `FfmpegDemuxer`: ffprobe 列出字幕轨道，ffmpeg 把文本轨道导出为 SubRip
//! - `CommandOcr`: 运行配置的 OCR 命令，命令把识别结果以 SubRip 写到标准输出
//!
//! 命令行按空白拆分：第一个字段是程序，其余是固定参数，文件路径追加在后面。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 装配到 `Converter`
//! - 使用 `formats/subrip.rs` 解析命令输出

use super::{ContainerDemuxer, ContainerTrack, OcrEngine};
use crate::error::{Result, SubconvError};
use crate::formats::subrip::SubRip;
use crate::formats::{CodecOptions, SubtitleFormat};
use crate::models::Document;
use crate::utils::encoding::decode_text;

use serde::Deserialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// 没有语言标签的轨道
const UNDETERMINED_LANGUAGE: &str = "und";

/// 一条外部命令：程序加固定参数
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    /// 按空白拆分命令行，空命令返回 None
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// 运行命令，成功时返回标准输出
    fn run(&self, extra: Vec<OsString>) -> Result<Vec<u8>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => SubconvError::CommandNotFound {
                    command: self.program.clone(),
                },
                _ => SubconvError::CommandFailed {
                    command: self.program.clone(),
                    stderr: e.to_string(),
                },
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SubconvError::CommandFailed {
                command: self.program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn parse_subrip(stdout: &[u8]) -> Result<Document> {
    let text = decode_text(stdout);
    let lines: Vec<&str> = text.lines().collect();
    SubRip::new().load(&lines, &CodecOptions::default())
}

#[derive(Deserialize)]
struct ProbeTags {
    language: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: u64,
    codec_name: Option<String>,
    tags: Option<ProbeTags>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// ffmpeg 编码名 → Matroska 编码 ID
fn codec_id(codec_name: &str) -> String {
    match codec_name {
        "subrip" | "srt" | "text" => "S_TEXT/UTF8".to_string(),
        "ass" => "S_TEXT/ASS".to_string(),
        "ssa" => "S_TEXT/SSA".to_string(),
        "webvtt" => "S_TEXT/WEBVTT".to_string(),
        "hdmv_pgs_subtitle" => "S_HDMV/PGS".to_string(),
        "dvd_subtitle" => "S_VOBSUB".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

/// 通过 ffprobe/ffmpeg 读取 Matroska 字幕轨道
pub struct FfmpegDemuxer {
    ffprobe: ExternalCommand,
    ffmpeg: ExternalCommand,
}

impl FfmpegDemuxer {
    pub fn new(ffprobe: ExternalCommand, ffmpeg: ExternalCommand) -> Self {
        Self { ffprobe, ffmpeg }
    }

    fn probe(&self, path: &Path) -> Result<Vec<ProbeStream>> {
        let stdout = self.ffprobe.run(vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_streams".into(),
            "-select_streams".into(),
            "s".into(),
            path.into(),
        ])?;
        let parsed: ProbeOut =
            serde_json::from_slice(&stdout).map_err(|e| SubconvError::ParseError {
                format: "ffprobe".to_string(),
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(parsed.streams)
    }

    fn extract_text(&self, path: &Path, index: u64) -> Result<Document> {
        let stdout = self.ffmpeg.run(vec![
            "-v".into(),
            "error".into(),
            "-i".into(),
            path.into(),
            "-map".into(),
            format!("0:{}", index).into(),
            "-f".into(),
            "srt".into(),
            "pipe:1".into(),
        ])?;
        parse_subrip(&stdout)
    }
}

impl ContainerDemuxer for FfmpegDemuxer {
    fn subtitle_tracks(&self, path: &Path) -> anyhow::Result<Vec<ContainerTrack>> {
        let mut tracks = Vec::new();
        for stream in self.probe(path)? {
            let language = stream
                .tags
                .and_then(|t| t.language)
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string());
            let mut track = ContainerTrack {
                number: stream.index + 1,
                codec_id: codec_id(stream.codec_name.as_deref().unwrap_or_default()),
                language,
                document: Document::default(),
            };
            if !track.is_image_based() {
                track.document = self.extract_text(path, stream.index)?;
            }
            tracks.push(track);
        }
        Ok(tracks)
    }
}

/// 调用外部程序识别图像字幕
pub struct CommandOcr {
    command: ExternalCommand,
}

impl CommandOcr {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl OcrEngine for CommandOcr {
    fn extract(&self, path: &Path, _bytes: &[u8]) -> anyhow::Result<Document> {
        let stdout = self.command.run(vec![path.into()])?;
        let document = parse_subrip(&stdout)?;
        anyhow::ensure!(
            !document.entries.is_empty(),
            "{} recognized no subtitles in {}",
            self.command.program(),
            path.display()
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nRecognized\n";

    /// 写一个 sh 脚本，返回调用它的命令行
    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> ExternalCommand {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        ExternalCommand::parse(&format!("sh {}", path.display())).unwrap()
    }

    #[test]
    fn test_parse_command_line() {
        assert_eq!(ExternalCommand::parse("   "), None);
        let command = ExternalCommand::parse(" pgsocr  --lang eng ").unwrap();
        assert_eq!(command.program(), "pgsocr");
        assert_eq!(command.args, vec!["--lang", "eng"]);
    }

    #[test]
    fn test_codec_ids() {
        assert_eq!(codec_id("subrip"), "S_TEXT/UTF8");
        assert_eq!(codec_id("hdmv_pgs_subtitle"), "S_HDMV/PGS");
        assert_eq!(codec_id("dvd_subtitle"), "S_VOBSUB");
        assert_eq!(codec_id("mov_text"), "MOV_TEXT");
    }

    #[test]
    fn test_missing_program_is_reported() {
        let missing = ExternalCommand::parse("subconv-no-such-ffprobe").unwrap();
        let demuxer = FfmpegDemuxer::new(missing.clone(), missing);
        let err = demuxer
            .subtitle_tracks(Path::new("movie.mkv"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubconvError>(),
            Some(SubconvError::CommandNotFound { command }) if command == "subconv-no-such-ffprobe"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_demuxer_reads_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = script(
            dir.path(),
            "ffprobe.sh",
            "cat <<'JSON'\n{\"streams\": [\n  {\"index\": 2, \"codec_name\": \"subrip\", \"tags\": {\"language\": \"eng\"}},\n  {\"index\": 3, \"codec_name\": \"hdmv_pgs_subtitle\"}\n]}\nJSON\n",
        );
        let ffmpeg = script(dir.path(), "ffmpeg.sh", &format!("printf '{}'\n", SRT.replace('\n', "\\n")));

        let tracks = FfmpegDemuxer::new(ffprobe, ffmpeg)
            .subtitle_tracks(&dir.path().join("movie.mkv"))
            .unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].number, 3);
        assert_eq!(tracks[0].codec_id, "S_TEXT/UTF8");
        assert_eq!(tracks[0].language, "eng");
        assert_eq!(tracks[0].document.entries[0].text, "Recognized");
        assert_eq!(tracks[1].number, 4);
        assert_eq!(tracks[1].language, "und");
        assert!(tracks[1].is_image_based());
        assert!(tracks[1].document.entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_command_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = script(dir.path(), "ffprobe.sh", "echo 'Invalid data found' >&2\nexit 1\n");
        let demuxer = FfmpegDemuxer::new(ffprobe.clone(), ffprobe);
        let err = demuxer
            .subtitle_tracks(&dir.path().join("movie.mkv"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubconvError>(),
            Some(SubconvError::CommandFailed { stderr, .. }) if stderr == "Invalid data found"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_command_output_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = CommandOcr::new(script(
            dir.path(),
            "ocr.sh",
            &format!("printf '{}'\n", SRT.replace('\n', "\\n")),
        ));
        let document = ocr.extract(&dir.path().join("movie.sup"), b"PG").unwrap();
        assert_eq!(document.entries.len(), 1);
        assert_eq!(document.entries[0].text, "Recognized");
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_without_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = CommandOcr::new(script(dir.path(), "ocr.sh", "exit 0\n"));
        let err = ocr.extract(&dir.path().join("movie.sup"), b"PG").unwrap_err();
        assert!(err.to_string().contains("recognized no subtitles"));
    }
}

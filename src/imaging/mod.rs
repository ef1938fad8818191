//! # 图像字幕模块
//!
//! 将文本条目渲染为位图，再编码为 Blu-ray SUP 或 VobSub。
//!
//! ## 依赖关系
//! - 被 `convert/dispatch.rs` 使用
//! - 使用 `image` 保存位图，`resvg` 渲染文字
//! - 子模块: svg_text, sup, vobsub

pub mod sup;
pub mod svg_text;
pub mod vobsub;

use crate::error::{Result, SubconvError};
use crate::models::Document;

use clap::ValueEnum;
use image::RgbaImage;
use std::fmt;

/// 字幕底部到画面底边的距离（像素）
pub const BOTTOM_MARGIN: u32 = 15;

/// 视频分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const BLURAY: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
    pub const DVD_PAL: Resolution = Resolution {
        width: 720,
        height: 576,
    };

    /// 解析 `WxH`，格式不对时返回 None
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Resolution { width, height })
    }

    /// 解析失败时使用默认值
    pub fn parse_or(value: Option<&str>, default: Resolution) -> Resolution {
        value.and_then(Resolution::parse).unwrap_or(default)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 文字描边的拐角样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LineJoin {
    #[default]
    Round,
    Miter,
    Bevel,
}

impl LineJoin {
    pub fn as_svg(&self) -> &'static str {
        match self {
            LineJoin::Round => "round",
            LineJoin::Miter => "miter",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// 单条字幕的渲染参数
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub canvas: Resolution,
    pub font_family: String,
    pub font_size: f32,
    pub line_join: LineJoin,
    pub text_color: [u8; 3],
    pub outline_color: [u8; 3],
    pub outline_width: f32,
}

impl RenderParams {
    pub fn new(canvas: Resolution) -> Self {
        RenderParams {
            canvas,
            // 高度 1080 对应 48px
            font_size: (canvas.height as f32 / 22.5).max(12.0),
            font_family: "sans-serif".to_string(),
            line_join: LineJoin::Round,
            text_color: [255, 255, 255],
            outline_color: [0, 0, 0],
            outline_width: 3.0,
        }
    }
}

/// 文字渲染器
pub trait Rasterizer {
    /// 渲染一条字幕，返回裁剪到有效区域的位图
    fn render(&self, text: &str, params: &RenderParams) -> anyhow::Result<RgbaImage>;
}

/// 已定位的位图字幕
#[derive(Debug, Clone)]
pub struct ImageSubtitle {
    pub start_ms: f64,
    pub end_ms: f64,
    pub x: u32,
    pub y: u32,
    pub image: RgbaImage,
}

/// 渲染整个文档：空文本条目跳过，位图水平居中、贴近底部
pub fn render_document(
    document: &Document,
    frame_rate: f64,
    rasterizer: &dyn Rasterizer,
    params: &RenderParams,
) -> Result<Vec<ImageSubtitle>> {
    let canvas = params.canvas;
    let mut subtitles = Vec::with_capacity(document.len());
    for entry in &document.entries {
        if entry.text.trim().is_empty() {
            continue;
        }
        let mut image = rasterizer
            .render(&entry.text, params)
            .map_err(|e| SubconvError::collaborator("render subtitle image", e))?;

        if image.width() > canvas.width || image.height() > canvas.height {
            let width = image.width().min(canvas.width);
            let height = image.height().min(canvas.height);
            image = image::imageops::crop_imm(&image, 0, 0, width, height).to_image();
        }

        let x = (canvas.width - image.width()) / 2;
        let y = canvas
            .height
            .saturating_sub(image.height())
            .saturating_sub(BOTTOM_MARGIN);
        subtitles.push(ImageSubtitle {
            start_ms: entry.start_ms(frame_rate),
            end_ms: entry.end_ms(frame_rate),
            x,
            y,
            image,
        });
    }
    Ok(subtitles)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Entry;
    use image::Rgba;

    /// 固定尺寸的白色方块
    pub(crate) struct BlockRasterizer {
        pub width: u32,
        pub height: u32,
    }

    impl Rasterizer for BlockRasterizer {
        fn render(&self, _text: &str, _params: &RenderParams) -> anyhow::Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                self.width,
                self.height,
                Rgba([255, 255, 255, 255]),
            ))
        }
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(
            Resolution::parse("1280x720"),
            Some(Resolution {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(Resolution::parse(" 640X480 ").map(|r| r.width), Some(640));
        assert_eq!(Resolution::parse("1280"), None);
        assert_eq!(Resolution::parse("axb"), None);
        assert_eq!(Resolution::parse("0x10"), None);
        assert_eq!(
            Resolution::parse_or(Some("garbage"), Resolution::BLURAY),
            Resolution::BLURAY
        );
    }

    #[test]
    fn test_render_document_positions() {
        let doc = Document::new(vec![
            Entry::timed(1000.0, 2000.0, "Hello"),
            Entry::timed(2000.0, 3000.0, "  "),
        ]);
        let params = RenderParams::new(Resolution::DVD_PAL);
        let rasterizer = BlockRasterizer {
            width: 100,
            height: 40,
        };
        let subs = render_document(&doc, 25.0, &rasterizer, &params).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].x, 310);
        assert_eq!(subs[0].y, 576 - 40 - BOTTOM_MARGIN);
        assert_eq!(subs[0].start_ms, 1000.0);
    }

    #[test]
    fn test_render_document_crops_to_canvas() {
        let doc = Document::new(vec![Entry::timed(0.0, 1.0, "wide")]);
        let params = RenderParams::new(Resolution {
            width: 50,
            height: 50,
        });
        let rasterizer = BlockRasterizer {
            width: 80,
            height: 10,
        };
        let subs = render_document(&doc, 25.0, &rasterizer, &params).unwrap();
        assert_eq!(subs[0].image.width(), 50);
        assert_eq!(subs[0].x, 0);
    }
}

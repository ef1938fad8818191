//! # SVG 文字渲染
//!
//! 把字幕文本写成 SVG（描边文字，居中对齐），用 `resvg` 渲染到整幅画布，
//! 再裁剪到有像素的区域。`<i>` 标签使整条字幕变为斜体，其他标签被去掉。
//!
//! ## 依赖关系
//! - 实现 `imaging::Rasterizer`
//! - 使用 `resvg`（含 `usvg` 与 `tiny_skia`）和 `image`

use super::{RenderParams, Rasterizer};

use anyhow::{anyhow, Context};
use image::RgbaImage;
use regex::Regex;
use resvg::tiny_skia;
use resvg::usvg;
use once_cell::sync::Lazy;
use std::sync::Arc;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>|\{\\[^}]*\}").unwrap());

pub struct SvgTextRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgTextRasterizer {
    /// 加载系统字体
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        SvgTextRasterizer {
            fontdb: Arc::new(db),
        }
    }

    pub fn font_count(&self) -> usize {
        self.fontdb.faces().count()
    }
}

impl Default for SvgTextRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn hex(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// 生成 SVG 文档
pub fn build_svg(text: &str, params: &RenderParams) -> String {
    let italic = text.to_lowercase().contains("<i>");
    let plain = TAG_RE.replace_all(text, "");
    let lines: Vec<&str> = plain.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let line_height = params.font_size * 1.25;
    let width = params.canvas.width;
    let height = params.canvas.height;
    let first_baseline = params.font_size + params.outline_width;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n"
    );
    svg.push_str(&format!(
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-style=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"{}\" paint-order=\"stroke\">",
        width as f32 / 2.0,
        first_baseline,
        escape_xml(&params.font_family),
        params.font_size,
        if italic { "italic" } else { "normal" },
        hex(params.text_color),
        hex(params.outline_color),
        params.outline_width * 2.0,
        params.line_join.as_svg(),
    ));
    for (i, line) in lines.iter().enumerate() {
        let dy = if i == 0 { 0.0 } else { line_height };
        svg.push_str(&format!(
            "<tspan x=\"{}\" dy=\"{}\">{}</tspan>",
            width as f32 / 2.0,
            dy,
            escape_xml(line)
        ));
    }
    svg.push_str("</text>\n</svg>\n");
    svg
}

/// 不透明像素的包围盒 (x, y, w, h)
fn painted_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0, 0);
    let mut found = false;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > 0 {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

impl Rasterizer for SvgTextRasterizer {
    fn render(&self, text: &str, params: &RenderParams) -> anyhow::Result<RgbaImage> {
        let svg = build_svg(text, params);
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &options).context("parse subtitle svg")?;

        let (width, height) = (params.canvas.width, params.canvas.height);
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("failed to allocate {}x{} pixmap", width, height))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        // tiny_skia 使用预乘 alpha
        let mut rgba = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let c = pixel.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let image = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", width, height))?;

        Ok(match painted_bounds(&image) {
            Some((x, y, w, h)) => image::imageops::crop_imm(&image, x, y, w, h).to_image(),
            None => RgbaImage::new(1, 1),
        })
    }
}

//! # Blu-ray SUP (PGS) 编码
//!
//! 每个条目生成两组显示集：
//! - 起始时间：PCS（epoch start）+ WDS + PDS + ODS + END
//! - 结束时间：PCS（无对象）+ WDS + END，清除画面
//!
//! 段头为 `PG` + PTS + DTS（90 kHz）+ 类型 + 长度。调色板索引 0 固定为透明，
//! 其余颜色超过 254 种时逐步降低每通道精度。
//!
//! ## 依赖关系
//! - 被 `convert/dispatch.rs` 使用
//! - 输入来自 `imaging::render_document`

use super::{ImageSubtitle, Resolution};

use image::RgbaImage;
use std::collections::HashMap;

const SEGMENT_PDS: u8 = 0x14;
const SEGMENT_ODS: u8 = 0x15;
const SEGMENT_PCS: u8 = 0x16;
const SEGMENT_WDS: u8 = 0x17;
const SEGMENT_END: u8 = 0x80;

const MAX_SEGMENT: usize = 0xFFFF;
/// 透明色之外的最大颜色数
const MAX_COLORS: usize = 254;
/// RLE 单次游程上限（14 位）
const MAX_RUN: usize = 0x3FFF;

/// 视频帧率代码，0x10 表示 23.976
const FRAME_RATE_CODE: u8 = 0x10;

fn ms_to_pts(ms: f64) -> u32 {
    (ms.max(0.0) * 90.0).round() as u32
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_segment(out: &mut Vec<u8>, kind: u8, pts: u32, payload: &[u8]) {
    out.extend_from_slice(b"PG");
    out.extend_from_slice(&pts.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(kind);
    push_u16(out, payload.len() as u16);
    out.extend_from_slice(payload);
}

/// BT.709 RGB → (Y, Cr, Cb)
pub fn rgb_to_ycrcb(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 16.0 + (0.2126 * r + 0.7152 * g + 0.0722 * b) * 219.0 / 255.0;
    let cb = 128.0 + (-0.1146 * r - 0.3854 * g + 0.5 * b) * 224.0 / 255.0;
    let cr = 128.0 + (0.5 * r - 0.4542 * g - 0.0458 * b) * 224.0 / 255.0;
    let clamp = |v: f64| v.round().clamp(16.0, 240.0) as u8;
    (y.round().clamp(16.0, 235.0) as u8, clamp(cr), clamp(cb))
}

/// 调色板与索引图
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedImage {
    /// 索引 1 开始的 RGBA 颜色
    pub palette: Vec<[u8; 4]>,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// 量化为不超过 254 种颜色（索引 0 为透明）
pub fn quantize(image: &RgbaImage) -> IndexedImage {
    for shift in 0..8u8 {
        let mask = 0xFFu8 << shift;
        let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
        let mut palette = Vec::new();
        let mut pixels = Vec::with_capacity((image.width() * image.height()) as usize);
        let mut overflow = false;
        for pixel in image.pixels() {
            if pixel[3] == 0 {
                pixels.push(0);
                continue;
            }
            let key = [pixel[0] & mask, pixel[1] & mask, pixel[2] & mask, pixel[3] & mask];
            let index = match lookup.get(&key) {
                Some(&i) => i,
                None => {
                    if palette.len() >= MAX_COLORS {
                        overflow = true;
                        break;
                    }
                    palette.push(key);
                    let i = palette.len() as u8;
                    lookup.insert(key, i);
                    i
                }
            };
            pixels.push(index);
        }
        if !overflow {
            return IndexedImage {
                palette,
                width: image.width(),
                height: image.height(),
                pixels,
            };
        }
    }
    // 每通道 1 位时最多 16 种颜色，不会走到这里
    IndexedImage {
        palette: Vec::new(),
        width: image.width(),
        height: image.height(),
        pixels: vec![0; (image.width() * image.height()) as usize],
    }
}

/// PGS 行程编码，每行以 `00 00` 结束
pub fn encode_rle(image: &IndexedImage) -> Vec<u8> {
    let mut out = Vec::new();
    let width = image.width as usize;
    for row in image.pixels.chunks(width.max(1)) {
        let mut i = 0;
        while i < row.len() {
            let color = row[i];
            let mut run = 1;
            while i + run < row.len() && row[i + run] == color && run < MAX_RUN {
                run += 1;
            }
            write_run(&mut out, color, run);
            i += run;
        }
        out.extend_from_slice(&[0x00, 0x00]);
    }
    out
}

fn write_run(out: &mut Vec<u8>, color: u8, run: usize) {
    match (color, run) {
        (c, n) if c != 0 && n < 3 => {
            for _ in 0..n {
                out.push(c);
            }
        }
        (0, n) if n < 64 => out.extend_from_slice(&[0x00, n as u8]),
        (0, n) => out.extend_from_slice(&[0x00, 0x40 | (n >> 8) as u8, (n & 0xFF) as u8]),
        (c, n) if n < 64 => out.extend_from_slice(&[0x00, 0x80 | n as u8, c]),
        (c, n) => out.extend_from_slice(&[0x00, 0xC0 | (n >> 8) as u8, (n & 0xFF) as u8, c]),
    }
}

fn composition(
    resolution: Resolution,
    number: u16,
    state: u8,
    object: Option<(u32, u32)>,
) -> Vec<u8> {
    let mut pcs = Vec::with_capacity(19);
    push_u16(&mut pcs, resolution.width as u16);
    push_u16(&mut pcs, resolution.height as u16);
    pcs.push(FRAME_RATE_CODE);
    push_u16(&mut pcs, number);
    pcs.push(state);
    pcs.push(0x00); // palette update flag
    pcs.push(0x00); // palette id
    match object {
        Some((x, y)) => {
            pcs.push(1);
            push_u16(&mut pcs, 0); // object id
            pcs.push(0); // window id
            pcs.push(0); // not cropped
            push_u16(&mut pcs, x as u16);
            push_u16(&mut pcs, y as u16);
        }
        None => pcs.push(0),
    }
    pcs
}

fn window(x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
    let mut wds = Vec::with_capacity(10);
    wds.push(1);
    wds.push(0);
    push_u16(&mut wds, x as u16);
    push_u16(&mut wds, y as u16);
    push_u16(&mut wds, width as u16);
    push_u16(&mut wds, height as u16);
    wds
}

fn palette_segment(palette: &[[u8; 4]]) -> Vec<u8> {
    let mut pds = Vec::with_capacity(2 + 5 * (palette.len() + 1));
    pds.push(0); // palette id
    pds.push(0); // version
    pds.extend_from_slice(&[0, 16, 128, 128, 0]);
    for (i, [r, g, b, a]) in palette.iter().enumerate() {
        let (y, cr, cb) = rgb_to_ycrcb(*r, *g, *b);
        pds.extend_from_slice(&[(i + 1) as u8, y, cr, cb, *a]);
    }
    pds
}

/// 拆分 ODS：首段带对象数据长度和尺寸，后续段只带数据
fn object_segments(image: &IndexedImage, rle: &[u8]) -> Vec<Vec<u8>> {
    let first_capacity = MAX_SEGMENT - 11;
    let next_capacity = MAX_SEGMENT - 4;
    let mut segments = Vec::new();

    let first_len = rle.len().min(first_capacity);
    let single = first_len == rle.len();
    let mut first = Vec::with_capacity(first_len + 11);
    push_u16(&mut first, 0); // object id
    first.push(0); // version
    first.push(if single { 0xC0 } else { 0x80 });
    let data_len = (rle.len() + 4) as u32;
    first.extend_from_slice(&data_len.to_be_bytes()[1..]);
    push_u16(&mut first, image.width as u16);
    push_u16(&mut first, image.height as u16);
    first.extend_from_slice(&rle[..first_len]);
    segments.push(first);

    let mut offset = first_len;
    while offset < rle.len() {
        let len = (rle.len() - offset).min(next_capacity);
        let last = offset + len == rle.len();
        let mut seg = Vec::with_capacity(len + 4);
        push_u16(&mut seg, 0);
        seg.push(0);
        seg.push(if last { 0x40 } else { 0x00 });
        seg.extend_from_slice(&rle[offset..offset + len]);
        segments.push(seg);
        offset += len;
    }
    segments
}

/// 编码整个 SUP 文件
pub fn encode(subtitles: &[ImageSubtitle], resolution: Resolution) -> Vec<u8> {
    let mut out = Vec::new();
    let mut number: u16 = 0;
    for sub in subtitles {
        let indexed = quantize(&sub.image);
        let rle = encode_rle(&indexed);
        let start = ms_to_pts(sub.start_ms);
        let end = ms_to_pts(sub.end_ms);
        let (w, h) = (sub.image.width(), sub.image.height());

        write_segment(
            &mut out,
            SEGMENT_PCS,
            start,
            &composition(resolution, number, 0x80, Some((sub.x, sub.y))),
        );
        write_segment(&mut out, SEGMENT_WDS, start, &window(sub.x, sub.y, w, h));
        write_segment(&mut out, SEGMENT_PDS, start, &palette_segment(&indexed.palette));
        for segment in object_segments(&indexed, &rle) {
            write_segment(&mut out, SEGMENT_ODS, start, &segment);
        }
        write_segment(&mut out, SEGMENT_END, start, &[]);
        number = number.wrapping_add(1);

        write_segment(&mut out, SEGMENT_PCS, end, &composition(resolution, number, 0x00, None));
        write_segment(&mut out, SEGMENT_WDS, end, &window(sub.x, sub.y, w, h));
        write_segment(&mut out, SEGMENT_END, end, &[]);
        number = number.wrapping_add(1);
    }
    out
}

//! # VobSub 写入
//!
//! `.sub`：每个条目一个 4 色 SPU 包（隔行两场的 2 位游程编码 + 控制序列），
//! 切分进 2048 字节的 MPEG-2 PS 包（PES 私有流 1，子流 0x20）。
//!
//! `.idx`：分辨率、16 色调色板、语言 id 以及每个条目的时间戳和文件位置。
//!
//! ## 依赖关系
//! - 被 `convert/dispatch.rs` 使用
//! - 使用 `isolang` 规范化语言代码

use super::{ImageSubtitle, Resolution};
use crate::error::{Result, SubconvError};

use image::RgbaImage;
use isolang::Language;

const PACK_SIZE: usize = 2048;
const PACK_HEADER_SIZE: usize = 14;
const SUBSTREAM_ID: u8 = 0x20;
const MAX_SPU_SIZE: usize = 0xFFFF;

/// 调色板：0 背景，1 文字，2 描边，3 抗锯齿
const PALETTE: [u32; 16] = [
    0x000000, 0xFFFFFF, 0x000000, 0x808080, 0x828282, 0x828282, 0x828282, 0x828282,
    0x828282, 0x828282, 0x828282, 0x828282, 0x828282, 0x828282, 0x828282, 0x828282,
];

/// 把检测到的语言换成 VobSub 的两字母 id，默认英语
pub fn language_id(detected: Option<&str>) -> String {
    detected
        .map(|code| code.trim().to_lowercase())
        .and_then(|code| {
            let code = code.as_str();
            Language::from_639_1(code).or_else(|| Language::from_639_3(code))
        })
        .and_then(|lang| lang.to_639_1())
        .unwrap_or("en")
        .to_string()
}

/// 4 色索引：透明为 0，亮色为文字，其余为描边
fn classify(pixel: &image::Rgba<u8>) -> u8 {
    if pixel[3] < 128 {
        return 0;
    }
    let luma = (pixel[0] as u32 * 2126 + pixel[1] as u32 * 7152 + pixel[2] as u32 * 722) / 10_000;
    if luma >= 160 {
        1
    } else if luma >= 96 {
        3
    } else {
        2
    }
}

struct NibbleWriter {
    bytes: Vec<u8>,
    half: bool,
}

impl NibbleWriter {
    fn new() -> Self {
        NibbleWriter {
            bytes: Vec::new(),
            half: false,
        }
    }

    fn push(&mut self, nibble: u8) {
        if self.half {
            if let Some(last) = self.bytes.last_mut() {
                *last |= nibble & 0x0F;
            }
        } else {
            self.bytes.push(nibble << 4);
        }
        self.half = !self.half;
    }

    fn push_value(&mut self, value: u16, nibbles: u8) {
        for i in (0..nibbles).rev() {
            self.push(((value >> (i * 4)) & 0x0F) as u8);
        }
    }

    fn align(&mut self) {
        if self.half {
            self.half = false;
        }
    }
}

/// 一行的 2 位游程编码；行尾游程用“填满到行尾”形式
fn encode_line(writer: &mut NibbleWriter, row: &[u8]) {
    let mut i = 0;
    while i < row.len() {
        let color = row[i];
        let mut run = 1;
        while i + run < row.len() && row[i + run] == color && run < 255 {
            run += 1;
        }
        if i + run == row.len() && run > 3 {
            writer.push_value(color as u16, 4);
        } else {
            let value = ((run as u16) << 2) | color as u16;
            let nibbles = match run {
                1..=3 => 1,
                4..=15 => 2,
                16..=63 => 3,
                _ => 4,
            };
            writer.push_value(value, nibbles);
        }
        i += run;
    }
    writer.align();
}

/// 编码一场（偶数行或奇数行）
fn encode_field(image: &RgbaImage, first_row: u32) -> Vec<u8> {
    let mut writer = NibbleWriter::new();
    let mut y = first_row;
    while y < image.height() {
        let row: Vec<u8> = (0..image.width())
            .map(|x| classify(image.get_pixel(x, y)))
            .collect();
        encode_line(&mut writer, &row);
        y += 2;
    }
    writer.bytes
}

/// 生成一个 SPU 包
pub fn build_spu(sub: &ImageSubtitle) -> Result<Vec<u8>> {
    let top = encode_field(&sub.image, 0);
    let bottom = encode_field(&sub.image, 1);

    let top_offset = 4usize;
    let bottom_offset = top_offset + top.len();
    let control_offset = bottom_offset + bottom.len();

    let x1 = sub.x;
    let x2 = sub.x + sub.image.width().saturating_sub(1);
    let y1 = sub.y;
    let y2 = sub.y + sub.image.height().saturating_sub(1);

    let mut first = Vec::new();
    first.extend_from_slice(&0u16.to_be_bytes()); // date
    first.extend_from_slice(&0u16.to_be_bytes()); // next sequence, patched below
    first.push(0x01); // start display
    first.extend_from_slice(&[0x03, 0x32, 0x10]); // color index e2 e1 p b
    first.extend_from_slice(&[0x04, 0xFF, 0xF0]); // alpha, background transparent
    first.push(0x05);
    first.extend_from_slice(&[
        (x1 >> 4) as u8,
        (((x1 & 0x0F) << 4) | (x2 >> 8)) as u8,
        (x2 & 0xFF) as u8,
        (y1 >> 4) as u8,
        (((y1 & 0x0F) << 4) | (y2 >> 8)) as u8,
        (y2 & 0xFF) as u8,
    ]);
    first.push(0x06);
    first.extend_from_slice(&(top_offset as u16).to_be_bytes());
    first.extend_from_slice(&(bottom_offset as u16).to_be_bytes());
    first.push(0xFF);
    let stop_offset = control_offset + first.len();
    first[2..4].copy_from_slice(&(stop_offset as u16).to_be_bytes());

    let duration = (sub.end_ms - sub.start_ms).max(0.0);
    let delay = ((duration * 90.0) / 1024.0).round() as u16;
    let mut stop = Vec::new();
    stop.extend_from_slice(&delay.to_be_bytes());
    stop.extend_from_slice(&(stop_offset as u16).to_be_bytes());
    stop.push(0x02);
    stop.push(0xFF);

    let total = control_offset + first.len() + stop.len();
    if total > MAX_SPU_SIZE {
        return Err(SubconvError::ConversionError {
            from: "image".to_string(),
            to: "VobSub".to_string(),
            reason: format!("subtitle image too large ({} bytes)", total),
        });
    }

    let mut spu = Vec::with_capacity(total);
    spu.extend_from_slice(&(total as u16).to_be_bytes());
    spu.extend_from_slice(&(control_offset as u16).to_be_bytes());
    spu.extend_from_slice(&top);
    spu.extend_from_slice(&bottom);
    spu.extend_from_slice(&first);
    spu.extend_from_slice(&stop);
    Ok(spu)
}

fn pack_header(scr: u64) -> [u8; PACK_HEADER_SIZE] {
    [
        0x00,
        0x00,
        0x01,
        0xBA,
        0x44 | ((scr >> 27) & 0x38) as u8 | ((scr >> 28) & 0x03) as u8,
        ((scr >> 20) & 0xFF) as u8,
        0x04 | ((scr >> 12) & 0xF8) as u8 | ((scr >> 13) & 0x03) as u8,
        ((scr >> 5) & 0xFF) as u8,
        0x04 | ((scr << 3) & 0xF8) as u8,
        0x01,
        0x01,
        0x89,
        0xC3,
        0xF8,
    ]
}

fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x21 | ((pts >> 29) & 0x0E) as u8,
        ((pts >> 22) & 0xFF) as u8,
        0x01 | ((pts >> 14) & 0xFE) as u8,
        ((pts >> 7) & 0xFF) as u8,
        0x01 | ((pts << 1) & 0xFE) as u8,
    ]
}

/// 把 SPU 切进若干 2048 字节的包
pub fn packetize(spu: &[u8], pts: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offset = 0;
    let mut first = true;
    while offset < spu.len() || first {
        let header_data = if first { 5 } else { 0 };
        // 包头 + PES 起始码与长度(6) + 标志(3) + 头数据 + 子流号(1)
        let overhead = PACK_HEADER_SIZE + 6 + 3 + header_data + 1;
        let capacity = PACK_SIZE - overhead;
        let chunk = (spu.len() - offset).min(capacity);
        let spare = capacity - chunk;
        let stuffing = if spare > 0 && spare < 6 { spare } else { 0 };
        let padding = if spare >= 6 { spare } else { 0 };

        out.extend_from_slice(&pack_header(pts));
        out.extend_from_slice(&[0x00, 0x00, 0x01, 0xBD]);
        let pes_len = 3 + header_data + stuffing + 1 + chunk;
        out.extend_from_slice(&(pes_len as u16).to_be_bytes());
        out.push(0x81);
        out.push(if first { 0x80 } else { 0x00 });
        out.push((header_data + stuffing) as u8);
        if first {
            out.extend_from_slice(&pts_bytes(pts));
        }
        out.extend(std::iter::repeat(0xFF).take(stuffing));
        out.push(SUBSTREAM_ID);
        out.extend_from_slice(&spu[offset..offset + chunk]);
        if padding > 0 {
            out.extend_from_slice(&[0x00, 0x00, 0x01, 0xBE]);
            out.extend_from_slice(&((padding - 6) as u16).to_be_bytes());
            out.extend(std::iter::repeat(0xFF).take(padding - 6));
        }

        offset += chunk;
        first = false;
    }
    out
}

fn format_idx_time(ms: f64) -> String {
    let total = ms.max(0.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}:{:03}",
        total / 3_600_000,
        (total / 60_000) % 60,
        (total / 1000) % 60,
        total % 1000
    )
}

/// VobSub 输出（`.sub` 数据与 `.idx` 文本）
#[derive(Debug, Clone)]
pub struct VobSubOutput {
    pub sub: Vec<u8>,
    pub idx: String,
}

/// 写出全部条目
pub fn write(
    subtitles: &[ImageSubtitle],
    resolution: Resolution,
    language: &str,
) -> Result<VobSubOutput> {
    let mut sub = Vec::new();
    let mut timestamps = Vec::with_capacity(subtitles.len());
    for item in subtitles {
        let spu = build_spu(item)?;
        timestamps.push((item.start_ms, sub.len()));
        let pts = (item.start_ms.max(0.0) * 90.0).round() as u64;
        sub.extend_from_slice(&packetize(&spu, pts));
    }

    let mut idx = String::new();
    idx.push_str("# VobSub index file, v7 (do not modify this line!)\n");
    idx.push_str(&format!("size: {}\n", resolution));
    idx.push_str("org: 0, 0\nscale: 100%, 100%\nalpha: 100%\nsmooth: OFF\nfadein/out: 0, 0\nalign: OFF at LEFT TOP\ntime offset: 0\nforced subs: OFF\n");
    let palette: Vec<String> = PALETTE.iter().map(|c| format!("{:06x}", c)).collect();
    idx.push_str(&format!("palette: {}\n", palette.join(", ")));
    idx.push_str("custom colors: OFF, tridx: 0000, colors: 000000, 000000, 000000, 000000\n\n");
    idx.push_str(&format!("id: {}, index: 0\n", language));
    for (ms, pos) in timestamps {
        idx.push_str(&format!(
            "timestamp: {}, filepos: {:09X}\n",
            format_idx_time(ms),
            pos
        ));
    }
    Ok(VobSubOutput { sub, idx })
}

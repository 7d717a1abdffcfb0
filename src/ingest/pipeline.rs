//! # 解码与规范化流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGB”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素/内存上限快速拒绝
//! 3. 完整解码，并按 EXIF 方向校正
//! 4. 透明通道按黑底展平为 RGB（与画布背景一致）

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, RgbImage, RgbaImage};
use std::io::Cursor;

use super::loader::RawImageData;
use super::IngestConfig;
use crate::compositor::ImageError;

/// 解码并规范化为合成器可直接使用的 RGB 位图。
pub fn decode_normalized(raw: &RawImageData, config: &IngestConfig) -> Result<RgbImage, ImageError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    let decoded = decode_with_orientation(&raw.bytes)?;

    let (width, height) = decoded.dimensions();
    validate_pixel_limits(config, width, height)?;
    validate_decoded_memory_limits(config, width, height)?;

    let normalized = flatten_to_rgb(decoded);

    log::info!(
        "✅ 图片解码成功 - 来源: {} 名称: {} 原始尺寸: {}x{} 输出尺寸: {}x{}",
        raw.source_hint,
        raw.name,
        header_width,
        header_height,
        normalized.width(),
        normalized.height()
    );

    Ok(normalized)
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| ImageError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
}

fn decode_with_orientation(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| ImageError::Decode(format!("读取图片方向失败：{}", e)))?;

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// 校验像素数量是否超过配置上限。
fn validate_pixel_limits(config: &IngestConfig, width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
    }

    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(config: &IngestConfig, width: u32, height: u32) -> Result<(), ImageError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ImageError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 有透明通道时按黑底展平，否则直接转 RGB。
pub(crate) fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if image.color().has_alpha() {
        flatten_rgba(&image.to_rgba8())
    } else {
        image.to_rgb8()
    }
}

pub(crate) fn flatten_rgba(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over_black = |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
        image::Rgb([over_black(r), over_black(g), over_black(b)])
    })
}

//! # 缩略图模块
//!
//! ## 设计思路
//!
//! 一次性把大图缩到很小会严重混叠。做法是先逐级减半（每级 2x2 盒式平均），
//! 直到再减半就会小于目标尺寸，最后一步用平滑滤镜精确缩放到目标。
//!
//! 缩略图长边固定为配置值，短边按比例取整；原图比目标还小时不放大。

use image::imageops::FilterType;
use image::RgbImage;

use super::canvas::resize_full;
use super::config::Sampling;
use super::ImageError;

/// 缩略图尺寸：长边为 `long_side`，保持宽高比，不放大。
pub fn thumbnail_dimensions(source: (u32, u32), long_side: u32) -> (u32, u32) {
    let (width, height) = source;
    let longest = width.max(height);
    if longest == 0 || long_side == 0 || longest <= long_side {
        return (width.max(1), height.max(1));
    }

    let ratio = f64::from(long_side) / f64::from(longest);
    let scaled = |value: u32| ((f64::from(value) * ratio).round() as u32).clamp(1, long_side);
    (scaled(width), scaled(height))
}

/// 逐级减半的中间尺寸序列（不含最终缩放）。
pub fn halving_steps(source: (u32, u32), target: (u32, u32)) -> Vec<(u32, u32)> {
    let mut steps = Vec::new();
    let (mut width, mut height) = source;
    loop {
        let next = (width / 2, height / 2);
        if next.0 < target.0 || next.1 < target.1 || next.0 == 0 || next.1 == 0 {
            break;
        }
        steps.push(next);
        (width, height) = next;
    }
    steps
}

/// 生成缩略图。
pub fn make_thumbnail(
    image: &RgbImage,
    long_side: u32,
    smooth_filter: FilterType,
) -> Result<RgbImage, ImageError> {
    let target = thumbnail_dimensions(image.dimensions(), long_side);
    if target == image.dimensions() {
        return Ok(image.clone());
    }

    let steps = halving_steps(image.dimensions(), target);
    let mut current = image.clone();
    for (width, height) in &steps {
        // Nearest 映射为盒式卷积核，即 2x2 平均
        current = resize_full(&current, *width, *height, Sampling::Smooth, FilterType::Nearest)?;
    }

    log::debug!(
        "🖼️ 缩略图：{:?} -> {:?}（减半 {} 次）",
        image.dimensions(),
        target,
        steps.len()
    );

    if current.dimensions() == target {
        return Ok(current);
    }
    resize_full(&current, target.0, target.1, Sampling::Smooth, smooth_filter)
}

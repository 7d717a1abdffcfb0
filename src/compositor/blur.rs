//! # 模糊模块
//!
//! ## 实现思路
//!
//! 用三次盒式模糊近似高斯模糊：每次先水平再垂直，窗口用滑动累加和维护，
//! 复杂度与半径无关。边缘像素按“夹紧”取样，避免画面边缘变暗。
//!
//! 输入不会被修改：模糊结果总是写入新的缓冲区。

use image::RgbImage;

const PASSES: usize = 3;
const CHANNELS: usize = 3;

/// 对整张画布做近似高斯模糊。`sigma <= 0` 时返回原图副本。
pub fn gaussian_blur(image: &RgbImage, sigma: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if sigma <= 0.0 || width == 0 || height == 0 {
        return image.clone();
    }

    let mut current = image.as_raw().clone();
    let mut scratch = vec![0u8; current.len()];

    for size in boxes_for_gauss(sigma, PASSES) {
        let radius = (size - 1) / 2;
        if radius == 0 {
            continue;
        }
        box_blur_horizontal(&current, &mut scratch, width as usize, height as usize, radius);
        box_blur_vertical(&scratch, &mut current, width as usize, height as usize, radius);
    }

    // 缓冲区长度与尺寸始终一致
    RgbImage::from_raw(width, height, current).unwrap_or_else(|| image.clone())
}

/// 给定 sigma，计算 `n` 次盒式模糊各自的窗口宽度（奇数）。
fn boxes_for_gauss(sigma: f32, n: usize) -> Vec<usize> {
    let sigma = f64::from(sigma);
    let n_f = n as f64;
    let ideal_width = (12.0 * sigma * sigma / n_f + 1.0).sqrt();

    let mut lower = ideal_width.floor() as i64;
    if lower % 2 == 0 {
        lower -= 1;
    }
    let lower = lower.max(1);
    let upper = lower + 2;

    let lower_f = lower as f64;
    let ideal_m = (12.0 * sigma * sigma - n_f * lower_f * lower_f - 4.0 * n_f * lower_f - 3.0 * n_f)
        / (-4.0 * lower_f - 4.0);
    let m = ideal_m.round().max(0.0) as usize;

    (0..n)
        .map(|i| if i < m { lower as usize } else { upper as usize })
        .collect()
}

fn box_blur_horizontal(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize) {
    let window = (2 * radius + 1) as u32;
    let last = width - 1;

    for y in 0..height {
        let row = y * width * CHANNELS;
        for c in 0..CHANNELS {
            let at = |x: usize| u32::from(src[row + x * CHANNELS + c]);

            let mut sum: u32 = 0;
            for offset in 0..window as usize {
                let x = (offset as isize - radius as isize).clamp(0, last as isize) as usize;
                sum += at(x);
            }

            for x in 0..width {
                dst[row + x * CHANNELS + c] = ((sum + window / 2) / window) as u8;
                let incoming = (x + radius + 1).min(last);
                let outgoing = x.saturating_sub(radius);
                sum = sum + at(incoming) - at(outgoing);
            }
        }
    }
}

fn box_blur_vertical(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize) {
    let window = (2 * radius + 1) as u32;
    let last = height - 1;
    let stride = width * CHANNELS;

    for x in 0..width {
        for c in 0..CHANNELS {
            let column = x * CHANNELS + c;
            let at = |y: usize| u32::from(src[y * stride + column]);

            let mut sum: u32 = 0;
            for offset in 0..window as usize {
                let y = (offset as isize - radius as isize).clamp(0, last as isize) as usize;
                sum += at(y);
            }

            for y in 0..height {
                dst[y * stride + column] = ((sum + window / 2) / window) as u8;
                let incoming = (y + radius + 1).min(last);
                let outgoing = y.saturating_sub(radius);
                sum = sum + at(incoming) - at(outgoing);
            }
        }
    }
}

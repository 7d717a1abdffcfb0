//! # 画布模块
//!
//! ## 设计思路
//!
//! `Canvas` 是显式持有的光栅表面，替代“按 id 全局查找的画布元素”：
//! 交互视口与合成器各自持有一块，合成时以 `&mut Canvas` 传入。
//!
//! ## 实现思路
//!
//! - 背景为黑色 RGB（与 JPEG 输出一致，不保留透明度）。
//! - `draw_image` 只缩放与画布相交的源图窗口，放大倍数再大也不会分配整张放大图。
//! - 缩放优先走 `fast_image_resize`（支持浮点裁剪窗口），失败时回退到
//!   `image::imageops`，与剪贴板写入前的降采样策略一致。

use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::config::Sampling;
use super::placement::{Placement, Rect};
use super::ImageError;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// 可复用的 RGB 光栅表面。
#[derive(Debug, Clone)]
pub struct Canvas {
    frame: RgbImage,
}

impl Canvas {
    /// 创建黑底画布；零尺寸视为画布不可用。
    pub fn new(width: u32, height: u32) -> Result<Self, ImageError> {
        Self::validate_size(width, height)?;
        Ok(Self {
            frame: RgbImage::from_pixel(width, height, BACKGROUND),
        })
    }

    fn validate_size(width: u32, height: u32) -> Result<(), ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Canvas(format!("画布尺寸无效：{}x{}", width, height)));
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub fn frame(&self) -> &RgbImage {
        &self.frame
    }

    /// 调整尺寸并清空；尺寸不变时仅清空，复用缓冲区。
    pub fn reset(&mut self, width: u32, height: u32) -> Result<(), ImageError> {
        Self::validate_size(width, height)?;
        if self.frame.dimensions() == (width, height) {
            self.clear();
        } else {
            self.frame = RgbImage::from_pixel(width, height, BACKGROUND);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for pixel in self.frame.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    /// 按落点把源图画到画布上，画布外部分被裁掉。
    pub fn draw_image(
        &mut self,
        source: &RgbImage,
        placement: &Placement,
        sampling: Sampling,
        smooth_filter: FilterType,
    ) -> Result<(), ImageError> {
        let Some(region) = placement.visible_region(source.dimensions(), self.dimensions()) else {
            log::debug!("🫥 源图完全位于画布之外，跳过绘制");
            return Ok(());
        };

        let patch = resize_window(
            source,
            region.source,
            region.dest_width,
            region.dest_height,
            sampling,
            smooth_filter,
        )?;
        imageops::replace(&mut self.frame, &patch, i64::from(region.dest_x), i64::from(region.dest_y));
        Ok(())
    }

    /// 把已缩放好的位图贴到指定左上角（可为负），用于拖拽时的快速重绘。
    pub fn blit(&mut self, scaled: &RgbImage, x: i64, y: i64) {
        imageops::replace(&mut self.frame, scaled, x, y);
    }

    pub fn into_frame(self) -> RgbImage {
        self.frame
    }
}

impl Default for Canvas {
    /// 1x1 黑色占位画布，首次合成或设置场景时再调整尺寸。
    fn default() -> Self {
        Self {
            frame: RgbImage::from_pixel(1, 1, BACKGROUND),
        }
    }
}

/// 整图缩放到指定尺寸。
pub(crate) fn resize_full(
    source: &RgbImage,
    width: u32,
    height: u32,
    sampling: Sampling,
    smooth_filter: FilterType,
) -> Result<RgbImage, ImageError> {
    let (source_width, source_height) = source.dimensions();
    let window = Rect::new(0.0, 0.0, f64::from(source_width), f64::from(source_height));
    resize_window(source, window, width, height, sampling, smooth_filter)
}

/// 把源图的浮点窗口缩放到 `width x height`。
pub(crate) fn resize_window(
    source: &RgbImage,
    window: Rect,
    width: u32,
    height: u32,
    sampling: Sampling,
    smooth_filter: FilterType,
) -> Result<RgbImage, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Canvas(format!("目标尺寸无效：{}x{}", width, height)));
    }

    let alg = sampling.resize_alg(smooth_filter);
    match resize_with_fast_image_resize(source, window, width, height, alg) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 imageops::resize：{}", err);
            Ok(resize_with_imageops(
                source,
                window,
                width,
                height,
                sampling.image_filter(smooth_filter),
            ))
        }
    }
}

fn resize_with_fast_image_resize(
    source: &RgbImage,
    window: Rect,
    width: u32,
    height: u32,
    alg: fr::ResizeAlg,
) -> Result<RgbImage, ImageError> {
    let (source_width, source_height) = source.dimensions();

    let src_image = fr::images::ImageRef::new(
        source_width,
        source_height,
        source.as_raw(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| ImageError::Canvas(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(alg)
        .crop(window.x, window.y, window.width, window.height);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Canvas(format!("fast_image_resize 执行失败：{}", e)))?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| ImageError::Canvas("fast_image_resize 输出缓冲长度异常".to_string()))
}

/// 回退路径：窗口取整后裁剪，再用 `image` 缩放。
fn resize_with_imageops(
    source: &RgbImage,
    window: Rect,
    width: u32,
    height: u32,
    filter: FilterType,
) -> RgbImage {
    let (source_width, source_height) = source.dimensions();
    let x = (window.x.floor().max(0.0) as u32).min(source_width.saturating_sub(1));
    let y = (window.y.floor().max(0.0) as u32).min(source_height.saturating_sub(1));
    let crop_width = (window.width.ceil().max(1.0) as u32).min(source_width - x);
    let crop_height = (window.height.ceil().max(1.0) as u32).min(source_height - y);

    let cropped = imageops::crop_imm(source, x, y, crop_width, crop_height).to_image();
    imageops::resize(&cropped, width, height, filter)
}

//! # 配置模块
//!
//! ## 设计思路
//!
//! 将合成链路中所有“可调策略”集中到 `CompositorConfig`：编码质量、缩略图尺寸、
//! 平滑缩放滤镜、模糊半径换算系数与画布上限。`Default` 即生产配置。
//!
//! 滤镜沿用 `image::imageops::FilterType` 作为对外语义，
//! 内部通过 `to_fast_filter` 映射到 `fast_image_resize` 的卷积核。

use fast_image_resize as fr;
use image::imageops::FilterType;

/// 正常/模糊输出的默认 JPEG 质量。
pub const DEFAULT_NORMAL_QUALITY: u8 = 90;
/// 缩略图仅作预览，使用较低质量。
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 75;
/// 缩略图长边像素。
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 192;
/// 画布单边上限，与设置层的边界一致。
pub const MAX_CANVAS_DIMENSION: u32 = 3000;

/// 采样方式：平滑插值或像素化（最近邻）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Smooth,
    Pixelated,
}

impl Sampling {
    pub fn from_smooth_flag(smooth_rendering: bool) -> Self {
        if smooth_rendering {
            Self::Smooth
        } else {
            Self::Pixelated
        }
    }

    /// 转换为 `fast_image_resize` 的缩放算法。
    pub(crate) fn resize_alg(self, smooth_filter: FilterType) -> fr::ResizeAlg {
        match self {
            Self::Smooth => fr::ResizeAlg::Convolution(to_fast_filter(smooth_filter)),
            Self::Pixelated => fr::ResizeAlg::Nearest,
        }
    }

    /// 回退路径使用的 `image` 滤镜。
    pub(crate) fn image_filter(self, smooth_filter: FilterType) -> FilterType {
        match self {
            Self::Smooth => smooth_filter,
            Self::Pixelated => FilterType::Nearest,
        }
    }
}

/// 合成器配置。
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// 正常/模糊输出的 JPEG 质量（1-100）。
    pub normal_quality: u8,
    /// 缩略图 JPEG 质量（1-100）。
    pub thumbnail_quality: u8,
    /// 缩略图长边像素。
    pub thumbnail_size: u32,
    /// 平滑模式下使用的滤镜。
    pub smooth_filter: FilterType,
    /// 模糊半径（UI 单位）到高斯 sigma 的换算系数。
    pub blur_sigma_per_unit: f32,
    /// 画布单边上限。
    pub max_canvas_dimension: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            normal_quality: DEFAULT_NORMAL_QUALITY,
            thumbnail_quality: DEFAULT_THUMBNAIL_QUALITY,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            smooth_filter: FilterType::CatmullRom,
            blur_sigma_per_unit: 0.5,
            max_canvas_dimension: MAX_CANVAS_DIMENSION,
        }
    }
}

pub(crate) fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”“合成参数”“合成结果”三类数据解耦：
//! - `SourceImage`：已规范化的源位图 + 显示名，合成的唯一根输入
//! - `CanvasTarget`：合成器只读的目标参数（尺寸、缩放模式、模糊、采样）
//! - `CompositedOutput`：normal / blurred / thumbnail 三份编码结果
//! - `ImageVariants`：以 Data URL 形式持久化/导出的三份结果

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::config::Sampling;
use super::encode;
use super::placement::{ScaleFactor, ScaleMode};

/// 当前加载的源图。
///
/// 导入阶段已完成方向校正与透明通道展平，合成器直接使用 RGB 像素。
#[derive(Debug, Clone)]
pub struct SourceImage {
    name: String,
    extension: String,
    bitmap: RgbImage,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, extension: impl Into<String>, bitmap: RgbImage) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            bitmap,
        }
    }

    /// 显示名（不含扩展名）。
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn bitmap(&self) -> &RgbImage {
        &self.bitmap
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }

    /// 以 PNG Data URL 形式导出源图，供宿主回显。
    pub fn to_data_uri(&self) -> Result<String, super::ImageError> {
        encode::png_data_uri(&self.bitmap)
    }
}

/// 合成目标参数。
///
/// 边界校验发生在设置层（见 `settings`），合成器假定输入已合法。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasTarget {
    pub width: u32,
    pub height: u32,
    /// 整数缩放模式开关；关闭时为 cover-fit。
    pub integer_scale: bool,
    /// 整数模式下是否自动求覆盖系数（忽略 `integer_scale_value`）。
    pub auto_scale: bool,
    /// 手动缩放倍数（1-32），仅整数模式且非自动时生效。
    pub integer_scale_value: u32,
    /// 模糊半径（0-180，UI 单位）。
    pub blur_amount: u32,
    pub smooth_rendering: bool,
}

impl CanvasTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn scale_mode(&self) -> ScaleMode {
        if !self.integer_scale {
            ScaleMode::CoverFit
        } else if self.auto_scale {
            ScaleMode::Integer(ScaleFactor::Auto)
        } else {
            ScaleMode::Integer(ScaleFactor::Manual(self.integer_scale_value))
        }
    }

    pub fn sampling(&self) -> Sampling {
        Sampling::from_smooth_flag(self.smooth_rendering)
    }
}

impl Default for CanvasTarget {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
            integer_scale: false,
            auto_scale: false,
            integer_scale_value: 1,
            blur_amount: 0,
            smooth_rendering: true,
        }
    }
}

/// 单份编码结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn to_data_uri(&self) -> String {
        encode::to_data_uri(self.mime, &self.bytes)
    }
}

/// 合成结果三元组。相同输入重复合成得到相同字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositedOutput {
    pub normal: EncodedImage,
    pub blurred: EncodedImage,
    pub thumbnail: EncodedImage,
}

impl CompositedOutput {
    pub fn to_variants(&self) -> ImageVariants {
        ImageVariants {
            normal: self.normal.to_data_uri(),
            blurred: self.blurred.to_data_uri(),
            thumbnail: self.thumbnail.to_data_uri(),
        }
    }
}

/// 持久化与导出使用的 Data URL 三元组。
///
/// 旧版项目文件没有缩略图字段，读取时置空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariants {
    pub normal: String,
    pub blurred: String,
    #[serde(default)]
    pub thumbnail: String,
}

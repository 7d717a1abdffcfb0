//! # 剪贴板导入模块
//!
//! ## 设计思路
//!
//! 粘贴事件可能携带多个条目（文本、HTML、图片），只取第一个图片条目；
//! 全是非图片条目时静默忽略，而不是报错打断用户。
//!
//! 宿主没有粘贴事件时（桌面端），直接从系统剪贴板读取位图。
//!
//! ## 实现思路
//!
//! - 粘贴条目按 MIME 前缀 `image/` 过滤。
//! - 系统剪贴板访问使用 `arboard`，在阻塞线程执行，避免阻塞 async 运行时。
//! - 剪贴板图片没有文件名，以时间戳生成显示名。

use std::borrow::Cow;

use chrono::Local;
use image::RgbaImage;

use super::pipeline::flatten_rgba;
use crate::compositor::{ImageError, SourceImage};

/// 粘贴事件中的单个条目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub mime: String,
    /// 条目自带的文件名（浏览器复制文件时存在）。
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl ClipboardItem {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            file_name: None,
            bytes,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn is_image(&self) -> bool {
        self.mime.trim().to_ascii_lowercase().starts_with("image/")
    }

    /// 导入时使用的文件名：优先条目自带名，否则按 MIME 子类型生成。
    pub fn resolved_file_name(&self) -> String {
        match &self.file_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => {
                let subtype = self.mime.rsplit('/').next().unwrap_or("png");
                format!("{}.{}", clipboard_display_name(), subtype)
            }
        }
    }
}

/// 第一个图片条目；没有时返回 `None`。
pub fn first_image_item(items: &[ClipboardItem]) -> Option<&ClipboardItem> {
    items.iter().find(|item| item.is_image())
}

/// 剪贴板图片的显示名。
pub fn clipboard_display_name() -> String {
    format!("clipboard-{}", Local::now().format("%Y%m%d%H%M%S"))
}

/// 从系统剪贴板读取图片。剪贴板里没有图片时返回 `Ok(None)`。
pub async fn read_system_clipboard_image() -> Result<Option<SourceImage>, ImageError> {
    let rgba = tokio::task::spawn_blocking(read_clipboard_rgba)
        .await
        .map_err(|e| ImageError::Clipboard(format!("线程执行失败：{}", e)))??;

    Ok(rgba.map(|rgba| {
        log::info!("📋 已读取系统剪贴板图片：{}x{}", rgba.width(), rgba.height());
        SourceImage::new(clipboard_display_name(), "png", flatten_rgba(&rgba))
    }))
}

fn read_clipboard_rgba() -> Result<Option<RgbaImage>, ImageError> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| ImageError::Clipboard(format!("无法访问剪贴板：{}", e)))?;

    match clipboard.get_image() {
        Ok(image) => image_data_to_rgba(image.width, image.height, image.bytes).map(Some),
        Err(arboard::Error::ContentNotAvailable) => {
            log::debug!("📋 剪贴板中没有图片，忽略");
            Ok(None)
        }
        Err(e) => Err(ImageError::Clipboard(format!("读取剪贴板图片失败：{}", e))),
    }
}

fn image_data_to_rgba(width: usize, height: usize, bytes: Cow<'_, [u8]>) -> Result<RgbaImage, ImageError> {
    let width = u32::try_from(width)
        .map_err(|_| ImageError::ResourceLimit("剪贴板图片宽度溢出".to_string()))?;
    let height = u32::try_from(height)
        .map_err(|_| ImageError::ResourceLimit("剪贴板图片高度溢出".to_string()))?;

    RgbaImage::from_raw(width, height, bytes.into_owned())
        .ok_or_else(|| ImageError::Decode("剪贴板像素数据长度异常".to_string()))
}

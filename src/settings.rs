//! 用户设置模块
//!
//! # 设计思路
//!
//! 合成器假定输入已合法，所有边界校验都在这里的 setter 完成：
//! 越界的值被拒绝（返回 `AppError::Settings`），设置保持原值。
//! `Settings::canvas_target()` 产出合成器只读的 `CanvasTarget` 快照。
//!
//! # 实现思路
//!
//! - JSON 字段沿用 camelCase（`canvasSize { w, h }`、`blurAmount` 等）。
//! - 设置文件不存在、无法解析或含越界值时回退到默认值，不阻断启动。
//! - 写入使用 pretty JSON，便于用户手动查看。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compositor::{CanvasTarget, MAX_CANVAS_DIMENSION};
use crate::error::AppError;

pub const MAX_BLUR_AMOUNT: u32 = 180;
pub const MIN_INTEGER_SCALE: u32 = 1;
pub const MAX_INTEGER_SCALE: u32 = 32;

/// 辅助参考线类型（仅 UI 显示用）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideType {
    #[default]
    None,
    Albedo,
    Elementerial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub w: u32,
    pub h: u32,
}

/// 用户设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub project_name: String,
    pub canvas_size: CanvasSize,
    pub guide_type: GuideType,
    pub blur_amount: u32,
    pub integer_scale: bool,
    pub integer_scale_value: u32,
    /// 整数模式下自动求覆盖系数。
    pub auto_scale: bool,
    pub smooth_rendering: bool,
    pub show_blur: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "Albedo".to_string(),
            canvas_size: CanvasSize { w: 480, h: 320 },
            guide_type: GuideType::None,
            blur_amount: 0,
            integer_scale: false,
            integer_scale_value: 1,
            auto_scale: false,
            smooth_rendering: true,
            show_blur: false,
        }
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), AppError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Settings(format!(
            "{} 必须在 {}~{} 之间，收到 {}",
            field, min, max, value
        )))
    }
}

impl Settings {
    /// 合成器读取的目标参数快照。
    pub fn canvas_target(&self) -> CanvasTarget {
        CanvasTarget {
            width: self.canvas_size.w,
            height: self.canvas_size.h,
            integer_scale: self.integer_scale,
            auto_scale: self.auto_scale,
            integer_scale_value: self.integer_scale_value,
            blur_amount: self.blur_amount,
            smooth_rendering: self.smooth_rendering,
        }
    }

    /// 全部字段都在合法范围内。
    pub fn validate(&self) -> Result<(), AppError> {
        check_range("canvasSize.w", self.canvas_size.w, 0, MAX_CANVAS_DIMENSION)?;
        check_range("canvasSize.h", self.canvas_size.h, 0, MAX_CANVAS_DIMENSION)?;
        check_range("blurAmount", self.blur_amount, 0, MAX_BLUR_AMOUNT)?;
        check_range(
            "integerScaleValue",
            self.integer_scale_value,
            MIN_INTEGER_SCALE,
            MAX_INTEGER_SCALE,
        )?;
        if self.project_name.trim().is_empty() {
            return Err(AppError::Settings("projectName 不能为空".to_string()));
        }
        Ok(())
    }

    pub fn set_project_name(&mut self, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Settings("projectName 不能为空".to_string()));
        }
        self.project_name = name.to_string();
        Ok(())
    }

    pub fn set_canvas_width(&mut self, width: u32) -> Result<(), AppError> {
        check_range("canvasSize.w", width, 0, MAX_CANVAS_DIMENSION)?;
        self.canvas_size.w = width;
        Ok(())
    }

    pub fn set_canvas_height(&mut self, height: u32) -> Result<(), AppError> {
        check_range("canvasSize.h", height, 0, MAX_CANVAS_DIMENSION)?;
        self.canvas_size.h = height;
        Ok(())
    }

    /// 两个值都合法时才一起生效。
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<(), AppError> {
        check_range("canvasSize.w", width, 0, MAX_CANVAS_DIMENSION)?;
        check_range("canvasSize.h", height, 0, MAX_CANVAS_DIMENSION)?;
        self.canvas_size = CanvasSize { w: width, h: height };
        Ok(())
    }

    /// 交换宽高。
    pub fn invert_canvas(&mut self) {
        self.canvas_size = CanvasSize {
            w: self.canvas_size.h,
            h: self.canvas_size.w,
        };
    }

    pub fn set_blur_amount(&mut self, amount: u32) -> Result<(), AppError> {
        check_range("blurAmount", amount, 0, MAX_BLUR_AMOUNT)?;
        self.blur_amount = amount;
        Ok(())
    }

    pub fn set_integer_scale_value(&mut self, value: u32) -> Result<(), AppError> {
        check_range("integerScaleValue", value, MIN_INTEGER_SCALE, MAX_INTEGER_SCALE)?;
        self.integer_scale_value = value;
        Ok(())
    }

    pub fn set_guide_type(&mut self, guide: GuideType) {
        self.guide_type = guide;
    }

    /// 切换开关；传入 `Some` 时直接设置。
    pub fn toggle_integer_scale(&mut self, value: Option<bool>) {
        self.integer_scale = value.unwrap_or(!self.integer_scale);
    }

    pub fn toggle_auto_scale(&mut self, value: Option<bool>) {
        self.auto_scale = value.unwrap_or(!self.auto_scale);
    }

    pub fn toggle_smooth_rendering(&mut self, value: Option<bool>) {
        self.smooth_rendering = value.unwrap_or(!self.smooth_rendering);
    }

    pub fn toggle_show_blur(&mut self, value: Option<bool>) {
        self.show_blur = value.unwrap_or(!self.show_blur);
    }
}

/// 设置文件存取
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 使用目录下的 `settings.json`。
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置；文件缺失时返回 `None`，内容损坏时返回错误。
    pub fn read(&self) -> Result<Option<Settings>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let parsed = serde_json::from_str::<Settings>(&content)
            .map_err(|e| AppError::Storage(format!("解析设置文件失败: {}", e)))?;
        parsed.validate()?;
        Ok(Some(parsed))
    }

    /// 读取设置，任何失败都回退到默认值。
    pub fn load_or_default(&self) -> Settings {
        match self.read() {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("⚠️ 设置文件不可用，使用默认设置 - 路径: {} 原因: {}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), AppError> {
        settings.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("创建设置目录失败: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Storage(format!("序列化设置失败: {}", e)))?;
        fs::write(&self.path, content)?;
        log::debug!("💾 设置已保存 - 路径: {}", self.path.display());
        Ok(())
    }
}

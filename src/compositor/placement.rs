//! # 放置几何模块
//!
//! ## 设计思路
//!
//! 把“源图画到画布哪里、画多大”抽成纯函数，合成器与交互视口共用同一套几何：
//!
//! - **cover-fit**：按约束轴等比放大/缩小，使源图恰好铺满画布，溢出轴居中裁剪。
//!   居中时可见区域即 `cover_crop_window` 给出的裁剪窗口。
//! - **整数缩放**：源图按整数倍（自动覆盖系数或手动倍数）放大后居中，
//!   溢出部分由画布边界裁掉。
//!
//! ## 实现思路
//!
//! `Placement::rect` 描述整张源图在画布坐标系中的落点（可为负、可超出画布）。
//! 平移量 `PanOffset` 表示源图中心在画布上的位置：
//! cover-fit 会把中心收敛到仍能铺满画布的范围内；整数模式下若某轴恰好等于画布，
//! 该轴锁定居中。`visible_region` 再把落点与画布求交，换算回源图裁剪窗口。

use super::scale::auto_scale_factor;

/// 浮点矩形（画布或源图坐标系）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// 闭区间命中测试（边框上的点也算命中）。
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn center(&self) -> PanOffset {
        PanOffset::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// 源图中心在画布上的位置（像素）。仅存在于交互视口，不持久化。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanOffset {
    pub x: f64,
    pub y: f64,
}

impl PanOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 画布中心。
    pub fn centered(canvas: (u32, u32)) -> Self {
        Self::new(f64::from(canvas.0) / 2.0, f64::from(canvas.1) / 2.0)
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 整数模式下的倍数来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFactor {
    Auto,
    Manual(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    CoverFit,
    Integer(ScaleFactor),
}

/// cover-fit 的居中裁剪窗口（源图坐标）。
///
/// `target_w / target_h > source_w / source_h` 时宽为约束轴：取整宽、裁高；
/// 否则取整高、裁宽。窗口拉伸后恰好铺满画布。
pub fn cover_crop_window(source: (u32, u32), target: (u32, u32)) -> Rect {
    let (source_width, source_height) = (f64::from(source.0), f64::from(source.1));
    let (target_width, target_height) = (f64::from(target.0), f64::from(target.1));

    let new_image_height = source_width / target_width * target_height;
    let new_image_width = source_height / target_height * target_width;

    if target_width / target_height > source_width / source_height {
        let y_position = source_height / 2.0 - new_image_height / 2.0;
        Rect::new(0.0, y_position, source_width, new_image_height)
    } else {
        let x_position = source_width / 2.0 - new_image_width / 2.0;
        Rect::new(x_position, 0.0, new_image_width, source_height)
    }
}

/// 源图在画布上的落点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub mode: ScaleMode,
    /// 源图 → 画布的缩放比。
    pub scale: f64,
    /// 整张源图在画布坐标系中的矩形。
    pub rect: Rect,
}

impl Placement {
    /// 计算落点；`pan` 为空时居中。
    pub fn compute(
        source: (u32, u32),
        canvas: (u32, u32),
        mode: ScaleMode,
        pan: Option<PanOffset>,
    ) -> Self {
        let center = pan.unwrap_or_else(|| PanOffset::centered(canvas));
        match mode {
            ScaleMode::CoverFit => Self::cover(source, canvas, center),
            ScaleMode::Integer(factor) => Self::integer(source, canvas, factor, center),
        }
    }

    fn cover(source: (u32, u32), canvas: (u32, u32), center: PanOffset) -> Self {
        let (source_width, source_height) = (f64::from(source.0), f64::from(source.1));
        let (canvas_width, canvas_height) = (f64::from(canvas.0), f64::from(canvas.1));

        let scale = if canvas_width / canvas_height > source_width / source_height {
            canvas_width / source_width
        } else {
            canvas_height / source_height
        };
        let width = source_width * scale;
        let height = source_height * scale;

        let x = clamp_cover_center(center.x, width, canvas_width);
        let y = clamp_cover_center(center.y, height, canvas_height);

        Self {
            mode: ScaleMode::CoverFit,
            scale,
            rect: Rect::new(x - width / 2.0, y - height / 2.0, width, height),
        }
    }

    fn integer(source: (u32, u32), canvas: (u32, u32), factor: ScaleFactor, center: PanOffset) -> Self {
        let factor = Self::integer_factor(source, canvas, factor);
        let width = u64::from(source.0) * u64::from(factor);
        let height = u64::from(source.1) * u64::from(factor);

        let x = if width == u64::from(canvas.0) {
            f64::from(canvas.0) / 2.0
        } else {
            center.x
        };
        let y = if height == u64::from(canvas.1) {
            f64::from(canvas.1) / 2.0
        } else {
            center.y
        };

        let (width, height) = (width as f64, height as f64);
        Self {
            mode: ScaleMode::Integer(ScaleFactor::Manual(factor)),
            scale: f64::from(factor),
            rect: Rect::new(x - width / 2.0, y - height / 2.0, width, height),
        }
    }

    /// 整数模式实际使用的倍数（至少为 1）。
    pub fn integer_factor(source: (u32, u32), canvas: (u32, u32), factor: ScaleFactor) -> u32 {
        match factor {
            ScaleFactor::Auto => auto_scale_factor(source, canvas).max(1),
            ScaleFactor::Manual(value) => value.max(1),
        }
    }

    pub fn center(&self) -> PanOffset {
        self.rect.center()
    }

    /// 缩放后尺寸（四舍五入到像素）。
    pub fn scaled_size(&self) -> (u32, u32) {
        (
            self.rect.width.round().max(1.0) as u32,
            self.rect.height.round().max(1.0) as u32,
        )
    }

    /// 与画布求交后的可见区域；完全不可见时返回 `None`。
    pub fn visible_region(&self, source: (u32, u32), canvas: (u32, u32)) -> Option<VisibleRegion> {
        let rect = self.rect;
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return None;
        }

        let dest_x0 = rect.x.max(0.0).round();
        let dest_y0 = rect.y.max(0.0).round();
        let dest_x1 = rect.right().min(f64::from(canvas.0)).round();
        let dest_y1 = rect.bottom().min(f64::from(canvas.1)).round();
        if dest_x1 <= dest_x0 || dest_y1 <= dest_y0 {
            return None;
        }

        let (source_width, source_height) = (f64::from(source.0), f64::from(source.1));
        let per_dest_x = source_width / rect.width;
        let per_dest_y = source_height / rect.height;

        let source_x = ((dest_x0 - rect.x) * per_dest_x).clamp(0.0, source_width);
        let source_y = ((dest_y0 - rect.y) * per_dest_y).clamp(0.0, source_height);
        let source_w = ((dest_x1 - dest_x0) * per_dest_x).min(source_width - source_x);
        let source_h = ((dest_y1 - dest_y0) * per_dest_y).min(source_height - source_y);
        if source_w <= 0.0 || source_h <= 0.0 {
            return None;
        }

        Some(VisibleRegion {
            dest_x: dest_x0 as u32,
            dest_y: dest_y0 as u32,
            dest_width: (dest_x1 - dest_x0) as u32,
            dest_height: (dest_y1 - dest_y0) as u32,
            source: Rect::new(source_x, source_y, source_w, source_h),
        })
    }
}

/// 可见区域：画布上的整数像素矩形 + 对应的源图浮点裁剪窗口。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRegion {
    pub dest_x: u32,
    pub dest_y: u32,
    pub dest_width: u32,
    pub dest_height: u32,
    pub source: Rect,
}

/// 把中心收敛到 `[extent - size/2, size/2]`，保证该轴仍被铺满。
fn clamp_cover_center(center: f64, size: f64, extent: f64) -> f64 {
    let low = extent - size / 2.0;
    let high = size / 2.0;
    if high <= low {
        extent / 2.0
    } else {
        center.clamp(low, high)
    }
}

//! # 交互视口模块（viewport）
//!
//! ## 设计思路
//!
//! `InteractiveViewport` 显式持有屏幕画布，在当前平移量下渲染源图，
//! 并处理拖拽重定位。状态机：
//!
//! ```text
//! Idle ──按下（命中图像）──▶ Dragging ──移动──▶ Dragging（即时重绘，不合成）
//!   ▲                           │
//!   ├────────松开（提交）────────┤
//!   └────离开画布（取消还原）────┘
//! ```
//!
//! - 拖拽期间用缓存的缩放位图直接贴图，保证响应；松开后由调用方调度一次完整合成。
//! - 指针离开画布时取消拖拽并还原到拖拽起点，不提交。
//! - 滚轮只调整屏幕显示比例（`DisplayZoom`），与合成结果无关。
//!
//! ## 实现思路
//!
//! - 缩放位图只在像素数不超过 `max_cached_pixels` 时缓存；
//!   超出时（大倍数整数缩放）每次重绘只缩放可见窗口。
//! - 换图或画布尺寸变化时平移量重置为画布中心。

mod drag;
mod zoom;

use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbImage;

use crate::compositor::{
    resize_full, Canvas, CanvasTarget, ImageError, PanOffset, Placement, SourceImage,
};

pub use drag::DragState;
pub use zoom::{
    DisplayZoom, DEFAULT_DISPLAY_ZOOM, DISPLAY_ZOOM_STEP, MAX_DISPLAY_ZOOM, MIN_DISPLAY_ZOOM,
};

/// 视口配置。
#[derive(Debug, Clone)]
pub struct ViewportConfig {
    /// 拖拽缓存位图的像素上限。
    pub max_cached_pixels: u64,
    /// 平滑模式下使用的滤镜。
    pub smooth_filter: FilterType,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            max_cached_pixels: 16_000_000,
            smooth_filter: FilterType::CatmullRom,
        }
    }
}

/// 指针样式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Auto,
    Grab,
    Grabbing,
}

/// 一次指针事件的处理结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// 事件与当前状态无关。
    Ignored,
    DragStarted,
    /// 拖拽中，画布已按新平移量重绘。
    Redrawn,
    /// 拖拽结束，调用方应以该平移量调度重新合成。
    Committed(PanOffset),
    /// 拖拽被取消，平移量已还原。
    Cancelled,
}

struct Scene {
    source: Arc<SourceImage>,
    target: CanvasTarget,
    placement: Placement,
    scaled: Option<RgbImage>,
}

/// 交互视口。
pub struct InteractiveViewport {
    config: ViewportConfig,
    canvas: Canvas,
    scene: Option<Scene>,
    drag: DragState,
    zoom: DisplayZoom,
    cursor: Cursor,
}

impl InteractiveViewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            canvas: Canvas::default(),
            scene: None,
            drag: DragState::default(),
            zoom: DisplayZoom::default(),
            cursor: Cursor::Auto,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn zoom(&self) -> DisplayZoom {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: DisplayZoom) {
        self.zoom = zoom;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging
    }

    pub fn source(&self) -> Option<&Arc<SourceImage>> {
        self.scene.as_ref().map(|scene| &scene.source)
    }

    pub fn target(&self) -> Option<CanvasTarget> {
        self.scene.as_ref().map(|scene| scene.target)
    }

    /// 当前平移量（源图中心在画布上的位置）。
    pub fn pan(&self) -> Option<PanOffset> {
        self.scene.as_ref().map(|scene| scene.placement.center())
    }

    /// 当前落点。
    pub fn placement(&self) -> Option<Placement> {
        self.scene.as_ref().map(|scene| scene.placement)
    }

    /// 设置源图与目标参数并立即重绘。
    ///
    /// 换图或画布尺寸变化时平移量回到中心，其它参数变化保留当前平移量。
    /// 进行中的拖拽会被放弃。
    pub fn set_scene(&mut self, source: Arc<SourceImage>, target: CanvasTarget) -> Result<(), ImageError> {
        self.drag.stop();
        if self.cursor == Cursor::Grabbing {
            self.cursor = Cursor::Grab;
        }

        let keep_pan = self.scene.as_ref().and_then(|scene| {
            let same_source = Arc::ptr_eq(&scene.source, &source);
            let same_size = scene.target.size() == target.size();
            (same_source && same_size).then(|| scene.placement.center())
        });

        if target.width == 0 || target.height == 0 {
            self.scene = None;
            return Err(ImageError::Canvas(format!(
                "画布尺寸无效：{}x{}",
                target.width, target.height
            )));
        }

        let placement = Placement::compute(source.dimensions(), target.size(), target.scale_mode(), keep_pan);
        let scaled = self.build_cache(&source, &target, &placement)?;

        self.scene = Some(Scene {
            source,
            target,
            placement,
            scaled,
        });
        self.redraw()
    }

    /// 清除源图（“清空画布”）。
    pub fn clear_scene(&mut self) {
        self.drag.stop();
        self.scene = None;
        self.canvas.clear();
    }

    /// 把平移量重置到画布中心。
    pub fn reset_pan(&mut self) -> Result<(), ImageError> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(());
        };
        scene.placement = Placement::compute(
            scene.source.dimensions(),
            scene.target.size(),
            scene.target.scale_mode(),
            None,
        );
        self.redraw()
    }

    fn build_cache(
        &self,
        source: &SourceImage,
        target: &CanvasTarget,
        placement: &Placement,
    ) -> Result<Option<RgbImage>, ImageError> {
        let (width, height) = placement.scaled_size();
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.config.max_cached_pixels {
            log::debug!(
                "🧮 缩放位图 {}x{} 超出缓存上限，拖拽时按可见窗口重绘",
                width,
                height
            );
            return Ok(None);
        }

        resize_full(source.bitmap(), width, height, target.sampling(), self.config.smooth_filter).map(Some)
    }

    /// 按当前平移量重绘画布。
    pub fn redraw(&mut self) -> Result<(), ImageError> {
        let Some(scene) = self.scene.as_ref() else {
            self.canvas.clear();
            return Ok(());
        };

        self.canvas.reset(scene.target.width, scene.target.height)?;
        match &scene.scaled {
            Some(scaled) => {
                let rect = scene.placement.rect;
                self.canvas.blit(scaled, rect.x.round() as i64, rect.y.round() as i64);
                Ok(())
            }
            None => self.canvas.draw_image(
                scene.source.bitmap(),
                &scene.placement,
                scene.target.sampling(),
                self.config.smooth_filter,
            ),
        }
    }

    /// 用合成完成的画面替换即时画面。
    ///
    /// 只有源图与平移量都未变化且不在拖拽中时才替换，否则保留当前画面并返回 `false`。
    pub fn present_frame(
        &mut self,
        source: &Arc<SourceImage>,
        pan: Option<PanOffset>,
        frame: &RgbImage,
    ) -> bool {
        if self.drag.is_dragging {
            return false;
        }
        let Some(scene) = self.scene.as_ref() else {
            return false;
        };
        if !Arc::ptr_eq(&scene.source, source)
            || Some(scene.placement.center()) != pan
            || self.canvas.dimensions() != frame.dimensions()
        {
            return false;
        }

        self.canvas.blit(frame, 0, 0);
        true
    }

    /// 按下：命中当前图像时进入拖拽。
    pub fn pointer_down(&mut self, x: f64, y: f64) -> PointerOutcome {
        let Some(scene) = self.scene.as_ref() else {
            return PointerOutcome::Ignored;
        };
        if !scene.placement.rect.contains(x, y) {
            return PointerOutcome::Ignored;
        }

        self.drag.start((x, y), scene.placement.center());
        self.cursor = Cursor::Grabbing;
        log::debug!("✋ 开始拖拽 - 位置: ({:.1}, {:.1})", x, y);
        PointerOutcome::DragStarted
    }

    /// 拖拽中移动：更新平移量并用缓存位图即时重绘。
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<PointerOutcome, ImageError> {
        let Some(pan) = self.drag.calculate_pan((x, y)) else {
            return Ok(PointerOutcome::Ignored);
        };
        if !self.move_to(pan) {
            return Ok(PointerOutcome::Ignored);
        }
        self.redraw()?;
        Ok(PointerOutcome::Redrawn)
    }

    /// 松开：结束拖拽并提交平移量。
    pub fn pointer_up(&mut self) -> PointerOutcome {
        if !self.drag.is_dragging {
            return PointerOutcome::Ignored;
        }
        self.drag.stop();
        self.cursor = Cursor::Grab;

        match self.pan() {
            Some(pan) => {
                log::debug!("📌 拖拽结束，提交平移量 ({:.1}, {:.1})", pan.x, pan.y);
                PointerOutcome::Committed(pan)
            }
            None => PointerOutcome::Ignored,
        }
    }

    pub fn pointer_enter(&mut self) {
        if !self.drag.is_dragging {
            self.cursor = Cursor::Grab;
        }
    }

    /// 离开画布：拖拽中则取消并还原到拖拽起点。
    pub fn pointer_leave(&mut self) -> Result<PointerOutcome, ImageError> {
        self.cursor = Cursor::Auto;
        if !self.drag.is_dragging {
            return Ok(PointerOutcome::Ignored);
        }

        let Some(start_pan) = self.drag.stop() else {
            return Ok(PointerOutcome::Ignored);
        };
        self.move_to(start_pan);
        self.redraw()?;
        log::debug!("↩️ 指针离开画布，拖拽已取消");
        Ok(PointerOutcome::Cancelled)
    }

    /// 滚轮：只调整屏幕显示比例。
    pub fn wheel(&mut self, delta_y: f64) -> DisplayZoom {
        self.zoom = self.zoom.apply_wheel(delta_y);
        self.zoom
    }

    fn move_to(&mut self, pan: PanOffset) -> bool {
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        scene.placement = Placement::compute(
            scene.source.dimensions(),
            scene.target.size(),
            scene.target.scale_mode(),
            Some(pan),
        );
        true
    }
}

impl Default for InteractiveViewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

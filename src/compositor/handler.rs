//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `Compositor` 只负责流程编排，不持有画布也不关心调度。
//! 一次合成的链路固定为：
//! 1. 读取配置快照
//! 2. 计算落点并在画布上绘制 normal 帧
//! 3. 在副本上模糊得到 blurred 帧
//! 4. 逐级减半生成缩略图
//! 5. 三份结果分别编码
//!
//! ## 实现思路
//!
//! - `compose` 返回 `Result`，便于测试与复用；`recompute` 是对外入口，
//!   失败时只记 `warn` 日志并保留上一份输出，从不向调用方抛错。
//! - 最新输出以 `Arc<CompositedOutput>` 发布，读取方拿到的是不可变快照。
//! - 记录 `place/blur/thumb/encode/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use super::blur::gaussian_blur;
use super::canvas::Canvas;
use super::encode::encode_jpeg;
use super::placement::{PanOffset, Placement};
use super::source::{CanvasTarget, CompositedOutput, SourceImage};
use super::thumbnail::make_thumbnail;
use super::{CompositorConfig, ImageError};

/// 合成器。
pub struct Compositor {
    config: RwLock<CompositorConfig>,
    output: RwLock<Option<Arc<CompositedOutput>>>,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config: RwLock::new(config),
            output: RwLock::new(None),
        }
    }

    /// 获取配置快照，保证单次合成使用一致参数。
    pub fn config_snapshot(&self) -> CompositorConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: CompositorConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// 最近一次成功合成的结果。
    pub fn current_output(&self) -> Option<Arc<CompositedOutput>> {
        self.output
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_output(&self) {
        *self.output.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// 合成并发布结果。
    ///
    /// 画布不可用或编码失败时静默放弃本次合成，之前的输出保持不变。
    pub fn recompute(
        &self,
        canvas: &mut Canvas,
        source: &SourceImage,
        target: &CanvasTarget,
        pan: Option<PanOffset>,
    ) -> Option<Arc<CompositedOutput>> {
        match self.compose(canvas, source, target, pan) {
            Ok(output) => Some(self.publish(output)),
            Err(err) => {
                log::warn!("⚠️ 合成已放弃，保留上一份输出 [{}]：{}", err.code(), err);
                None
            }
        }
    }

    /// 发布一份已完成的合成结果，替换上一份。
    pub fn publish(&self, output: CompositedOutput) -> Arc<CompositedOutput> {
        let output = Arc::new(output);
        *self.output.write().unwrap_or_else(PoisonError::into_inner) = Some(output.clone());
        output
    }

    /// 执行一次完整合成，不修改已发布的输出。
    pub fn compose(
        &self,
        canvas: &mut Canvas,
        source: &SourceImage,
        target: &CanvasTarget,
        pan: Option<PanOffset>,
    ) -> Result<CompositedOutput, ImageError> {
        let total_started = Instant::now();
        let config = self.config_snapshot();

        let (width, height) = target.size();
        if width > config.max_canvas_dimension || height > config.max_canvas_dimension {
            return Err(ImageError::Canvas(format!(
                "画布尺寸超出上限：{}x{}（限制：{}）",
                width, height, config.max_canvas_dimension
            )));
        }
        canvas.reset(width, height)?;

        let place_started = Instant::now();
        let placement = Placement::compute(source.dimensions(), target.size(), target.scale_mode(), pan);
        canvas.draw_image(source.bitmap(), &placement, target.sampling(), config.smooth_filter)?;
        let place_ms = place_started.elapsed().as_millis();

        let blur_started = Instant::now();
        let sigma = target.blur_amount as f32 * config.blur_sigma_per_unit;
        let blurred_frame = (sigma > 0.0).then(|| gaussian_blur(canvas.frame(), sigma));
        let blur_ms = blur_started.elapsed().as_millis();

        let thumb_started = Instant::now();
        let thumbnail_frame = make_thumbnail(canvas.frame(), config.thumbnail_size, config.smooth_filter)?;
        let thumb_ms = thumb_started.elapsed().as_millis();

        let encode_started = Instant::now();
        let normal = encode_jpeg(canvas.frame(), config.normal_quality)?;
        let blurred = match &blurred_frame {
            Some(frame) => encode_jpeg(frame, config.normal_quality)?,
            None => normal.clone(),
        };
        let thumbnail = encode_jpeg(&thumbnail_frame, config.thumbnail_quality)?;
        let encode_ms = encode_started.elapsed().as_millis();

        log::info!(
            "🎨 合成完成 - 源图: {} {:?} 画布: {}x{} 模式: {:?} 缩放: {:.3} 模糊: {} | place={}ms blur={}ms thumb={}ms encode={}ms total={}ms",
            source.name(),
            source.dimensions(),
            width,
            height,
            placement.mode,
            placement.scale,
            target.blur_amount,
            place_ms,
            blur_ms,
            thumb_ms,
            encode_ms,
            total_started.elapsed().as_millis()
        );

        Ok(CompositedOutput {
            normal,
            blurred,
            thumbnail,
        })
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(CompositorConfig::default())
    }
}

//! 裁剪会话模块
//!
//! # 设计思路
//!
//! `CropSession` 把各组件按数据流串起来：
//!
//! ```text
//! 导入（文件 / 粘贴 / 剪贴板）──▶ SourceSlot ──▶ 视口（即时显示）
//!                                        │
//! 设置变化 / 拖拽松开 ──▶ on_inputs_changed ──▶ 去抖调度器 ──▶ 合成器 ──▶ 输出
//! ```
//!
//! - 视口负责“即时”反馈，合成器负责“最终”结果。合成器在自己的画布上绘制，
//!   完成后只在平移量未变时把画面交给视口。
//! - 任何输入变化都只做一件事：拍下 `{源图, 目标参数}` 快照交给调度器。
//!   平移量在调度器触发时才从视口读取；拖拽中不合成，松开时会重新调度。
//! - 调度器触发时若源图已被替换或清除，本次合成直接丢弃。
//!
//! # 实现思路
//!
//! - 合成在 `spawn_blocking` 线程中执行，视口锁只在读取平移量与替换画面时短暂持有。
//! - 每次触发分配递增序号，只有最新一次的结果会被发布。
//! - 设置先在副本上修改，校验通过才替换，越界值不会污染会话状态。
//! - 锁只在同步代码段内持有，不跨越 `.await`。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::busy::{BusyFlag, BusyGuard};
use crate::compositor::{
    Canvas, CanvasTarget, CompositedOutput, Compositor, CompositorConfig, ImageVariants,
    PanOffset, SourceImage,
};
use crate::db::{CollectionRecord, CollectionStore, NewSystem};
use crate::error::AppError;
use crate::ingest::clipboard::ClipboardItem;
use crate::ingest::{IngestConfig, IngestOutcome, IngestService, SourceSlot};
use crate::scheduler::{RecomputeScheduler, DEFAULT_RECOMPUTE_DELAY};
use crate::settings::{Settings, SettingsStore};
use crate::viewport::{DisplayZoom, InteractiveViewport, PointerOutcome, ViewportConfig};

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub compositor: CompositorConfig,
    pub ingest: IngestConfig,
    pub viewport: ViewportConfig,
    pub recompute_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compositor: CompositorConfig::default(),
            ingest: IngestConfig::default(),
            viewport: ViewportConfig::default(),
            recompute_delay: DEFAULT_RECOMPUTE_DELAY,
        }
    }
}

/// 交给调度器的合成输入快照
#[derive(Debug, Clone)]
pub struct RecomputeInput {
    pub source: Arc<SourceImage>,
    pub target: CanvasTarget,
}

/// 调度器触发后的合成执行端。
#[derive(Clone)]
struct RecomputeRunner {
    slot: Arc<SourceSlot>,
    compositor: Arc<Compositor>,
    viewport: Arc<Mutex<InteractiveViewport>>,
    canvas: Arc<Mutex<Canvas>>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<Mutex<Option<JoinHandle<()>>>>,
    busy: BusyFlag,
}

impl RecomputeRunner {
    fn is_current(&self, source: &Arc<SourceImage>) -> bool {
        self.slot
            .current()
            .is_some_and(|current| Arc::ptr_eq(&current, source))
    }

    /// 调度器触发时调用：读取平移量后把合成交给阻塞线程池。
    fn fire(&self, input: RecomputeInput) {
        if !self.is_current(&input.source) {
            log::debug!("⏭️ 源图已变化，丢弃过期的合成请求");
            return;
        }

        let pan = {
            let viewport = self.viewport.lock().unwrap_or_else(PoisonError::into_inner);
            if viewport.is_dragging() {
                log::debug!("✋ 拖拽进行中，等松开后再合成");
                return;
            }
            viewport.pan()
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = self.busy.enter();
        let runner = self.clone();
        let task = tokio::task::spawn_blocking(move || runner.compose(input, pan, generation, guard));
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    fn compose(
        &self,
        input: RecomputeInput,
        pan: Option<PanOffset>,
        generation: u64,
        _guard: BusyGuard,
    ) {
        let mut canvas = self.canvas.lock().unwrap_or_else(PoisonError::into_inner);
        let output = match self.compositor.compose(&mut canvas, &input.source, &input.target, pan) {
            Ok(output) => output,
            Err(err) => {
                log::warn!("⚠️ 合成已放弃，保留上一份输出 [{}]：{}", err.code(), err);
                return;
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation || !self.is_current(&input.source) {
            log::debug!("⏭️ 合成期间输入已变化，丢弃本次结果");
            return;
        }
        self.compositor.publish(output);

        let mut viewport = self.viewport.lock().unwrap_or_else(PoisonError::into_inner);
        if !viewport.present_frame(&input.source, pan, canvas.frame()) {
            log::debug!("🖼️ 视口平移量已变化，保留即时画面");
        }
    }
}

pub struct CropSession {
    settings: RwLock<Settings>,
    slot: Arc<SourceSlot>,
    ingest: IngestService,
    compositor: Arc<Compositor>,
    viewport: Arc<Mutex<InteractiveViewport>>,
    scheduler: RecomputeScheduler<RecomputeInput>,
    in_flight: Arc<Mutex<Option<JoinHandle<()>>>>,
    busy: BusyFlag,
}

impl CropSession {
    /// 必须在 tokio 运行时内创建。
    pub fn new(config: SessionConfig, settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;

        let busy = BusyFlag::new();
        let slot = Arc::new(SourceSlot::new());
        let compositor = Arc::new(Compositor::new(config.compositor));
        let viewport = Arc::new(Mutex::new(InteractiveViewport::new(config.viewport)));

        let in_flight = Arc::new(Mutex::new(None));

        let runner = RecomputeRunner {
            slot: slot.clone(),
            compositor: compositor.clone(),
            viewport: viewport.clone(),
            canvas: Arc::new(Mutex::new(Canvas::default())),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: in_flight.clone(),
            busy: busy.clone(),
        };
        let scheduler = RecomputeScheduler::new(config.recompute_delay, move |input: RecomputeInput| {
            runner.fire(input)
        })?;

        let ingest = IngestService::new(config.ingest, slot.clone(), busy.clone());

        Ok(Self {
            settings: RwLock::new(settings),
            slot,
            ingest,
            compositor,
            viewport,
            scheduler,
            in_flight,
            busy,
        })
    }

    /// 从设置文件加载设置后创建会话。
    pub fn with_settings_store(config: SessionConfig, store: &SettingsStore) -> Result<Self, AppError> {
        Self::new(config, store.load_or_default())
    }

    fn lock_viewport(&self) -> MutexGuard<'_, InteractiveViewport> {
        self.viewport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // 状态查询
    // ------------------------------------------------------------------

    pub fn settings(&self) -> Settings {
        self.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn source(&self) -> Option<Arc<SourceImage>> {
        self.slot.current()
    }

    /// 最近一次发布的合成结果，最多落后一个去抖周期。
    pub fn current_output(&self) -> Option<Arc<CompositedOutput>> {
        self.compositor.current_output()
    }

    pub fn current_variants(&self) -> Option<ImageVariants> {
        self.current_output().map(|output| output.to_variants())
    }

    /// 导入或合成进行中。
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn is_recompute_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// 等待已触发的合成执行完毕。仍在去抖窗口内的请求不会被等待。
    pub async fn wait_for_recompute(&self) {
        let task = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::error!("❌ 合成线程执行失败：{}", e);
            }
        }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// 在锁内读取视口（画布像素、指针样式、显示比例等）。
    pub fn with_viewport<R>(&self, f: impl FnOnce(&InteractiveViewport) -> R) -> R {
        f(&self.lock_viewport())
    }

    // ------------------------------------------------------------------
    // 重新合成
    // ------------------------------------------------------------------

    /// 拍下当前源图与目标参数并交给调度器。没有源图时返回 `false`。
    pub fn on_inputs_changed(&self) -> bool {
        let Some(source) = self.slot.current() else {
            return false;
        };
        let target = self.settings.read().unwrap_or_else(PoisonError::into_inner).canvas_target();

        self.scheduler.schedule(RecomputeInput { source, target });
        true
    }

    /// 把当前源图与设置同步到视口。画布不可用时只记录日志，交给合成阶段放弃。
    fn refresh_scene(&self) {
        let Some(source) = self.slot.current() else {
            return;
        };
        let target = self.settings.read().unwrap_or_else(PoisonError::into_inner).canvas_target();
        if let Err(err) = self.lock_viewport().set_scene(source, target) {
            log::warn!("⚠️ 视口无法显示当前源图 [{}]：{}", err.code(), err);
        }
    }

    /// 清空画布：丢弃源图、取消待执行的合成并清除输出。
    pub fn clear_canvas(&self) {
        self.slot.clear();
        self.scheduler.cancel();
        self.lock_viewport().clear_scene();
        self.compositor.clear_output();
        log::info!("🧽 画布已清空");
    }

    // ------------------------------------------------------------------
    // 导入
    // ------------------------------------------------------------------

    fn after_ingest(&self, outcome: IngestOutcome) -> IngestOutcome {
        if let Some(image) = outcome.published() {
            // 并发导入时只让最新的那张进入视口
            let is_current = self
                .slot
                .current()
                .is_some_and(|current| Arc::ptr_eq(&current, image));
            if is_current {
                self.refresh_scene();
                self.on_inputs_changed();
            }
        }
        outcome
    }

    pub async fn load_file(&self, path: &Path) -> Result<IngestOutcome, AppError> {
        let outcome = self.ingest.ingest_file(path).await?;
        Ok(self.after_ingest(outcome))
    }

    pub async fn load_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<IngestOutcome, AppError> {
        let outcome = self.ingest.ingest_bytes(file_name, bytes).await?;
        Ok(self.after_ingest(outcome))
    }

    pub async fn load_base64(&self, file_name: &str, data: &str) -> Result<IngestOutcome, AppError> {
        let outcome = self.ingest.ingest_base64(file_name, data).await?;
        Ok(self.after_ingest(outcome))
    }

    /// 粘贴事件：取第一个图片条目，没有图片时忽略。
    pub async fn paste(&self, items: &[ClipboardItem]) -> Result<IngestOutcome, AppError> {
        let outcome = self.ingest.ingest_paste(items).await?;
        Ok(self.after_ingest(outcome))
    }

    pub async fn paste_from_system_clipboard(&self) -> Result<IngestOutcome, AppError> {
        let outcome = self.ingest.ingest_system_clipboard().await?;
        Ok(self.after_ingest(outcome))
    }

    // ------------------------------------------------------------------
    // 设置
    // ------------------------------------------------------------------

    /// 在设置副本上执行修改，成功后替换并触发重新合成；失败时设置不变。
    pub fn update_settings<F>(&self, update: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Settings) -> Result<(), AppError>,
    {
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let mut draft = settings.clone();
            update(&mut draft)?;
            if draft == *settings {
                return Ok(());
            }
            *settings = draft;
        }

        self.refresh_scene();
        self.on_inputs_changed();
        Ok(())
    }

    pub fn set_canvas_size(&self, width: u32, height: u32) -> Result<(), AppError> {
        self.update_settings(|s| s.set_canvas_size(width, height))
    }

    pub fn invert_canvas(&self) -> Result<(), AppError> {
        self.update_settings(|s| {
            s.invert_canvas();
            Ok(())
        })
    }

    pub fn set_blur_amount(&self, amount: u32) -> Result<(), AppError> {
        self.update_settings(|s| s.set_blur_amount(amount))
    }

    pub fn set_integer_scale_value(&self, value: u32) -> Result<(), AppError> {
        self.update_settings(|s| s.set_integer_scale_value(value))
    }

    pub fn set_integer_scale(&self, enabled: bool) -> Result<(), AppError> {
        self.update_settings(|s| {
            s.toggle_integer_scale(Some(enabled));
            Ok(())
        })
    }

    pub fn set_auto_scale(&self, enabled: bool) -> Result<(), AppError> {
        self.update_settings(|s| {
            s.toggle_auto_scale(Some(enabled));
            Ok(())
        })
    }

    pub fn set_smooth_rendering(&self, enabled: bool) -> Result<(), AppError> {
        self.update_settings(|s| {
            s.toggle_smooth_rendering(Some(enabled));
            Ok(())
        })
    }

    pub fn save_settings(&self, store: &SettingsStore) -> Result<(), AppError> {
        store.save(&self.settings())
    }

    // ------------------------------------------------------------------
    // 指针
    // ------------------------------------------------------------------

    pub fn pointer_down(&self, x: f64, y: f64) -> PointerOutcome {
        self.lock_viewport().pointer_down(x, y)
    }

    pub fn pointer_move(&self, x: f64, y: f64) -> Result<PointerOutcome, AppError> {
        Ok(self.lock_viewport().pointer_move(x, y)?)
    }

    /// 松开时提交平移量并调度重新合成。
    pub fn pointer_up(&self) -> PointerOutcome {
        let outcome = self.lock_viewport().pointer_up();
        if matches!(outcome, PointerOutcome::Committed(_)) {
            self.on_inputs_changed();
        }
        outcome
    }

    pub fn pointer_enter(&self) {
        self.lock_viewport().pointer_enter();
    }

    pub fn pointer_leave(&self) -> Result<PointerOutcome, AppError> {
        Ok(self.lock_viewport().pointer_leave()?)
    }

    pub fn wheel(&self, delta_y: f64) -> DisplayZoom {
        self.lock_viewport().wheel(delta_y)
    }

    // ------------------------------------------------------------------
    // 收藏
    // ------------------------------------------------------------------

    /// 以当前合成结果加入收藏。
    pub fn add_to_collection(
        &self,
        store: &CollectionStore,
        system: &NewSystem,
    ) -> Result<CollectionRecord, AppError> {
        store.add_system(system, self.current_variants().as_ref())
    }

    /// 改名；`replace_image` 为真时同时换成当前合成结果。
    pub fn edit_collection_entry(
        &self,
        store: &CollectionStore,
        id: i64,
        name: &str,
        replace_image: bool,
    ) -> Result<Option<CollectionRecord>, AppError> {
        let replacement = if replace_image {
            let variants = self
                .current_variants()
                .ok_or_else(|| AppError::Collection("No image loaded".to_string()))?;
            Some(variants)
        } else {
            None
        };
        store.edit_system(id, name, replacement.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn image_source(width: u32, height: u32) -> Arc<SourceImage> {
        let bitmap = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        Arc::new(SourceImage::new("test", "png", bitmap))
    }

    fn session() -> CropSession {
        CropSession::new(SessionConfig::default(), Settings::default()).expect("session")
    }

    #[tokio::test(start_paused = true)]
    async fn no_source_means_nothing_to_schedule() {
        let session = session();
        assert!(!session.on_inputs_changed());
        assert!(!session.is_recompute_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_setting_is_rejected_without_scheduling() {
        let session = session();
        let ticket = session.slot.begin();
        assert!(session.slot.publish(ticket, image_source(100, 100)));

        assert!(session.set_blur_amount(500).is_err());
        assert_eq!(session.settings(), Settings::default());
        assert!(!session.is_recompute_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn settings_change_schedules_one_recompute() {
        let session = session();
        let ticket = session.slot.begin();
        assert!(session.slot.publish(ticket, image_source(300, 200)));

        session.set_blur_amount(10).expect("blur");
        session.set_canvas_size(200, 100).expect("size");
        assert!(session.is_recompute_pending());
        assert!(session.current_output().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        session.wait_for_recompute().await;
        let output = session.current_output().expect("output");
        assert_eq!((output.normal.width, output.normal.height), (200, 100));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_canvas_cancels_pending_work() {
        let session = session();
        let ticket = session.slot.begin();
        assert!(session.slot.publish(ticket, image_source(300, 200)));
        assert!(session.on_inputs_changed());

        session.clear_canvas();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(session.current_output().is_none());
        assert!(session.source().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshot_is_discarded_by_sink() {
        let session = session();
        let first = image_source(300, 200);
        let ticket = session.slot.begin();
        assert!(session.slot.publish(ticket, first.clone()));
        session.scheduler.schedule(RecomputeInput {
            source: first,
            target: session.settings().canvas_target(),
        });

        let ticket = session.slot.begin();
        assert!(session.slot.publish(ticket, image_source(50, 50)));

        tokio::time::sleep(Duration::from_millis(150)).await;
        session.wait_for_recompute().await;
        assert!(session.current_output().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recompute_during_drag_is_deferred_to_release() {
        let session = session();
        let ticket = session.slot.begin();
        let source = image_source(64, 64);
        assert!(session.slot.publish(ticket, source.clone()));
        session
            .lock_viewport()
            .set_scene(source, session.settings().canvas_target())
            .expect("scene");

        assert!(session.on_inputs_changed());
        session.pointer_down(240.0, 160.0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        session.wait_for_recompute().await;
        assert!(session.current_output().is_none());
        assert!(!session.is_busy());

        assert!(matches!(session.pointer_up(), PointerOutcome::Committed(_)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        session.wait_for_recompute().await;
        assert!(session.current_output().is_some());
    }
}

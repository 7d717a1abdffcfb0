//! # 图片导入模块（ingest）
//!
//! ## 设计思路
//!
//! 文件选择与剪贴板粘贴最终都产出一张规范化的 `SourceImage`，
//! 链路写成线性的异步流程：`加载字节 → 解码规范化 → 发布`。
//!
//! - `loader`：文件 / 字节 / Base64 加载与签名校验
//! - `pipeline`：header 尺寸检查、解码、方向校正、透明展平
//! - `clipboard`：粘贴条目筛选与系统剪贴板读取
//!
//! ## 实现思路
//!
//! - 每次导入开始时从 `SourceSlot` 领取递增票据，只有最新票据才能发布结果，
//!   旧的解码即使后完成也不会覆盖新图（last-started-wins）。
//! - 解码失败原样返回错误，当前源图保持不变。
//! - 导入期间通过 `BusyGuard` 置位加载标志，任何退出路径都会自动清除。
//! - 记录 `load/decode/total` 阶段耗时。

pub mod clipboard;
pub mod loader;
pub mod pipeline;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::busy::BusyFlag;
use crate::compositor::{ImageError, SourceImage};

pub use clipboard::{first_image_item, read_system_clipboard_image, ClipboardItem};
pub use loader::RawImageData;

/// 导入阶段的资源上限。
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 原始字节上限。
    pub max_file_size: u64,
    /// 解码后像素数上限。
    pub max_decoded_pixels: u64,
    /// 解码后内存估算上限（按 RGBA 计）。
    pub max_decoded_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

/// 导入票据，由 `SourceSlot::begin` 发放。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestTicket(u64);

/// 一次导入的结果。
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// 已成为当前源图。
    Published(Arc<SourceImage>),
    /// 解码完成时已有更新的导入开始，结果被丢弃。
    Superseded,
    /// 输入中没有图片（例如纯文本粘贴）。
    Ignored,
}

impl IngestOutcome {
    pub fn published(&self) -> Option<&Arc<SourceImage>> {
        match self {
            Self::Published(source) => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<Arc<SourceImage>>,
    issued: u64,
}

/// 当前源图的唯一持有者。
#[derive(Debug, Default)]
pub struct SourceSlot {
    state: Mutex<SlotState>,
}

impl SourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始一次导入，之前发放的票据全部失效。
    pub fn begin(&self) -> IngestTicket {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.issued += 1;
        IngestTicket(state.issued)
    }

    /// 仅当票据仍是最新时发布；返回是否发布成功。
    pub fn publish(&self, ticket: IngestTicket, image: Arc<SourceImage>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if ticket.0 != state.issued {
            log::debug!(
                "⏭️ 导入结果已过期，丢弃 - ticket={} latest={} 名称: {}",
                ticket.0,
                state.issued,
                image.name()
            );
            return false;
        }
        state.current = Some(image);
        true
    }

    pub fn current(&self) -> Option<Arc<SourceImage>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// 清除源图，同时让进行中的导入失效。
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.issued += 1;
        state.current = None;
    }
}

/// 导入服务：编排加载、解码与发布。
#[derive(Debug, Clone)]
pub struct IngestService {
    config: IngestConfig,
    slot: Arc<SourceSlot>,
    busy: BusyFlag,
}

impl IngestService {
    pub fn new(config: IngestConfig, slot: Arc<SourceSlot>, busy: BusyFlag) -> Self {
        Self { config, slot, busy }
    }

    pub fn slot(&self) -> &Arc<SourceSlot> {
        &self.slot
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    /// 从本地文件导入。
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestOutcome, ImageError> {
        let ticket = self.slot.begin();
        let _guard = self.busy.enter();
        let started = Instant::now();

        let raw = loader::load_from_file(path, &self.config).await?;
        let load_ms = started.elapsed().as_millis();
        self.decode_and_publish(ticket, raw, started, load_ms).await
    }

    /// 从宿主读出的文件字节导入。
    pub async fn ingest_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<IngestOutcome, ImageError> {
        let ticket = self.slot.begin();
        let _guard = self.busy.enter();
        let started = Instant::now();

        let raw = loader::load_from_bytes(file_name, bytes, &self.config)?;
        let load_ms = started.elapsed().as_millis();
        self.decode_and_publish(ticket, raw, started, load_ms).await
    }

    /// 从 Base64 / Data URL 导入。
    pub async fn ingest_base64(&self, file_name: &str, data: &str) -> Result<IngestOutcome, ImageError> {
        let ticket = self.slot.begin();
        let _guard = self.busy.enter();
        let started = Instant::now();

        let raw = loader::load_from_base64(file_name, data, &self.config)?;
        let load_ms = started.elapsed().as_millis();
        self.decode_and_publish(ticket, raw, started, load_ms).await
    }

    /// 处理一次粘贴事件；没有图片条目时忽略。
    pub async fn ingest_paste(&self, items: &[ClipboardItem]) -> Result<IngestOutcome, ImageError> {
        let Some(item) = first_image_item(items) else {
            log::debug!("📋 粘贴内容不含图片，忽略");
            return Ok(IngestOutcome::Ignored);
        };

        let ticket = self.slot.begin();
        let _guard = self.busy.enter();
        let started = Instant::now();

        let raw = loader::load_from_bytes(&item.resolved_file_name(), item.bytes.clone(), &self.config)?;
        let load_ms = started.elapsed().as_millis();
        self.decode_and_publish(ticket, raw, started, load_ms).await
    }

    /// 从系统剪贴板导入；剪贴板里没有图片时忽略。
    pub async fn ingest_system_clipboard(&self) -> Result<IngestOutcome, ImageError> {
        let _guard = self.busy.enter();
        let image = read_system_clipboard_image().await?;
        Ok(self.publish_clipboard_image(image))
    }

    /// 剪贴板里确实有图片时才领取票据，空读取不会顶替进行中的导入。
    fn publish_clipboard_image(&self, image: Option<SourceImage>) -> IngestOutcome {
        match image {
            Some(image) => {
                let ticket = self.slot.begin();
                self.publish(ticket, Arc::new(image))
            }
            None => IngestOutcome::Ignored,
        }
    }

    async fn decode_and_publish(
        &self,
        ticket: IngestTicket,
        raw: RawImageData,
        started: Instant,
        load_ms: u128,
    ) -> Result<IngestOutcome, ImageError> {
        let decode_started = Instant::now();
        let config = self.config.clone();
        let (raw, bitmap) = tokio::task::spawn_blocking(move || {
            let bitmap = pipeline::decode_normalized(&raw, &config);
            (raw, bitmap)
        })
        .await
        .map_err(|e| ImageError::Decode(format!("解码线程执行失败：{}", e)))?;
        let bitmap = bitmap?;
        let decode_ms = decode_started.elapsed().as_millis();

        let source = Arc::new(SourceImage::new(raw.name, raw.extension, bitmap));
        let outcome = self.publish(ticket, source);

        log::info!(
            "📥 导入完成 - 来源: {} load={}ms decode={}ms total={}ms",
            raw.source_hint,
            load_ms,
            decode_ms,
            started.elapsed().as_millis()
        );

        Ok(outcome)
    }

    fn publish(&self, ticket: IngestTicket, source: Arc<SourceImage>) -> IngestOutcome {
        if self.slot.publish(ticket, source.clone()) {
            IngestOutcome::Published(source)
        } else {
            IngestOutcome::Superseded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::encode::encode_png;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([7, 8, 9]))).expect("png")
    }

    fn service() -> IngestService {
        IngestService::new(IngestConfig::default(), Arc::new(SourceSlot::new()), BusyFlag::new())
    }

    fn source(name: &str) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(name, "png", RgbImage::new(1, 1)))
    }

    #[test]
    fn only_latest_ticket_may_publish() {
        let slot = SourceSlot::new();
        let older = slot.begin();
        let newer = slot.begin();

        assert!(slot.publish(newer, source("new")));
        assert!(!slot.publish(older, source("old")));
        assert_eq!(slot.current().map(|s| s.name().to_string()), Some("new".to_string()));
    }

    #[test]
    fn clear_invalidates_in_flight_ingest() {
        let slot = SourceSlot::new();
        let ticket = slot.begin();
        slot.clear();
        assert!(!slot.publish(ticket, source("late")));
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn byte_ingest_publishes_named_source() {
        let service = service();
        let outcome = service.ingest_bytes("psx.png", png(10, 6)).await.expect("ingest");

        let published = outcome.published().expect("published");
        assert_eq!(published.name(), "psx");
        assert_eq!(published.dimensions(), (10, 6));
        assert!(!service.busy().is_busy());
    }

    #[tokio::test]
    async fn decode_failure_keeps_previous_source_and_clears_busy() {
        let service = service();
        service.ingest_bytes("first.png", png(4, 4)).await.expect("first");

        let mut corrupt = png(16, 16);
        corrupt.truncate(40);
        assert!(service.ingest_bytes("broken.png", corrupt).await.is_err());

        let current = service.slot().current().expect("previous source kept");
        assert_eq!(current.name(), "first");
        assert!(!service.busy().is_busy());
    }

    #[tokio::test]
    async fn text_paste_is_ignored() {
        let service = service();
        let outcome = service
            .ingest_paste(&[ClipboardItem::new("text/plain", b"snes".to_vec())])
            .await
            .expect("paste");
        assert!(matches!(outcome, IngestOutcome::Ignored));
        assert!(service.slot().current().is_none());
    }

    #[tokio::test]
    async fn image_paste_is_published() {
        let service = service();
        let items = [
            ClipboardItem::new("text/html", b"<img>".to_vec()),
            ClipboardItem::new("image/png", png(3, 2)).with_file_name("gb.png"),
        ];
        let outcome = service.ingest_paste(&items).await.expect("paste");
        assert_eq!(outcome.published().map(|s| s.name().to_string()), Some("gb".to_string()));
    }

    #[test]
    fn empty_clipboard_read_does_not_supersede_pending_ingest() {
        let service = service();
        let file_ticket = service.slot().begin();

        assert!(matches!(service.publish_clipboard_image(None), IngestOutcome::Ignored));
        assert!(service.slot().publish(file_ticket, source("file")));
        assert_eq!(service.slot().current().map(|s| s.name().to_string()), Some("file".to_string()));
    }

    #[test]
    fn clipboard_image_takes_a_fresh_ticket() {
        let service = service();
        let file_ticket = service.slot().begin();

        let image = SourceImage::new("clipboard", "png", RgbImage::new(2, 2));
        assert!(service.publish_clipboard_image(Some(image)).published().is_some());
        assert!(!service.slot().publish(file_ticket, source("file")));
    }

    #[tokio::test]
    async fn system_clipboard_without_image_leaves_file_ingest_alone() {
        let service = service();
        let (file, clipboard) = tokio::join!(
            service.ingest_bytes("n64.png", png(200, 200)),
            service.ingest_system_clipboard(),
        );

        // 无显示环境下读取剪贴板会失败，桌面环境下剪贴板可能为空或真的有图
        let clipboard_published = matches!(clipboard, Ok(IngestOutcome::Published(_)));
        if !clipboard_published {
            assert!(file.expect("file").published().is_some());
            assert_eq!(service.slot().current().map(|s| s.name().to_string()), Some("n64".to_string()));
        }
        assert!(!service.busy().is_busy());
    }
}

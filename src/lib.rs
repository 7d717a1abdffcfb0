//! # Albedo 壁纸裁剪工具（库入口）
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 宿主 UI（任意前端 / 命令行）              │
//! │   拖放文件 · 粘贴 · 设置面板 · 画布指针事件 · 收藏列表    │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            albedo_cropper (Rust)                 │
//! │                                                          │
//! │  session ── CropSession (数据流编排)                     │
//! │   ├─ ingest ──── 文件 / 字节 / Base64 / 剪贴板 → 源图     │
//! │   ├─ viewport ── 即时显示 + 拖拽平移 + 显示缩放           │
//! │   ├─ scheduler ─ 尾沿去抖，合并连续变化                   │
//! │   └─ compositor  落点 · 缩放 · 模糊 · 缩略图 · JPEG       │
//! │                                                          │
//! │  settings ─── 设置校验与 JSON 持久化                      │
//! │  db ───────── 系统收藏 (rusqlite)                         │
//! │  export ───── 壁纸包 ZIP / 项目备份 JSON                  │
//! │  busy ─────── 忙碌指示 (RAII)                             │
//! │  error ────── AppError (统一错误类型)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`compositor`] | 合成流水线：落点计算、画布绘制、模糊、缩略图、编码 |
//! | [`ingest`] | 导入校验、解码、方向校正、透明通道展平，只发布最新一次导入 |
//! | [`viewport`] | 交互视口：拖拽状态机、显示缩放 |
//! | [`scheduler`] | 重新合成的去抖调度 |
//! | [`session`] | 把以上组件串成完整会话 |
//! | [`settings`] | 设置边界校验、读写 `settings.json` |
//! | [`db`] | 系统收藏的 SQLite 存储 |
//! | [`export`] | ZIP 导出、项目备份导出与导入 |
//! | [`busy`] | 忙碌计数器与 RAII 守卫 |

pub mod busy;
pub mod compositor;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod viewport;

pub use compositor::{CanvasTarget, CompositedOutput, Compositor, ImageError, ImageVariants, SourceImage};
pub use db::{CollectionKey, CollectionRecord, CollectionStore, NewSystem};
pub use error::AppError;
pub use session::{CropSession, SessionConfig};
pub use settings::{GuideType, Settings, SettingsStore};

/// 初始化日志，默认级别 `info`，可用 `RUST_LOG` 覆盖。
///
/// 重复调用（例如多个测试各自初始化）不会报错。
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

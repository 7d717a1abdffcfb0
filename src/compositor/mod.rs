//! # 合成模块（compositor）
//!
//! ## 设计思路
//!
//! 把“源图 + 目标参数 → normal / blurred / thumbnail”这条链路按职责拆分：
//!
//! - `scale`：整数覆盖系数（纯函数）
//! - `placement`：cover-fit 与整数缩放两种落点计算，以及画布可见区域
//! - `canvas`：显式持有的光栅表面与绘制原语
//! - `blur`：三次盒式模糊近似高斯
//! - `thumbnail`：逐级减半的缩略图
//! - `encode`：JPEG/PNG 编码与 Data URL
//! - `handler`：`Compositor` 编排整条链路并发布最新输出
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! CanvasTarget + SourceImage (+ PanOffset)
//!    ↓
//! handler.rs（配置快照 + 阶段耗时日志）
//!    ├─ placement.rs（落点）→ canvas.rs（绘制 normal 帧）
//!    ├─ blur.rs（副本上模糊）
//!    ├─ thumbnail.rs（逐级减半）
//!    └─ encode.rs（JPEG 编码）
//!    ↓
//! CompositedOutput（Arc 快照发布）
//! ```

mod blur;
mod canvas;
mod config;
pub mod encode;
mod error;
mod handler;
mod placement;
mod scale;
mod source;
mod thumbnail;

pub use blur::gaussian_blur;
pub use canvas::Canvas;
pub use config::{
    CompositorConfig, Sampling, DEFAULT_NORMAL_QUALITY, DEFAULT_THUMBNAIL_QUALITY,
    DEFAULT_THUMBNAIL_SIZE, MAX_CANVAS_DIMENSION,
};
pub use error::ImageError;
pub use handler::Compositor;
pub use placement::{
    cover_crop_window, PanOffset, Placement, Rect, ScaleFactor, ScaleMode, VisibleRegion,
};
pub use scale::{auto_scale_factor, scale_factor_to_cover};
pub use source::{CanvasTarget, CompositedOutput, EncodedImage, ImageVariants, SourceImage};
pub use thumbnail::{halving_steps, make_thumbnail, thumbnail_dimensions};

pub(crate) use canvas::resize_full;
